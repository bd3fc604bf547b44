// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Core value objects passed between the compilation stages.
//!
//! Every type here is an immutable value object: entities are produced by
//! the parser or by resolution and are never mutated once the pipeline
//! hands them back to the caller.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An untyped, recursive JSON Schema document.
pub type JsonSchema = serde_json::Value;

/// Trait for types that carry arbitrary caller-supplied metadata.
pub trait HasMetadata {
    /// Returns the arbitrary metadata, if any.
    fn metadata(&self) -> Option<&HashMap<String, serde_json::Value>>;
}

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message authored by the end user.
    User,
    /// Message authored by the model.
    Model,
    /// System instructions.
    System,
    /// Tool call result.
    Tool,
}

/// A tool a prompt may call, with its input/output contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Name of the tool.
    pub name: String,

    /// Human-readable description of what the tool does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's input parameters.
    pub input_schema: JsonSchema,

    /// JSON Schema for the tool's output, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<JsonSchema>,
}

/// Default input values plus the (possibly Picoschema) input schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptInputConfig {
    /// Default values for input variables.
    #[serde(skip_serializing_if = "Option::is_none", rename = "default")]
    pub default: Option<HashMap<String, serde_json::Value>>,

    /// Input schema, as Picoschema surface syntax or plain JSON Schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

/// Desired output format plus the (possibly Picoschema) output schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptOutputConfig {
    /// Desired output format (e.g. `"json"`, `"text"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Output schema, as Picoschema surface syntax or plain JSON Schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

/// Metadata parsed from, or layered onto, a prompt's YAML frontmatter.
///
/// `C` is an opaque, vendor-specific config payload; the core never
/// interprets it beyond the one-level deep-merge the metadata resolver
/// performs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetadata<C = serde_json::Value> {
    /// Name of the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Variant identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    /// Version identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model identifier (e.g. `"vertexai/gemini-1.0-pro"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Names of tools this prompt may call.
    ///
    /// After resolution, holds only the "unregistered" residue: names that
    /// were in neither the static tool map nor resolvable via the tool
    /// resolver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,

    /// Resolved tool definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_defs: Option<Vec<ToolDefinition>>,

    /// Model-specific configuration, deep-merged one level on layering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<C>,

    /// Input variable configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PromptInputConfig>,

    /// Output format configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PromptOutputConfig>,

    /// Frontmatter exactly as loaded, including keys the core didn't interpret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<HashMap<String, serde_json::Value>>,

    /// Namespaced frontmatter fields: `ext[namespace][field]`, populated
    /// from dotted keys such as `myNamespace.customField`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<HashMap<String, HashMap<String, serde_json::Value>>>,

    /// Free-form metadata not covered by a reserved key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl<C> HasMetadata for PromptMetadata<C> {
    fn metadata(&self) -> Option<&HashMap<String, serde_json::Value>> {
        self.metadata.as_ref()
    }
}

/// A template body plus the metadata parsed from its frontmatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedPrompt<C = serde_json::Value> {
    /// Metadata parsed from the frontmatter.
    #[serde(flatten)]
    pub metadata: PromptMetadata<C>,

    /// Template source with the frontmatter removed.
    pub template: String,
}

/// A reference to external media (image, audio, video, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
    /// URL of the media.
    pub url: String,

    /// MIME type of the media, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A request to call a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequestContent {
    /// Name of the tool being requested.
    pub name: String,

    /// Input parameters for the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,

    /// Correlates this request with its eventual response.
    #[serde(skip_serializing_if = "Option::is_none", rename = "ref")]
    pub ref_: Option<String>,
}

/// The result of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponseContent {
    /// Name of the tool that was called.
    pub name: String,

    /// Output produced by the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Correlates this response with its request.
    #[serde(skip_serializing_if = "Option::is_none", rename = "ref")]
    pub ref_: Option<String>,
}

/// A single piece of content within a [`Message`] or [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text.
    Text(TextPart),
    /// Structured data.
    Data(DataPart),
    /// A media reference.
    Media(MediaPart),
    /// A tool call request.
    ToolRequest(ToolRequestPart),
    /// A tool call response.
    ToolResponse(ToolResponsePart),
    /// A placeholder awaiting externally-supplied content (e.g. a section).
    Pending(PendingPart),
}

/// Text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPart {
    /// The text.
    pub text: String,

    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Structured data content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPart {
    /// The data, as a JSON object.
    pub data: HashMap<String, serde_json::Value>,

    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// A media reference part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPart {
    /// The media reference.
    pub media: MediaContent,

    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// A tool request part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequestPart {
    /// The request details.
    pub tool_request: ToolRequestContent,

    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// A tool response part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponsePart {
    /// The response details.
    pub tool_response: ToolResponseContent,

    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// A placeholder part awaiting content supplied outside the template.
///
/// Metadata always carries `pending: true` and, for a section placeholder,
/// a `purpose` naming the section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPart {
    /// Carries `pending: true` and, typically, `purpose`.
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,

    /// Non-empty ordered content.
    pub content: Vec<Part>,

    /// Optional metadata (e.g. `{"purpose": "history"}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// A retrieval/context document supplied to rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// The document's content.
    pub content: Vec<Part>,

    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Render-time input: variables, context documents, and conversation history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataArgument<V = serde_json::Value> {
    /// Input variables for template rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<V>,

    /// Context documents available to the template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<Vec<Document>>,

    /// Prior conversation turns, spliced in at the history marker (or by
    /// the fallback heuristic when no marker is present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,

    /// Arbitrary values exposed to the template as `@<key>` variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

/// The final compiled artifact: resolved metadata plus ordered messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPrompt<C = serde_json::Value> {
    /// The fully resolved metadata.
    #[serde(flatten)]
    pub metadata: PromptMetadata<C>,

    /// The rendered, assembled messages.
    pub messages: Vec<Message>,
}

/// Template source handed back for a resolved partial, whether it came
/// from a [`PartialResolver`] or the [`PromptStore`] fallback.
///
/// [`PartialResolver`]: crate::resolver::PartialResolver
/// [`PromptStore`]: crate::store::PromptStore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSource {
    /// Template source for the partial.
    pub source: String,
}

/// A prompt already parsed and ready to be rendered repeatedly.
///
/// Produced by [`PromptCompiler::compile`](crate::compiler::PromptCompiler::compile).
#[derive(Debug, Clone)]
pub struct PromptFunction<C = serde_json::Value> {
    /// The parsed prompt with metadata.
    pub prompt: ParsedPrompt<C>,
}
