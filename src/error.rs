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

//! Error taxonomy for the compilation pipeline.
//!
//! Only YAML frontmatter errors are recovered from locally (the document
//! parser degrades to a metadata-less prompt). Every other variant surfaces
//! to the caller, carrying `(kind, name, reason)` where applicable so the
//! failure can be attributed to the resolver that produced it.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PromptError>;

/// The kind of named object a resolver was asked to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    /// A tool definition, resolved from a name listed in `tools`.
    Tool,
    /// A JSON Schema, resolved from a Picoschema named-type reference.
    Schema,
    /// A partial template, resolved from a `{{> name}}` reference.
    Partial,
}

impl std::fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Tool => "tool",
            Self::Schema => "schema",
            Self::Partial => "partial",
        })
    }
}

/// Errors that can occur while compiling a `.prompt` document.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Failed to parse JSON data supplied by the caller.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Picoschema compilation failed.
    ///
    /// Covers an unknown scalar type with no resolver configured, a named
    /// type the resolver could not find, an invalid parenthetical kind, or a
    /// node that is neither a string nor a mapping.
    #[error("picoschema: {0}")]
    Picoschema(String),

    /// A resolver raised while resolving `name` of the given `kind`.
    ///
    /// The original failure is preserved as the error's source.
    #[error("{kind} resolver failed for '{name}': {reason}")]
    ResolverFailed {
        /// Name passed to the resolver.
        name: String,
        /// Kind of object being resolved.
        kind: ResolverKind,
        /// Human-readable reason, derived from the resolver's failure.
        reason: String,
    },

    /// A resolver returned `null` for `name`.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Name passed to the resolver.
        name: String,
        /// Kind of object being resolved.
        kind: ResolverKind,
    },

    /// No resolver was configured for `kind` but one was required.
    #[error("{kind} resolver is not defined")]
    NotConfigured {
        /// Kind of object being resolved.
        kind: ResolverKind,
    },

    /// A malformed media or section marker was found in rendered output.
    ///
    /// This indicates a bug in a helper, not in user-supplied data.
    #[error("invalid marker: {0}")]
    InvalidMarker(String),

    /// The embedded template engine failed to compile or render a template.
    #[error("template error: {0}")]
    Template(String),
}

impl PromptError {
    /// Wraps a resolver failure, preserving `reason` as a plain description.
    #[must_use]
    pub fn resolver_failed(name: impl Into<String>, kind: ResolverKind, reason: impl std::fmt::Display) -> Self {
        Self::ResolverFailed {
            name: name.into(),
            kind,
            reason: reason.to_string(),
        }
    }
}
