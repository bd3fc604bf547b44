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

//! End-to-end scenarios for the compilation pipeline, one per documented
//! scenario: a minimal variable substitution, a role split, a media
//! reference, a history splice, a Picoschema optional field, and tool
//! resolution leaving an unregistered residue.

#![allow(clippy::expect_used)]

use promptware::{
    DataArgument, Message, Part, PromptCompiler, PromptCompilerOptions, Resolver, Role,
    TextPart, ToolDefinition,
};
use serde_json::json;
use std::collections::HashMap;

fn text_of(part: &Part) -> &str {
    match part {
        Part::Text(t) => &t.text,
        other => panic!("expected a text part, got {other:?}"),
    }
}

#[tokio::test]
async fn minimal_variable() {
    let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
    let data = DataArgument {
        input: Some(json!({"name": "Ada"})),
        ..Default::default()
    };

    let rendered = compiler
        .render("Hello {{name}}", &data, None)
        .await
        .expect("render succeeds");

    assert_eq!(rendered.messages.len(), 1);
    assert_eq!(rendered.messages[0].role, Role::User);
    assert_eq!(rendered.messages[0].content.len(), 1);
    assert_eq!(text_of(&rendered.messages[0].content[0]), "Hello Ada");
}

#[tokio::test]
async fn role_split() {
    let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
    let source = r#"{{role "system"}}You are helpful.{{role "user"}}Hi."#;

    let rendered = compiler
        .render(source, &DataArgument::<serde_json::Value>::default(), None)
        .await
        .expect("render succeeds");

    assert_eq!(rendered.messages.len(), 2);
    assert_eq!(rendered.messages[0].role, Role::System);
    assert_eq!(text_of(&rendered.messages[0].content[0]), "You are helpful.");
    assert_eq!(rendered.messages[1].role, Role::User);
    assert_eq!(text_of(&rendered.messages[1].content[0]), "Hi.");
}

#[tokio::test]
async fn media_reference() {
    let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
    let source = r#"Look: {{media url="https://x/y.png" contentType="image/png"}}"#;

    let rendered = compiler
        .render(source, &DataArgument::<serde_json::Value>::default(), None)
        .await
        .expect("render succeeds");

    assert_eq!(rendered.messages.len(), 1);
    let parts = &rendered.messages[0].content;
    assert_eq!(parts.len(), 2);
    assert_eq!(text_of(&parts[0]), "Look: ");
    match &parts[1] {
        Part::Media(m) => {
            assert_eq!(m.media.url, "https://x/y.png");
            assert_eq!(m.media.content_type.as_deref(), Some("image/png"));
        }
        other => panic!("expected a media part, got {other:?}"),
    }
}

#[tokio::test]
async fn history_splice() {
    let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
    let source = r#"{{role "system"}}S{{history}}{{role "user"}}Q"#;

    let history = vec![Message {
        role: Role::User,
        content: vec![Part::Text(TextPart {
            text: "prev".to_string(),
            metadata: None,
        })],
        metadata: None,
    }];
    let data = DataArgument::<serde_json::Value> {
        messages: Some(history),
        ..Default::default()
    };

    let rendered = compiler
        .render(source, &data, None)
        .await
        .expect("render succeeds");

    assert_eq!(rendered.messages.len(), 3);
    assert_eq!(rendered.messages[0].role, Role::System);
    assert_eq!(text_of(&rendered.messages[0].content[0]), "S");

    assert_eq!(rendered.messages[1].role, Role::User);
    assert_eq!(text_of(&rendered.messages[1].content[0]), "prev");
    let purpose = rendered.messages[1]
        .metadata
        .as_ref()
        .and_then(|m| m.get("purpose"))
        .and_then(|v| v.as_str());
    assert_eq!(purpose, Some("history"));

    assert_eq!(rendered.messages[2].role, Role::User);
    assert_eq!(text_of(&rendered.messages[2].content[0]), "Q");
}

#[tokio::test]
async fn picoschema_optional_field() {
    let compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
    let source = "---\noutput:\n  schema:\n    name?: string\n    age: integer\n---\n{{age}}";

    let parsed = compiler.parse::<serde_json::Value>(source);
    let resolved = compiler
        .resolve_metadata(parsed.metadata)
        .await
        .expect("metadata resolves");

    let schema = resolved
        .output
        .as_ref()
        .and_then(|o| o.schema.as_ref())
        .expect("schema present");

    assert_eq!(schema["type"], json!("object"));
    assert_eq!(schema["properties"]["name"]["type"], json!(["string", "null"]));
    assert_eq!(schema["properties"]["age"]["type"], json!("integer"));
    assert_eq!(schema["required"], json!(["age"]));
    assert_eq!(schema["additionalProperties"], json!(false));
}

#[tokio::test]
async fn tool_resolution_leaves_unregistered_residue() {
    let mut tools = HashMap::new();
    tools.insert(
        "a".to_string(),
        ToolDefinition {
            name: "a".to_string(),
            description: None,
            input_schema: json!({}),
            output_schema: None,
        },
    );

    let tool_resolver: Resolver<ToolDefinition> = Resolver::sync(|name| {
        (name == "b").then(|| ToolDefinition {
            name: name.to_string(),
            description: None,
            input_schema: json!({}),
            output_schema: None,
        })
    });

    let options = PromptCompilerOptions {
        tools: Some(tools),
        tool_resolver: Some(tool_resolver),
        ..Default::default()
    };
    let compiler: PromptCompiler = PromptCompiler::new(options);

    let source = "---\ntools: [a, b, c]\n---\nhi";
    let parsed = compiler.parse::<serde_json::Value>(source);
    let resolved = compiler
        .resolve_metadata(parsed.metadata)
        .await
        .expect("metadata resolves");

    let resolved_names: Vec<_> = resolved
        .tool_defs
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert!(resolved_names.contains(&"a".to_string()));
    assert!(resolved_names.contains(&"b".to_string()));

    assert_eq!(resolved.tools.unwrap_or_default(), vec!["c".to_string()]);
}
