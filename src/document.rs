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

//! Frontmatter extraction and reserved/namespaced key routing.
//!
//! `parse` is total: it never returns an error. A missing or malformed
//! frontmatter block degrades to a metadata-less [`ParsedPrompt`] with the
//! whole source (or its trimmed body) as the template, and a parse failure
//! is reported only as a [`tracing`] diagnostic.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::types::{ParsedPrompt, PromptMetadata};

/// Frontmatter keys that populate typed [`PromptMetadata`] fields directly
/// rather than being routed to `ext` or dropped.
const RESERVED_KEYS: &[&str] = &[
    "config", "description", "ext", "input", "model", "name", "output", "raw", "toolDefs",
    "tools", "variant", "version",
];

static FRONTMATTER_RE: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_RE.get_or_init(|| {
        Regex::new(r"(?s)^---\s*(?:\r\n|\r|\n)([\s\S]*?)(?:\r\n|\r|\n)---\s*(?:\r\n|\r|\n)([\s\S]*)$")
            .expect("failed to compile frontmatter regex")
    })
}

/// Splits `source` into its raw YAML frontmatter and template body.
///
/// Returns `(String::new(), source)` unchanged when the leading `---`
/// delimiter is absent, matching the "total function" contract of [`parse`].
#[must_use]
pub fn extract_frontmatter_and_body(source: &str) -> (String, String) {
    frontmatter_regex().captures(source).map_or_else(
        || (String::new(), source.to_string()),
        |captures| {
            let yaml = captures.get(1).map_or("", |m| m.as_str()).to_string();
            let template = captures.get(2).map_or("", |m| m.as_str()).trim().to_string();
            (yaml, template)
        },
    )
}

/// Splits `key` on its last `.` and stores `value` at `ext[namespace][field]`.
///
/// Only one level of nesting is supported: a key with no `.` is left alone
/// by the caller (this function is only invoked for dotted keys).
fn route_namespaced_entry(
    ext: &mut HashMap<String, HashMap<String, Value>>,
    key: &str,
    value: Value,
) {
    let Some(dot) = key.rfind('.') else {
        return;
    };
    let (namespace, field) = (&key[..dot], &key[dot + 1..]);
    ext.entry(namespace.to_string())
        .or_default()
        .insert(field.to_string(), value);
}

/// Parses a `.prompt` source document into a [`ParsedPrompt`].
///
/// Never fails: invalid or absent YAML frontmatter degrades to a
/// metadata-less prompt whose template is the (trimmed, when frontmatter
/// delimiters were present) source.
#[must_use]
pub fn parse<C>(source: &str) -> ParsedPrompt<C>
where
    C: serde::de::DeserializeOwned,
{
    let (yaml, template) = extract_frontmatter_and_body(source);

    if yaml.trim().is_empty() {
        return ParsedPrompt {
            metadata: PromptMetadata::default(),
            template,
        };
    }

    let raw_value: Value = match serde_yaml::from_str(&yaml) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(error = %err, "error parsing YAML frontmatter, degrading to template-only prompt");
            return ParsedPrompt {
                metadata: PromptMetadata::default(),
                template: source.trim().to_string(),
            };
        }
    };

    let Value::Mapping(mapping) = raw_value else {
        tracing::warn!("YAML frontmatter did not parse to a mapping, degrading to template-only prompt");
        return ParsedPrompt {
            metadata: PromptMetadata::default(),
            template: source.trim().to_string(),
        };
    };

    let mut raw = HashMap::new();
    let mut reserved = serde_json::Map::new();
    let mut ext: HashMap<String, HashMap<String, Value>> = HashMap::new();

    for (k, v) in mapping {
        let Value::String(key) = k else { continue };
        raw.insert(key.clone(), yaml_to_json(v.clone()));

        if RESERVED_KEYS.contains(&key.as_str()) {
            reserved.insert(key, yaml_to_json(v));
        } else if key.contains('.') {
            route_namespaced_entry(&mut ext, &key, yaml_to_json(v));
        }
        // Other keys are dropped from the typed view but remain in `raw`.
    }

    if !ext.is_empty() {
        reserved.insert(
            "ext".to_string(),
            serde_json::to_value(&ext).unwrap_or(Value::Null),
        );
    }

    let mut metadata: PromptMetadata<C> =
        serde_json::from_value(Value::Object(reserved)).unwrap_or_default();
    metadata.raw = Some(raw);

    ParsedPrompt { metadata, template }
}

/// Converts a `serde_yaml::Value` to a `serde_json::Value`, the common
/// currency the rest of the pipeline operates on.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn no_frontmatter_degrades_to_template_only() {
        let (yaml, template) = extract_frontmatter_and_body("Hello {{name}}!");
        assert_eq!(yaml, "");
        assert_eq!(template, "Hello {{name}}!");
    }

    #[test]
    fn extracts_yaml_and_trims_body() {
        let source = "---\nmodel: gemini-pro\n---\nHello {{name}}!  \n";
        let (yaml, template) = extract_frontmatter_and_body(source);
        assert!(yaml.contains("model: gemini-pro"));
        assert_eq!(template, "Hello {{name}}!");
    }

    #[test]
    fn reserved_keys_populate_typed_fields() {
        let source = "---\nmodel: gemini-pro\ndescription: a prompt\n---\nHi!";
        let parsed: ParsedPrompt = parse(source);
        assert_eq!(parsed.metadata.model.as_deref(), Some("gemini-pro"));
        assert_eq!(parsed.metadata.description.as_deref(), Some("a prompt"));
        assert_eq!(parsed.template, "Hi!");
    }

    #[test]
    fn dotted_keys_route_to_ext_namespace() {
        let source = "---\nmodel: gemini-pro\nfirebase.functionName: helloWorld\n---\nHi!";
        let parsed: ParsedPrompt = parse(source);
        let ext = parsed.metadata.ext.expect("ext populated");
        assert_eq!(
            ext["firebase"]["functionName"],
            serde_json::json!("helloWorld")
        );
        assert!(parsed.metadata.raw.expect("raw populated").contains_key("firebase.functionName"));
    }

    #[test]
    fn unreserved_non_dotted_keys_are_dropped_but_kept_in_raw() {
        let source = "---\nmodel: gemini-pro\nsomeCustomField: 42\n---\nHi!";
        let parsed: ParsedPrompt = parse(source);
        assert_eq!(parsed.metadata.model.as_deref(), Some("gemini-pro"));
        assert_eq!(
            parsed.metadata.raw.expect("raw populated")["someCustomField"],
            serde_json::json!(42)
        );
    }

    #[test]
    fn malformed_yaml_degrades_with_trimmed_whole_source_as_template() {
        let source = "---\nmodel: [unterminated\n---\nHi!";
        let parsed: ParsedPrompt = parse(source);
        assert!(parsed.metadata.model.is_none());
        assert_eq!(parsed.template, source.trim());
    }

    #[test]
    fn empty_frontmatter_yields_empty_ext_and_body_as_template() {
        let source = "---\n---\nHi!";
        let parsed: ParsedPrompt = parse(source);
        assert!(parsed.metadata.ext.is_none());
        assert_eq!(parsed.template, "Hi!");
    }
}
