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

//! Picoschema: a compact surface syntax that compiles to JSON Schema.
//!
//! Picoschema input is either `null`, a string (a scalar type, optionally
//! with a trailing `, description`, or a named-schema reference resolved
//! through a [`SchemaResolver`]), or a mapping that is either already JSON
//! Schema (detected by a recognised top-level `type` or the presence of
//! `properties`) or compact Picoschema object syntax.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::error::{PromptError, Result, ResolverKind};
use crate::resolver::{resolve, SchemaResolver};

const SCALAR_TYPES: &[&str] = &["string", "boolean", "null", "number", "integer", "any"];
const WILDCARD_PROPERTY_NAME: &str = "(*)";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

fn is_json_schema_type(name: &str) -> bool {
    name == "object" || name == "array" || SCALAR_TYPES.contains(&name)
}

/// Splits `"<name>, <description>"` into `(name, Some(description))`, or
/// `(input, None)` when there is no comma.
fn extract_description(input: &str) -> (String, Option<String>) {
    input.find(',').map_or_else(
        || (input.to_string(), None),
        |idx| {
            let name = input[..idx].to_string();
            let description = input[idx + 1..].trim_start_matches(' ').to_string();
            (name, Some(description))
        },
    )
}

/// Compiles a Picoschema or passthrough JSON Schema node to JSON Schema.
///
/// `null` compiles to `None`. Anything else compiles to `Some(schema)`.
///
/// # Errors
///
/// Returns [`PromptError::Picoschema`] for an unknown scalar type with no
/// resolver configured, a named type the resolver could not find, an
/// invalid parenthetical kind, or a node that is neither a string nor a
/// mapping. Also returns resolver errors surfaced through the schema
/// resolver's own contract (not-configured, not-found, failed).
pub async fn compile(schema: &Value, resolver: Option<&SchemaResolver>) -> Result<Option<Value>> {
    if schema.is_null() {
        return Ok(None);
    }
    parse_node(schema, resolver).await.map(Some)
}

fn parse_node<'a>(schema: &'a Value, resolver: Option<&'a SchemaResolver>) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        match schema {
            Value::String(s) => parse_scalar_or_named(s, resolver).await,
            Value::Object(map) => {
                if let Some(Value::String(t)) = map.get("type") {
                    if is_json_schema_type(t) {
                        return Ok(schema.clone());
                    }
                }
                if map.contains_key("properties") {
                    let mut object = map.clone();
                    object
                        .entry("type".to_string())
                        .or_insert_with(|| Value::String("object".to_string()));
                    return Ok(Value::Object(object));
                }
                parse_pico_object(map, resolver).await
            }
            other => Err(PromptError::Picoschema(format!(
                "only consists of objects and strings, got: {other}"
            ))),
        }
    })
}

async fn parse_scalar_or_named(type_str: &str, resolver: Option<&SchemaResolver>) -> Result<Value> {
    let (type_name, description) = extract_description(type_str);

    if type_name == "any" {
        let mut object = Map::new();
        if let Some(d) = description {
            object.insert("description".to_string(), Value::String(d));
        }
        return Ok(Value::Object(object));
    }

    if SCALAR_TYPES.contains(&type_name.as_str()) {
        let mut object = Map::new();
        object.insert("type".to_string(), Value::String(type_name));
        if let Some(d) = description {
            object.insert("description".to_string(), Value::String(d));
        }
        return Ok(Value::Object(object));
    }

    let resolved = resolve(&type_name, ResolverKind::Schema, resolver)
        .await
        .map_err(|err| match err {
            PromptError::NotConfigured { .. } => {
                PromptError::Picoschema(format!("unsupported scalar type '{type_name}'"))
            }
            PromptError::NotFound { .. } => {
                PromptError::Picoschema(format!("could not find schema with name '{type_name}'"))
            }
            other => other,
        })?;

    let Value::Object(mut object) = resolved else {
        // A resolver returning a non-object schema has nowhere to attach a
        // description; pass it through untouched.
        return Ok(resolved);
    };
    if let Some(d) = description {
        object.insert("description".to_string(), Value::String(d));
    }
    Ok(Value::Object(object))
}

fn widen_optional_type(schema: &mut Value) {
    if let Some(Value::String(t)) = schema.get("type").cloned() {
        if let Some(object) = schema.as_object_mut() {
            object.insert(
                "type".to_string(),
                Value::Array(vec![Value::String(t), Value::String("null".to_string())]),
            );
        }
    }
}

async fn parse_pico_object(map: &Map<String, Value>, resolver: Option<&SchemaResolver>) -> Result<Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut additional_properties = Value::Bool(false);

    for (key, value) in map {
        if key == WILDCARD_PROPERTY_NAME {
            additional_properties = parse_node(value, resolver).await?;
            continue;
        }

        let (name_part, type_info) = match key.find('(') {
            Some(idx) => {
                let name = key[..idx].to_string();
                let info = key[idx + 1..].strip_suffix(')').unwrap_or(&key[idx + 1..]);
                (name, Some(info.to_string()))
            }
            None => (key.clone(), None),
        };

        let is_optional = name_part.ends_with('?');
        let property_name = if is_optional {
            name_part[..name_part.len() - 1].to_string()
        } else {
            name_part
        };

        if !is_optional {
            required.push(Value::String(property_name.clone()));
        }

        let mut property = match type_info {
            None => {
                let mut prop = parse_node(value, resolver).await?;
                if is_optional {
                    widen_optional_type(&mut prop);
                }
                prop
            }
            Some(info) => {
                let (kind, description) = extract_description(&info);
                let mut prop = match kind.as_str() {
                    "array" => {
                        let items = parse_node(value, resolver).await?;
                        let array_type = if is_optional {
                            Value::Array(vec![
                                Value::String("array".to_string()),
                                Value::String("null".to_string()),
                            ])
                        } else {
                            Value::String("array".to_string())
                        };
                        let mut object = Map::new();
                        object.insert("type".to_string(), array_type);
                        object.insert("items".to_string(), items);
                        Value::Object(object)
                    }
                    "object" => {
                        let mut prop = parse_node(value, resolver).await?;
                        if is_optional {
                            widen_optional_type(&mut prop);
                        }
                        prop
                    }
                    "enum" => {
                        let mut values = value.as_array().cloned().unwrap_or_default();
                        if is_optional && !values.iter().any(Value::is_null) {
                            values.push(Value::Null);
                        }
                        let mut object = Map::new();
                        object.insert("enum".to_string(), Value::Array(values));
                        Value::Object(object)
                    }
                    other => {
                        return Err(PromptError::Picoschema(format!(
                            "parenthetical types must be 'object' or 'array', got: {other}"
                        )));
                    }
                };
                if let Some(d) = description {
                    if let Some(object) = prop.as_object_mut() {
                        object.insert("description".to_string(), Value::String(d));
                    }
                }
                prop
            }
        };

        properties.insert(property_name, std::mem::take(&mut property));
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema.insert("additionalProperties".to_string(), additional_properties);
    Ok(Value::Object(schema))
}
