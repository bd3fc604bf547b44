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

//! Turns a rendered template string into an ordered list of [`Message`].
//!
//! Tokenization happens in two passes: first role/history markers split the
//! string into message sources, then each source is split again on
//! media/section markers to produce its content parts. Neither pass
//! suspends; this module has no `async` surface.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{PromptError, Result};
use crate::types::{DataArgument, MediaContent, MediaPart, Message, PendingPart, Part, Role, TextPart};

const ROLE_MARKER_PREFIX: &str = "<<<dotprompt:role:";
const HISTORY_MARKER_PREFIX: &str = "<<<dotprompt:history";
const SECTION_MARKER_PREFIX: &str = "<<<dotprompt:section";
const MEDIA_MARKER_PREFIX: &str = "<<<dotprompt:media:url";

static ROLE_AND_HISTORY_RE: OnceLock<Regex> = OnceLock::new();
static MEDIA_AND_SECTION_RE: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn role_and_history_regex() -> &'static Regex {
    ROLE_AND_HISTORY_RE.get_or_init(|| {
        Regex::new(r"(<<<dotprompt:(?:role:[a-z]+|history))>>>")
            .expect("failed to compile role/history regex")
    })
}

#[allow(clippy::expect_used)]
fn media_and_section_regex() -> &'static Regex {
    MEDIA_AND_SECTION_RE.get_or_init(|| {
        Regex::new(r"(<<<dotprompt:(?:media:url|section).*?)>>>")
            .expect("failed to compile media/section regex")
    })
}

/// Splits `source` on `regex`, keeping matched delimiters (sans trailing
/// `>>>`) in the output and dropping whitespace-only text pieces.
fn split_by_regex(source: &str, regex: &Regex) -> Vec<String> {
    let mut result = Vec::new();
    let mut last_end = 0;

    for cap in regex.captures_iter(source) {
        #[allow(clippy::unwrap_used)] // regex guarantees both groups on a match
        let full_match = cap.get(0).unwrap();
        #[allow(clippy::unwrap_used)]
        let delimiter = cap.get(1).unwrap();

        let before = &source[last_end..full_match.start()];
        if !before.trim().is_empty() {
            result.push(before.to_string());
        }
        result.push(delimiter.as_str().to_string());
        last_end = full_match.end();
    }

    let remaining = &source[last_end..];
    if !remaining.trim().is_empty() {
        result.push(remaining.to_string());
    }

    result
}

fn parse_media_part(piece: &str) -> Result<Part> {
    let fields: Vec<&str> = piece.split_whitespace().collect();
    let (url, content_type) = match fields.len() {
        2 => (fields[1].to_string(), None),
        3 => (fields[1].to_string(), Some(fields[2].to_string())),
        n => {
            return Err(PromptError::InvalidMarker(format!(
                "invalid media piece: {piece}; expected 2 or 3 fields, found {n}"
            )));
        }
    };
    Ok(Part::Media(MediaPart {
        media: MediaContent { url, content_type },
        metadata: None,
    }))
}

fn parse_section_part(piece: &str) -> Result<Part> {
    let fields: Vec<&str> = piece.split_whitespace().collect();
    let [_, name] = fields[..] else {
        return Err(PromptError::InvalidMarker(format!(
            "invalid section piece: {piece}; expected 2 fields, found {}",
            fields.len()
        )));
    };

    let mut metadata = HashMap::new();
    metadata.insert("purpose".to_string(), Value::String(name.to_string()));
    metadata.insert("pending".to_string(), Value::Bool(true));
    Ok(Part::Pending(PendingPart { metadata }))
}

fn parse_part(piece: &str) -> Result<Part> {
    if piece.starts_with(MEDIA_MARKER_PREFIX) {
        parse_media_part(piece)
    } else if piece.starts_with(SECTION_MARKER_PREFIX) {
        parse_section_part(piece)
    } else {
        Ok(Part::Text(TextPart {
            text: piece.to_string(),
            metadata: None,
        }))
    }
}

fn to_parts(source: &str) -> Result<Vec<Part>> {
    split_by_regex(source, media_and_section_regex())
        .iter()
        .map(|s| parse_part(s))
        .collect()
}

struct MessageSource {
    role: Role,
    source: String,
    content: Option<Vec<Part>>,
    metadata: Option<HashMap<String, Value>>,
}

impl MessageSource {
    const fn new(role: Role) -> Self {
        Self {
            role,
            source: String::new(),
            content: None,
            metadata: None,
        }
    }

    fn has_content(&self) -> bool {
        !self.source.trim().is_empty() || self.content.is_some()
    }
}

fn transform_messages_to_history(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|m| {
            let mut metadata = m.metadata.clone().unwrap_or_default();
            metadata.insert("purpose".to_string(), Value::String("history".to_string()));
            Message {
                role: m.role,
                content: m.content.clone(),
                metadata: Some(metadata),
            }
        })
        .collect()
}

fn messages_have_history(messages: &[Message]) -> bool {
    messages.iter().any(|m| {
        m.metadata
            .as_ref()
            .is_some_and(|meta| meta.get("purpose").is_some_and(|v| v == "history"))
    })
}

/// Splices `history` into `messages` per the fallback heuristic used when
/// the history marker was never encountered during tokenization.
fn insert_history(messages: Vec<Message>, history: Option<&Vec<Message>>) -> Vec<Message> {
    let history = match history {
        Some(h) if !h.is_empty() => h,
        _ => return messages,
    };

    if messages_have_history(&messages) {
        return messages;
    }

    if messages.is_empty() {
        return history.clone();
    }

    if messages.last().is_some_and(|m| m.role == Role::User) {
        let mut result: Vec<Message> = messages[..messages.len() - 1].to_vec();
        result.extend(transform_messages_to_history(history));
        result.push(messages[messages.len() - 1].clone());
        return result;
    }

    let mut result = messages;
    result.extend(transform_messages_to_history(history));
    result
}

fn message_sources_to_messages(sources: Vec<MessageSource>) -> Result<Vec<Message>> {
    sources
        .into_iter()
        .filter(MessageSource::has_content)
        .map(|ms| {
            let content = match ms.content {
                Some(c) => c,
                None => to_parts(&ms.source)?,
            };
            Ok(Message {
                role: ms.role,
                content,
                metadata: ms.metadata,
            })
        })
        .filter(|m: &Result<Message>| !matches!(m, Ok(msg) if msg.content.is_empty()))
        .collect()
}

/// Converts a rendered template string into an ordered list of messages,
/// splicing in `data.messages` as history at the marker or, absent one, by
/// the documented fallback heuristic.
///
/// # Errors
///
/// Returns [`PromptError::InvalidMarker`] when a media or section marker
/// has the wrong number of fields.
pub fn to_messages<V>(rendered_string: &str, data: Option<&DataArgument<V>>) -> Result<Vec<Message>> {
    let mut current_message = MessageSource::new(Role::User);
    let mut message_sources: Vec<MessageSource> = Vec::new();

    for piece in split_by_regex(rendered_string, role_and_history_regex()) {
        if piece.starts_with(ROLE_MARKER_PREFIX) {
            let role_str = piece.strip_prefix(ROLE_MARKER_PREFIX).unwrap_or("user");
            let role = match role_str {
                "model" => Role::Model,
                "tool" => Role::Tool,
                "system" => Role::System,
                _ => Role::User,
            };

            if current_message.source.trim().is_empty() {
                current_message.role = role;
            } else {
                message_sources.push(current_message);
                current_message = MessageSource::new(role);
            }
        } else if piece.starts_with(HISTORY_MARKER_PREFIX) {
            if !current_message.source.trim().is_empty() {
                message_sources.push(current_message);
            }

            if let Some(history) = data.and_then(|d| d.messages.as_ref()) {
                for msg in transform_messages_to_history(history) {
                    message_sources.push(MessageSource {
                        role: msg.role,
                        source: String::new(),
                        content: Some(msg.content),
                        metadata: msg.metadata,
                    });
                }
            }

            current_message = MessageSource::new(Role::Model);
        } else {
            current_message.source.push_str(&piece);
        }
    }
    message_sources.push(current_message);

    let messages = message_sources_to_messages(message_sources)?;
    let history = data.and_then(|d| d.messages.as_ref());
    Ok(insert_history(messages, history))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn simple_text_is_one_user_message() {
        let messages = to_messages::<Value>("Hello world!", None).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[test]
    fn role_markers_split_messages() {
        let rendered = "<<<dotprompt:role:user>>>Hello\n<<<dotprompt:role:model>>>Hi there!";
        let messages = to_messages::<Value>(rendered, None).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Model);
    }

    #[test]
    fn uppercase_role_name_is_not_recognized() {
        let rendered = "<<<dotprompt:role:SYSTEM>>>still here";
        let messages = to_messages::<Value>(rendered, None).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        let Part::Text(text) = &messages[0].content[0] else {
            panic!("expected text part");
        };
        assert!(text.text.contains("role:SYSTEM"));
    }

    #[test]
    fn media_marker_with_content_type() {
        let rendered = "<<<dotprompt:media:url http://example.com/img.jpg image/jpeg>>>";
        let messages = to_messages::<Value>(rendered, None).unwrap();
        assert!(matches!(messages[0].content[0], Part::Media(_)));
    }

    #[test]
    fn media_marker_missing_url_field_errors() {
        let rendered = "<<<dotprompt:media:url>>>";
        let err = to_messages::<Value>(rendered, None).unwrap_err();
        assert!(matches!(err, PromptError::InvalidMarker(_)));
    }

    #[test]
    fn section_marker_wrong_field_count_errors() {
        let rendered = "<<<dotprompt:section examples extra>>>";
        let err = to_messages::<Value>(rendered, None).unwrap_err();
        assert!(matches!(err, PromptError::InvalidMarker(_)));
    }

    #[test]
    fn history_inserted_before_trailing_user_message() {
        let history = vec![Message {
            role: Role::Model,
            content: vec![Part::Text(TextPart { text: "prior".into(), metadata: None })],
            metadata: None,
        }];
        let data = DataArgument::<Value> { messages: Some(history), ..Default::default() };
        let messages = to_messages("latest question", Some(&data)).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].metadata.as_ref().unwrap()["purpose"], "history");
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn history_marker_splices_at_marker_position() {
        let history = vec![Message {
            role: Role::Model,
            content: vec![Part::Text(TextPart { text: "prior".into(), metadata: None })],
            metadata: None,
        }];
        let data = DataArgument::<Value> { messages: Some(history), ..Default::default() };
        let rendered = "<<<dotprompt:role:system>>>be nice\n<<<dotprompt:history>>>new question";
        let messages = to_messages(rendered, Some(&data)).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].metadata.as_ref().unwrap()["purpose"], "history");
        assert_eq!(messages[2].role, Role::Model);
    }
}
