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

//! Small value-shape utilities shared by the metadata resolver.

use serde_json::{Map, Value};

/// Recursively removes `null` values from mappings, leaving arrays and
/// scalars untouched except for nested pruning.
///
/// Mappings drop keys whose value is `null` (after pruning the value, so a
/// mapping that becomes `{}` is still kept, only top-level nulls are
/// dropped). Arrays keep every non-null element, pruning each in place.
#[must_use]
pub fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut pruned = Map::new();
            for (k, v) in map {
                if v.is_null() {
                    continue;
                }
                pruned.insert(k, prune_nulls(v));
            }
            Value::Object(pruned)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(prune_nulls)
                .collect(),
        ),
        other => other,
    }
}

/// Deep-merges `incoming` into `base` one level: for objects, each key of
/// `incoming` overwrites the corresponding key of `base` (recursing into
/// nested objects one level only — deeper values replace wholesale).
#[must_use]
pub fn merge_config(base: Option<Value>, incoming: Option<Value>) -> Option<Value> {
    match (base, incoming) {
        (Some(Value::Object(mut base_map)), Some(Value::Object(incoming_map))) => {
            for (k, v) in incoming_map {
                base_map.insert(k, v);
            }
            Some(Value::Object(base_map))
        }
        (base, Some(incoming)) if !incoming.is_null() => Some(incoming),
        (base, _) => base,
    }
}
