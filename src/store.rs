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

//! The optional partial-source fallback contract.
//!
//! A `PromptStore` is consulted only when a `{{> name}}` reference can't be
//! resolved through a [`PartialResolver`](crate::resolver::PartialResolver).
//! File/directory-backed stores, pagination, and writes are host concerns,
//! not part of the core.

use crate::error::Result;
use crate::types::PartialSource;

/// Fallback source of partial templates, consulted after the configured
/// [`PartialResolver`](crate::resolver::PartialResolver) comes up empty.
pub trait PromptStore: Send + Sync {
    /// Loads a partial's template source by name.
    ///
    /// Returns `Ok(None)` when the store has no partial by that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store itself cannot be accessed.
    fn load_partial(&self, name: &str) -> Result<Option<PartialSource>>;
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapStore(HashMap<String, String>);

    impl PromptStore for MapStore {
        fn load_partial(&self, name: &str) -> Result<Option<PartialSource>> {
            Ok(self.0.get(name).map(|source| PartialSource {
                source: source.clone(),
            }))
        }
    }

    #[test]
    fn found_and_missing() {
        let store = MapStore(HashMap::from([("greeting".to_string(), "Hi!".to_string())]));
        assert_eq!(
            store.load_partial("greeting").expect("store access ok").map(|p| p.source),
            Some("Hi!".to_string())
        );
        assert!(store.load_partial("missing").expect("store access ok").is_none());
    }
}
