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

//! Compiles `.prompt` source documents — a YAML frontmatter block followed
//! by a Handlebars-style body — into resolved metadata plus an ordered list
//! of multi-modal conversation messages.
//!
//! The pipeline, leaf to root: [`document`] splits frontmatter from
//! template body and routes reserved/namespaced keys; [`picoschema`]
//! expands the compact schema surface syntax into JSON Schema; [`resolver`]
//! gives tools, schemas, and partials a uniform sync-or-async lookup
//! contract; [`compiler`] merges layered metadata and drives the Handlebars
//! render; [`assembler`] turns the rendered string into typed messages.
//!
//! # Example
//!
//! ```no_run
//! use promptware::{DataArgument, PromptCompiler, PromptCompilerOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
//! let source = "---\nmodel: gemini-pro\n---\nHello {{name}}!";
//!
//! let data = DataArgument {
//!     input: Some(serde_json::json!({"name": "World"})),
//!     ..Default::default()
//! };
//!
//! let rendered = compiler.render(source, &data, None).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

pub mod assembler;
pub mod compiler;
pub mod document;
pub mod error;
pub mod helpers;
pub mod picoschema;
pub mod resolver;
pub mod store;
pub mod types;
pub mod util;

pub use compiler::{PromptCompiler, PromptCompilerOptions};
pub use error::{PromptError, Result};
pub use resolver::{PartialResolver, Resolver, SchemaResolver, ToolResolver};
pub use store::PromptStore;
pub use types::*;
