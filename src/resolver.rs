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

//! The uniform resolver contract shared by tools, schemas, and partials.
//!
//! A resolver looks up a named object and returns `Ok(Some(value))`,
//! `Ok(None)` (not found), or `Err(reason)` (the lookup itself failed). Two
//! flavors are supported: a plain synchronous closure, dispatched to the
//! blocking worker pool so it can never stall the render loop, and an
//! asynchronous closure, awaited directly. Both flavors are driven through
//! [`resolve`], which applies the same not-configured / not-found /
//! resolver-failed error mapping regardless of which flavor is in play.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{PromptError, Result, ResolverKind};
use crate::types::{JsonSchema, PartialSource, ToolDefinition};

/// Error type a resolver closure may report for a failed lookup.
pub type ResolverError = Box<dyn std::error::Error + Send + Sync>;

/// What a resolver closure returns: found, not found, or failed.
pub type ResolverOutcome<T> = std::result::Result<Option<T>, ResolverError>;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A named-object resolver, either synchronous or asynchronous.
///
/// Construct with [`Resolver::sync`]/[`Resolver::async_fn`] for infallible
/// closures (never return an `Err`) or [`Resolver::sync_fallible`]/
/// [`Resolver::async_fallible`] when the lookup itself can fail.
pub enum Resolver<T> {
    /// A blocking closure, offloaded to [`tokio::task::spawn_blocking`].
    Sync(Arc<dyn Fn(&str) -> ResolverOutcome<T> + Send + Sync>),
    /// An async closure, awaited on the caller's task.
    Async(Arc<dyn Fn(&str) -> BoxFuture<ResolverOutcome<T>> + Send + Sync>),
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(f) => Self::Sync(Arc::clone(f)),
            Self::Async(f) => Self::Async(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Resolver::Sync(<closure>)"),
            Self::Async(_) => f.write_str("Resolver::Async(<closure>)"),
        }
    }
}

impl<T: Send + 'static> Resolver<T> {
    /// Wraps an infallible synchronous lookup function.
    pub fn sync(f: impl Fn(&str) -> Option<T> + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(move |name| Ok(f(name))))
    }

    /// Wraps a synchronous lookup function that can itself fail.
    pub fn sync_fallible(f: impl Fn(&str) -> ResolverOutcome<T> + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(f))
    }

    /// Wraps an infallible async lookup function.
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(&str) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        Self::Async(Arc::new(move |name| {
            let fut = f(name);
            Box::pin(async move { Ok(fut.await) })
        }))
    }

    /// Wraps an async lookup function that can itself fail.
    pub fn async_fallible<F, Fut>(f: F) -> Self
    where
        F: Fn(&str) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverOutcome<T>> + Send + 'static,
    {
        Self::Async(Arc::new(move |name| Box::pin(f(name))))
    }
}

/// A resolver for named tool definitions.
pub type ToolResolver = Resolver<ToolDefinition>;
/// A resolver for named JSON Schemas.
pub type SchemaResolver = Resolver<JsonSchema>;
/// A resolver for named partial template sources.
pub type PartialResolver = Resolver<PartialSource>;

/// Runs `resolver` for `name`, applying the uniform not-configured /
/// not-found / resolver-failed contract.
///
/// A synchronous resolver runs on the blocking worker pool so a slow or
/// CPU-bound lookup never stalls the render loop; a panic there surfaces as
/// [`PromptError::ResolverFailed`], same as a reported `Err`.
///
/// # Errors
///
/// Returns [`PromptError::NotConfigured`] if `resolver` is `None`,
/// [`PromptError::NotFound`] if it resolves to `Ok(None)`, and
/// [`PromptError::ResolverFailed`] if it resolves to `Err` or panics.
pub async fn resolve<T: Send + 'static>(
    name: &str,
    kind: ResolverKind,
    resolver: Option<&Resolver<T>>,
) -> Result<T> {
    let Some(resolver) = resolver else {
        return Err(PromptError::NotConfigured { kind });
    };

    let outcome = match resolver {
        Resolver::Sync(f) => {
            let f = Arc::clone(f);
            let owned_name = name.to_string();
            tokio::task::spawn_blocking(move || f(&owned_name))
                .await
                .map_err(|join_err| PromptError::resolver_failed(name, kind, join_err))?
        }
        Resolver::Async(f) => {
            let fut = f(name);
            tokio::spawn(fut)
                .await
                .map_err(|join_err| PromptError::resolver_failed(name, kind, join_err))?
        }
    };

    match outcome {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(PromptError::NotFound {
            name: name.to_string(),
            kind,
        }),
        Err(reason) => Err(PromptError::resolver_failed(name, kind, reason)),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect() for clarity
mod tests {
    use super::*;

    #[tokio::test]
    async fn sync_resolver_found() {
        let r: ToolResolver = Resolver::sync(|name| {
            (name == "search").then(|| ToolDefinition {
                name: name.to_string(),
                description: None,
                input_schema: serde_json::json!({}),
                output_schema: None,
            })
        });
        let tool = resolve("search", ResolverKind::Tool, Some(&r))
            .await
            .expect("resolves");
        assert_eq!(tool.name, "search");
    }

    #[tokio::test]
    async fn sync_resolver_not_found() {
        let r: ToolResolver = Resolver::sync(|_| None);
        let err = resolve("missing", ResolverKind::Tool, Some(&r))
            .await
            .expect_err("should not be found");
        assert!(matches!(err, PromptError::NotFound { .. }));
    }

    #[tokio::test]
    async fn no_resolver_configured() {
        let err = resolve::<ToolDefinition>("anything", ResolverKind::Tool, None)
            .await
            .expect_err("no resolver was given");
        assert!(matches!(err, PromptError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn sync_resolver_reports_failure() {
        let r: ToolResolver = Resolver::sync_fallible(|_| Err("boom".into()));
        let err = resolve("x", ResolverKind::Tool, Some(&r))
            .await
            .expect_err("resolver fails");
        assert!(matches!(err, PromptError::ResolverFailed { .. }));
    }

    #[tokio::test]
    async fn async_resolver_found() {
        let r: SchemaResolver = Resolver::async_fn(|name| {
            let name = name.to_string();
            async move { (name == "Person").then(|| serde_json::json!({"type": "object"})) }
        });
        let schema = resolve("Person", ResolverKind::Schema, Some(&r))
            .await
            .expect("resolves");
        assert_eq!(schema["type"], "object");
    }
}
