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

//! Ties the document parser, Picoschema compiler, metadata resolver,
//! template renderer, and message assembler into one compiling façade.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use handlebars::{Handlebars, HelperDef};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::assembler;
use crate::document;
use crate::error::{PromptError, Result, ResolverKind};
use crate::helpers::register_builtin_helpers;
use crate::picoschema;
use crate::resolver::{resolve, PartialResolver, Resolver, SchemaResolver, ToolResolver};
use crate::store::PromptStore;
use crate::types::{
    DataArgument, JsonSchema, ParsedPrompt, PromptFunction, PromptMetadata, RenderedPrompt,
    ToolDefinition,
};
use crate::util::{merge_config, prune_nulls};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Construction-time configuration for a [`PromptCompiler`].
pub struct PromptCompilerOptions<C = Value> {
    /// Model used when a prompt's frontmatter doesn't specify one.
    pub default_model: Option<String>,
    /// Per-model default `config` values, layered beneath document metadata.
    pub model_configs: Option<HashMap<String, Value>>,
    /// Custom Handlebars helpers, registered additively at construction.
    pub helpers: Option<Vec<(String, Box<dyn HelperDef + Send + Sync>)>>,
    /// Partial template sources known up front.
    pub partials: Option<HashMap<String, String>>,
    /// Statically known tool definitions, checked before `tool_resolver`.
    pub tools: Option<HashMap<String, ToolDefinition>>,
    /// Statically known named schemas, checked before `schema_resolver`.
    pub schemas: Option<HashMap<String, JsonSchema>>,
    /// Resolver for tool names absent from `tools`.
    pub tool_resolver: Option<ToolResolver>,
    /// Resolver for named-schema references absent from `schemas`.
    pub schema_resolver: Option<SchemaResolver>,
    /// Resolver for `{{> name}}` partial references.
    pub partial_resolver: Option<PartialResolver>,
    /// Fallback partial source, consulted after `partial_resolver`.
    pub store: Option<Arc<dyn PromptStore>>,
    _config: std::marker::PhantomData<C>,
}

impl<C> Default for PromptCompilerOptions<C> {
    fn default() -> Self {
        Self {
            default_model: None,
            model_configs: None,
            helpers: None,
            partials: None,
            tools: None,
            schemas: None,
            tool_resolver: None,
            schema_resolver: None,
            partial_resolver: None,
            store: None,
            _config: std::marker::PhantomData,
        }
    }
}

impl<C> std::fmt::Debug for PromptCompilerOptions<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptCompilerOptions")
            .field("default_model", &self.default_model)
            .field("model_configs", &self.model_configs)
            .field("helpers", &self.helpers.as_ref().map(|h| h.len()))
            .field("partials", &self.partials)
            .field("tools", &self.tools)
            .field("schemas", &self.schemas)
            .field("tool_resolver", &self.tool_resolver.as_ref().map(|_| "<resolver>"))
            .field("schema_resolver", &self.schema_resolver.as_ref().map(|_| "<resolver>"))
            .field("partial_resolver", &self.partial_resolver.as_ref().map(|_| "<resolver>"))
            .field("store", &self.store.as_ref().map(|_| "<store>"))
            .finish()
    }
}

/// Compiles and renders `.prompt` documents, owning the Handlebars engine
/// instance, the helper registry, and the static/resolver-backed tool,
/// schema, and partial bindings.
///
/// `C` is the opaque model-config payload type; it defaults to untyped JSON.
pub struct PromptCompiler<C = Value> {
    handlebars: Handlebars<'static>,
    default_model: Option<String>,
    model_configs: HashMap<String, Value>,
    tools: HashMap<String, ToolDefinition>,
    schemas: HashMap<String, JsonSchema>,
    tool_resolver: Option<ToolResolver>,
    schema_resolver: Option<SchemaResolver>,
    partial_resolver: Option<PartialResolver>,
    store: Option<Arc<dyn PromptStore>>,
    _config: std::marker::PhantomData<C>,
}

impl<C> std::fmt::Debug for PromptCompiler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptCompiler")
            .field("handlebars", &"<handlebars>")
            .field("default_model", &self.default_model)
            .field("model_configs", &self.model_configs)
            .field("tools", &self.tools)
            .field("schemas", &self.schemas)
            .field("tool_resolver", &self.tool_resolver.as_ref().map(|_| "<resolver>"))
            .field("schema_resolver", &self.schema_resolver.as_ref().map(|_| "<resolver>"))
            .field("partial_resolver", &self.partial_resolver.as_ref().map(|_| "<resolver>"))
            .field("store", &self.store.as_ref().map(|_| "<store>"))
            .finish()
    }
}

impl<C> PromptCompiler<C> {
    /// Creates a compiler with the given static bindings and resolvers.
    ///
    /// # Panics
    ///
    /// Panics if a preregistered partial's template source fails to compile
    /// (a configuration error, not a runtime one).
    #[allow(clippy::expect_used)]
    pub fn new(options: PromptCompilerOptions<C>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        register_builtin_helpers(&mut handlebars);

        if let Some(helpers) = options.helpers {
            for (name, helper) in helpers {
                handlebars.register_helper(&name, helper);
            }
        }
        if let Some(partials) = options.partials {
            for (name, source) in partials {
                handlebars
                    .register_template_string(&name, source)
                    .expect("preregistered partial should compile");
            }
        }

        Self {
            handlebars,
            default_model: options.default_model,
            model_configs: options.model_configs.unwrap_or_default(),
            tools: options.tools.unwrap_or_default(),
            schemas: options.schemas.unwrap_or_default(),
            tool_resolver: options.tool_resolver,
            schema_resolver: options.schema_resolver,
            partial_resolver: options.partial_resolver,
            store: options.store,
            _config: std::marker::PhantomData,
        }
    }

    /// Registers a custom Handlebars helper. Additive and idempotent per name.
    pub fn define_helper(&mut self, name: impl Into<String>, helper: Box<dyn HelperDef + Send + Sync>) -> &mut Self {
        self.handlebars.register_helper(&name.into(), helper);
        self
    }

    /// Registers a partial template up front, bypassing resolver lookup.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if the source fails to compile.
    pub fn define_partial(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<&mut Self> {
        let name = name.into();
        self.handlebars
            .register_template_string(&name, source.into())
            .map_err(|e| PromptError::Template(e.to_string()))?;
        Ok(self)
    }

    /// Registers a static tool definition, checked before `tool_resolver`.
    pub fn define_tool(&mut self, def: ToolDefinition) -> &mut Self {
        self.tools.insert(def.name.clone(), def);
        self
    }

    /// Registers a static named schema, checked before `schema_resolver`.
    pub fn define_schema(&mut self, name: impl Into<String>, schema: JsonSchema) -> &mut Self {
        self.schemas.insert(name.into(), schema);
        self
    }

    /// Parses a `.prompt` source document. Never fails (see [`document::parse`]).
    #[must_use]
    pub fn parse<M>(&self, source: &str) -> ParsedPrompt<M>
    where
        M: DeserializeOwned,
    {
        document::parse(source)
    }
}

impl<C> PromptCompiler<C>
where
    C: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Parses `source`, applies `override_metadata` over its frontmatter
    /// metadata, resolves and registers every transitively referenced
    /// partial, and returns a reusable [`PromptFunction`].
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced partial can't be resolved or fails
    /// to compile as a Handlebars template.
    pub async fn compile(
        &mut self,
        source: &str,
        override_metadata: Option<PromptMetadata<C>>,
    ) -> Result<PromptFunction<C>> {
        let mut parsed: ParsedPrompt<C> = document::parse(source);
        if let Some(extra) = override_metadata {
            parsed.metadata = layer_metadata(parsed.metadata, extra);
        }
        self.resolve_partials(&parsed.template).await?;
        Ok(PromptFunction { prompt: parsed })
    }

    /// Renders an already-[`compile`](Self::compile)d prompt function against
    /// `data`: resolves final metadata, renders the Handlebars body, and
    /// assembles the result into an ordered message list.
    ///
    /// # Errors
    ///
    /// Returns an error if metadata resolution, template rendering, or
    /// message assembly fails.
    pub async fn render_compiled<V>(
        &self,
        function: &PromptFunction<C>,
        data: &DataArgument<V>,
    ) -> Result<RenderedPrompt<C>>
    where
        V: Serialize,
    {
        let mut metadata = self.resolve_metadata(function.prompt.metadata.clone()).await?;
        let input_default = metadata.input.as_ref().and_then(|i| i.default.clone());
        metadata.input = None;

        let mut context = input_default.unwrap_or_default();
        if let Some(input) = data.input.as_ref() {
            if let Ok(Value::Object(map)) = serde_json::to_value(input) {
                for (k, v) in map {
                    context.insert(k, v);
                }
            }
        }

        let mut runtime = serde_json::Map::new();
        for (k, v) in context {
            runtime.insert(k, v);
        }

        let metadata_value = prune_nulls(serde_json::to_value(&metadata)?);
        let mut at_metadata = serde_json::Map::new();
        at_metadata.insert("prompt".to_string(), metadata_value);
        at_metadata.insert("docs".to_string(), serde_json::to_value(&data.docs)?);
        at_metadata.insert("messages".to_string(), serde_json::to_value(&data.messages)?);
        runtime.insert("__at_metadata".to_string(), Value::Object(at_metadata));

        if let Some(ctx) = &data.context {
            for (k, v) in ctx {
                runtime.insert(format!("__at_{k}"), v.clone());
            }
        }

        let preprocessed = preprocess_at_variables(&function.prompt.template);
        let rendered_string = self
            .handlebars
            .render_template(&preprocessed, &Value::Object(runtime))
            .map_err(|e| PromptError::Template(e.to_string()))?;

        let messages = assembler::to_messages(&rendered_string, Some(data))?;
        Ok(RenderedPrompt { metadata, messages })
    }

    /// Compiles `source` and immediately renders it against `data`.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`compile`](Self::compile)
    /// and [`render_compiled`](Self::render_compiled).
    pub async fn render<V>(
        &mut self,
        source: &str,
        data: &DataArgument<V>,
        override_metadata: Option<PromptMetadata<C>>,
    ) -> Result<RenderedPrompt<C>>
    where
        V: Serialize,
    {
        let function = self.compile(source, override_metadata).await?;
        self.render_compiled(&function, data).await
    }

    /// Resolves final metadata: layers the per-model default config beneath
    /// `metadata` (which already carries any call-site override merged in by
    /// [`compile`](Self::compile)), null-prunes the result, then concurrently
    /// resolves tool names and input/output Picoschema.
    ///
    /// # Errors
    ///
    /// Returns an error if a resolver fails, or if Picoschema compilation of
    /// `input.schema`/`output.schema` fails.
    pub async fn resolve_metadata(&self, metadata: PromptMetadata<C>) -> Result<PromptMetadata<C>> {
        let model_id = metadata.model.clone().or_else(|| self.default_model.clone());
        let mut base = PromptMetadata::default();
        base.model.clone_from(&self.default_model);
        if let Some(id) = &model_id {
            if let Some(value) = self.model_configs.get(id).cloned() {
                base.config = serde_json::from_value(value).ok();
            }
        }

        let merged = layer_metadata(base, metadata);

        let value = serde_json::to_value(&merged)?;
        let pruned = prune_nulls(value);
        let mut merged: PromptMetadata<C> = serde_json::from_value(pruned)?;

        merged = self.resolve_tools(merged).await?;
        merged = self.resolve_schemas(merged).await?;
        Ok(merged)
    }

    async fn resolve_tools(&self, mut meta: PromptMetadata<C>) -> Result<PromptMetadata<C>> {
        let Some(tool_names) = meta.tools.take() else {
            return Ok(meta);
        };
        if tool_names.is_empty() {
            return Ok(meta);
        }

        let mut set = JoinSet::new();
        for name in tool_names {
            let tools = self.tools.clone();
            let resolver = self.tool_resolver.clone();
            set.spawn(async move { resolve_tool(name, tools, resolver).await });
        }

        let mut defs = meta.tool_defs.take().unwrap_or_default();
        let mut residue = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok((_, Some(def)))) => defs.push(def),
                Ok(Ok((name, None))) => residue.push(name),
                Ok(Err(err)) => {
                    set.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    set.abort_all();
                    return Err(PromptError::resolver_failed("tool", ResolverKind::Tool, join_err));
                }
            }
        }

        if !defs.is_empty() {
            meta.tool_defs = Some(defs);
        }
        if !residue.is_empty() {
            meta.tools = Some(residue);
        }
        Ok(meta)
    }

    async fn resolve_schemas(&self, mut meta: PromptMetadata<C>) -> Result<PromptMetadata<C>> {
        let schema_resolver = combined_schema_resolver(self.schemas.clone(), self.schema_resolver.clone());

        let input_schema = meta.input.as_mut().and_then(|i| i.schema.take());
        let output_schema = meta.output.as_mut().and_then(|o| o.schema.take());

        let (input_compiled, output_compiled) = tokio::join!(
            compile_optional_schema(input_schema, &schema_resolver),
            compile_optional_schema(output_schema, &schema_resolver),
        );

        if let Some(input) = meta.input.as_mut() {
            input.schema = input_compiled?;
        }
        if let Some(output) = meta.output.as_mut() {
            output.schema = output_compiled?;
        }
        Ok(meta)
    }

    /// Scans `template` for `{{> name}}` references and resolves every one
    /// transitively, registering each with the Handlebars engine. A name
    /// already registered (via `PromptCompilerOptions.partials` or
    /// `define_partial`) is left alone — no resolver or store lookup is
    /// attempted for it.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced partial not already registered can't
    /// be resolved through either the configured `PartialResolver` or the
    /// fallback `PromptStore`, or fails to compile as a Handlebars template.
    pub async fn resolve_partials(&mut self, template: &str) -> Result<()> {
        let registered: Arc<HashSet<String>> =
            Arc::new(self.handlebars.get_templates().keys().cloned().collect());
        let resolved = Arc::new(Mutex::new(HashMap::new()));
        resolve_partials_into(
            template.to_string(),
            self.partial_resolver.clone(),
            self.store.clone(),
            Arc::clone(&resolved),
            Arc::clone(&registered),
        )
        .await?;

        let sources = match Arc::try_unwrap(resolved) {
            Ok(mutex) => mutex.into_inner(),
            Err(arc) => arc.lock().await.clone(),
        };
        for (name, source) in sources {
            if self.handlebars.get_template(&name).is_some() {
                continue;
            }
            self.handlebars
                .register_template_string(&name, source)
                .map_err(|e| PromptError::Template(e.to_string()))?;
        }
        Ok(())
    }
}

/// Merges `incoming` over `base`: non-null scalar/list fields on `incoming`
/// replace `base` outright; `config` is deep-merged one level.
fn layer_metadata<C>(mut base: PromptMetadata<C>, incoming: PromptMetadata<C>) -> PromptMetadata<C>
where
    C: Serialize + DeserializeOwned,
{
    if incoming.name.is_some() {
        base.name = incoming.name;
    }
    if incoming.variant.is_some() {
        base.variant = incoming.variant;
    }
    if incoming.version.is_some() {
        base.version = incoming.version;
    }
    if incoming.description.is_some() {
        base.description = incoming.description;
    }
    if incoming.model.is_some() {
        base.model = incoming.model;
    }
    if incoming.tools.is_some() {
        base.tools = incoming.tools;
    }
    if incoming.tool_defs.is_some() {
        base.tool_defs = incoming.tool_defs;
    }
    base.config = merge_config_typed(base.config, incoming.config);
    if incoming.input.is_some() {
        base.input = incoming.input;
    }
    if incoming.output.is_some() {
        base.output = incoming.output;
    }
    if incoming.raw.is_some() {
        base.raw = incoming.raw;
    }
    if incoming.ext.is_some() {
        base.ext = incoming.ext;
    }
    if incoming.metadata.is_some() {
        base.metadata = incoming.metadata;
    }
    base
}

fn merge_config_typed<C>(base: Option<C>, incoming: Option<C>) -> Option<C>
where
    C: Serialize + DeserializeOwned,
{
    let base_value = base.and_then(|c| serde_json::to_value(c).ok());
    let incoming_value = incoming.and_then(|c| serde_json::to_value(c).ok());
    let merged = merge_config(base_value, incoming_value)?;
    serde_json::from_value(merged).ok()
}

async fn compile_optional_schema(schema: Option<Value>, resolver: &SchemaResolver) -> Result<Option<Value>> {
    match schema {
        Some(s) => picoschema::compile(&s, Some(resolver)).await,
        None => Ok(None),
    }
}

/// Builds a schema resolver that checks the static `schemas` map first,
/// falling back to `schema_resolver` only when the name isn't there.
fn combined_schema_resolver(schemas: HashMap<String, JsonSchema>, schema_resolver: Option<SchemaResolver>) -> SchemaResolver {
    Resolver::async_fallible(move |name| {
        let schemas = schemas.clone();
        let schema_resolver = schema_resolver.clone();
        let name = name.to_string();
        async move {
            if let Some(schema) = schemas.get(&name) {
                return Ok(Some(schema.clone()));
            }
            let Some(resolver) = schema_resolver else {
                return Ok(None);
            };
            match resolve(&name, ResolverKind::Schema, Some(&resolver)).await {
                Ok(v) => Ok(Some(v)),
                Err(PromptError::NotFound { .. } | PromptError::NotConfigured { .. }) => Ok(None),
                Err(other) => Err(Box::new(other) as crate::resolver::ResolverError),
            }
        }
    })
}

async fn resolve_tool(
    name: String,
    tools: HashMap<String, ToolDefinition>,
    tool_resolver: Option<ToolResolver>,
) -> Result<(String, Option<ToolDefinition>)> {
    if let Some(def) = tools.get(&name) {
        return Ok((name, Some(def.clone())));
    }
    let Some(resolver) = tool_resolver else {
        return Ok((name, None));
    };
    match resolve(&name, ResolverKind::Tool, Some(&resolver)).await {
        Ok(def) => Ok((name, Some(def))),
        Err(PromptError::NotFound { .. }) => Ok((name, None)),
        Err(other) => Err(other),
    }
}

static PARTIAL_REF_RE: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn partial_ref_regex() -> &'static Regex {
    PARTIAL_REF_RE.get_or_init(|| {
        Regex::new(r"\{\{~?\s*>\s*([A-Za-z0-9_.-]+)\s*~?\}\}").expect("failed to compile partial-reference regex")
    })
}

/// Lexically scans `template` for `{{> name}}` references. Best-effort and
/// over-approximating (it does not parse comments or string literals out);
/// safe because partial registration is idempotent.
fn identify_partials(template: &str) -> HashSet<String> {
    partial_ref_regex()
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

async fn resolve_partial_source(
    name: &str,
    partial_resolver: Option<&PartialResolver>,
    store: Option<&(dyn PromptStore)>,
) -> Result<String> {
    if let Some(resolver) = partial_resolver {
        match resolve(name, ResolverKind::Partial, Some(resolver)).await {
            Ok(partial) => return Ok(partial.source),
            Err(PromptError::NotFound { .. }) => {}
            Err(other) => return Err(other),
        }
    }
    if let Some(store) = store {
        if let Some(partial) = store.load_partial(name)? {
            return Ok(partial.source);
        }
    }
    if partial_resolver.is_none() && store.is_none() {
        return Err(PromptError::NotConfigured { kind: ResolverKind::Partial });
    }
    Err(PromptError::NotFound {
        name: name.to_string(),
        kind: ResolverKind::Partial,
    })
}

/// Recursively resolves every partial transitively referenced from
/// `template` into `resolved`, skipping names already registered with the
/// Handlebars engine (pre-registered via `PromptCompilerOptions.partials` or
/// `define_partial`), running sibling resolutions concurrently and aborting
/// the whole group on the first failure.
fn resolve_partials_into(
    template: String,
    partial_resolver: Option<PartialResolver>,
    store: Option<Arc<dyn PromptStore>>,
    resolved: Arc<Mutex<HashMap<String, String>>>,
    registered: Arc<HashSet<String>>,
) -> BoxFuture<Result<()>> {
    Box::pin(async move {
        let pending: Vec<String> = {
            let mut guard = resolved.lock().await;
            identify_partials(&template)
                .into_iter()
                .filter(|name| {
                    if registered.contains(name) || guard.contains_key(name) {
                        false
                    } else {
                        guard.insert(name.clone(), String::new());
                        true
                    }
                })
                .collect()
        };

        if pending.is_empty() {
            return Ok(());
        }

        let mut set = JoinSet::new();
        for name in pending {
            let partial_resolver = partial_resolver.clone();
            let store = store.clone();
            let resolved = Arc::clone(&resolved);
            let registered = Arc::clone(&registered);
            set.spawn(async move {
                let source = resolve_partial_source(&name, partial_resolver.as_ref(), store.as_deref()).await?;
                resolve_partials_into(source.clone(), partial_resolver, store, Arc::clone(&resolved), registered).await?;
                resolved.lock().await.insert(name, source);
                Ok::<(), PromptError>(())
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    set.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    set.abort_all();
                    return Err(PromptError::resolver_failed("partial", ResolverKind::Partial, join_err));
                }
            }
        }
        Ok(())
    })
}

static AT_VAR_RE: OnceLock<Regex> = OnceLock::new();
static MUSTACHE_TAG_RE: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn at_var_regex() -> &'static Regex {
    AT_VAR_RE.get_or_init(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("failed to compile @-variable regex"))
}

#[allow(clippy::expect_used)]
fn mustache_tag_regex() -> &'static Regex {
    MUSTACHE_TAG_RE.get_or_init(|| Regex::new(r"(?s)\{\{.*?\}\}").expect("failed to compile mustache-tag regex"))
}

/// Rewrites `@name[.path]` references to `__at_name[.path]`, but only inside
/// `{{...}}` mustache tags.
///
/// Handlebars-rust has no notion of arbitrary `@`-prefixed top-level
/// variables (only its own private `@index`/`@key` inside block helpers), so
/// the ambient `@metadata.*` and `@<context-key>` data is exposed under a
/// `__at_`-prefixed name instead and the template text is rewritten to match.
/// The rewrite is confined to mustache tags so literal `@` text in the
/// template body (an email address, an `@mention`) passes through untouched.
fn preprocess_at_variables(template: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut last_end = 0;
    for tag in mustache_tag_regex().find_iter(template) {
        result.push_str(&template[last_end..tag.start()]);
        result.push_str(&at_var_regex().replace_all(tag.as_str(), "__at_$1"));
        last_end = tag.end();
    }
    result.push_str(&template[last_end..]);
    result
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preprocess_rewrites_at_metadata_path() {
        assert_eq!(preprocess_at_variables("{{@metadata.prompt.model}}"), "{{__at_metadata.prompt.model}}");
    }

    #[test]
    fn preprocess_rewrites_bare_context_key() {
        assert_eq!(preprocess_at_variables("{{@turnCount}}"), "{{__at_turnCount}}");
    }

    #[test]
    fn preprocess_leaves_literal_at_signs_in_body_text_untouched() {
        assert_eq!(
            preprocess_at_variables("Contact joe@acme.com, ping @team. {{@turnCount}}"),
            "Contact joe@acme.com, ping @team. {{__at_turnCount}}"
        );
    }

    #[tokio::test]
    async fn render_simple_variable() {
        let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
        let data = DataArgument {
            input: Some(json!({"name": "Ada"})),
            ..Default::default()
        };
        let rendered = compiler
            .render("Hello {{name}}!", &data, None)
            .await
            .expect("render should succeed");
        assert_eq!(rendered.messages.len(), 1);
    }

    #[tokio::test]
    async fn default_model_applies_when_frontmatter_silent() {
        let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions {
            default_model: Some("gemini-pro".to_string()),
            ..Default::default()
        });
        let rendered = compiler
            .render("Hi!", &DataArgument::<Value>::default(), None)
            .await
            .expect("render should succeed");
        assert_eq!(rendered.metadata.model.as_deref(), Some("gemini-pro"));
    }

    #[tokio::test]
    async fn override_model_wins_over_document_model() {
        let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
        let source = "---\nmodel: gemini-pro\n---\nHi!";
        let overrides = PromptMetadata {
            model: Some("gemini-ultra".to_string()),
            ..Default::default()
        };
        let rendered = compiler
            .render(source, &DataArgument::<Value>::default(), Some(overrides))
            .await
            .expect("render should succeed");
        assert_eq!(rendered.metadata.model.as_deref(), Some("gemini-ultra"));
    }

    #[tokio::test]
    async fn tool_resolution_residue() {
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
        let tool_resolver: ToolResolver = Resolver::sync(|name| {
            (name == "b").then(|| ToolDefinition {
                name: name.to_string(),
                description: None,
                input_schema: json!({}),
                output_schema: None,
            })
        });

        let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions {
            tools: Some(tools),
            tool_resolver: Some(tool_resolver),
            ..Default::default()
        });

        let source = "---\ntools: [a, b, c]\n---\nHi!";
        let rendered = compiler
            .render(source, &DataArgument::<Value>::default(), None)
            .await
            .expect("render should succeed");
        let defs = rendered.metadata.tool_defs.expect("tool_defs populated");
        let names: HashSet<_> = defs.iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, HashSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(rendered.metadata.tools, Some(vec!["c".to_string()]));
    }

    #[tokio::test]
    async fn partial_resolved_and_rendered() {
        let partial_resolver: PartialResolver = Resolver::sync(|name| {
            (name == "greeting").then(|| crate::types::PartialSource {
                source: "Hi, {{name}}!".to_string(),
            })
        });
        let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions {
            partial_resolver: Some(partial_resolver),
            ..Default::default()
        });
        let data = DataArgument {
            input: Some(json!({"name": "Ada"})),
            ..Default::default()
        };
        let rendered = compiler
            .render("{{> greeting}}", &data, None)
            .await
            .expect("render should succeed");
        let crate::types::Part::Text(text) = &rendered.messages[0].content[0] else {
            panic!("expected text part");
        };
        assert_eq!(text.text, "Hi, Ada!");
    }

    #[tokio::test]
    async fn preregistered_partial_needs_no_resolver_or_store() {
        let mut partials = HashMap::new();
        partials.insert("greeting".to_string(), "Hi, {{name}}!".to_string());
        let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions {
            partials: Some(partials),
            ..Default::default()
        });
        let data = DataArgument {
            input: Some(json!({"name": "Ada"})),
            ..Default::default()
        };
        let rendered = compiler
            .render("{{> greeting}}", &data, None)
            .await
            .expect("a partial supplied via PromptCompilerOptions.partials needs no resolver or store");
        let crate::types::Part::Text(text) = &rendered.messages[0].content[0] else {
            panic!("expected text part");
        };
        assert_eq!(text.text, "Hi, Ada!");
    }

    #[tokio::test]
    async fn define_partial_needs_no_resolver_or_store() {
        let mut compiler: PromptCompiler = PromptCompiler::new(PromptCompilerOptions::default());
        compiler
            .define_partial("greeting", "Hi, {{name}}!")
            .expect("partial source compiles");
        let data = DataArgument {
            input: Some(json!({"name": "Ada"})),
            ..Default::default()
        };
        let rendered = compiler
            .render("{{> greeting}}", &data, None)
            .await
            .expect("a partial registered via define_partial needs no resolver or store");
        let crate::types::Part::Text(text) = &rendered.messages[0].content[0] else {
            panic!("expected text part");
        };
        assert_eq!(text.text, "Hi, Ada!");
    }
}
