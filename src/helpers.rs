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

//! Built-in Handlebars helpers.
//!
//! These helpers emit the private `<<<dotprompt:...>>>` markers the message
//! assembler later tokenizes; they never fail on missing arguments, since a
//! malformed marker is easier to diagnose downstream than a render that
//! aborts mid-template. `ifEquals`/`unlessEquals` stay thin wrappers around
//! the block-helper protocol; they don't reimplement template evaluation.

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext, Renderable};

/// Registers all built-in helpers with a Handlebars instance.
pub fn register_builtin_helpers(handlebars: &mut Handlebars) {
    handlebars.register_helper("json", Box::new(json_helper));
    handlebars.register_helper("role", Box::new(role_helper));
    handlebars.register_helper("history", Box::new(history_helper));
    handlebars.register_helper("section", Box::new(section_helper));
    handlebars.register_helper("media", Box::new(media_helper));
    handlebars.register_helper("ifEquals", Box::new(if_equals_helper));
    handlebars.register_helper("unlessEquals", Box::new(unless_equals_helper));
}

/// Parses an `indent` hash argument: an integer or a numeric string, `0`
/// (or absent) meaning compact output.
fn indent_arg(h: &Helper) -> u64 {
    h.hash_get("indent").map_or(0, |v| {
        let value = v.value();
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .unwrap_or(0)
    })
}

/// `{{json value indent=N}}` — serializes `value`, pretty-printed when
/// `indent` is non-zero. Falls back to `"{}"` instead of failing the render.
fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let Some(value) = h.param(0) else {
        out.write("{}")?;
        return Ok(());
    };

    let indent = indent_arg(h);
    let json_str = if indent > 0 {
        serde_json::to_string_pretty(value.value()).unwrap_or_else(|_| "{}".to_string())
    } else {
        serde_json::to_string(value.value()).unwrap_or_else(|_| "{}".to_string())
    };

    out.write(&json_str)?;
    Ok(())
}

/// `{{role "system"}}` — emits `<<<dotprompt:role:system>>>`. An empty or
/// missing parameter emits the empty string rather than failing.
fn role_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let role_str = h.param(0).and_then(|p| p.value().as_str().map(str::to_string));
    if let Some(role_str) = role_str.filter(|s| !s.is_empty()) {
        out.write(&format!("<<<dotprompt:role:{role_str}>>>"))?;
    }
    Ok(())
}

/// `{{history}}` — emits `<<<dotprompt:history>>>`.
fn history_helper(
    _: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write("<<<dotprompt:history>>>")?;
    Ok(())
}

/// `{{section "examples"}}` — emits `<<<dotprompt:section examples>>>`. An
/// empty or missing name emits the empty string.
fn section_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let name_str = h.param(0).and_then(|p| p.value().as_str().map(str::to_string));
    if let Some(name_str) = name_str.filter(|s| !s.is_empty()) {
        out.write(&format!("<<<dotprompt:section {name_str}>>>"))?;
    }
    Ok(())
}

/// `{{media url=".." contentType=".."}}` — emits
/// `<<<dotprompt:media:url <url>[ <contentType>]>>>`. A missing `url` emits
/// the empty string.
fn media_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let Some(url_str) = h.hash_get("url").and_then(|v| v.value().as_str()) else {
        return Ok(());
    };

    let marker = h.hash_get("contentType").and_then(|v| v.value().as_str()).map_or_else(
        || format!("<<<dotprompt:media:url {url_str}>>>"),
        |content_type| format!("<<<dotprompt:media:url {url_str} {content_type}>>>"),
    );

    out.write(&marker)?;
    Ok(())
}

/// `{{#ifEquals a b}}...{{else}}...{{/ifEquals}}`.
fn if_equals_helper<'reg, 'rc>(
    h: &Helper<'rc>,
    hbs: &'reg Handlebars<'reg>,
    ctx: &'rc Context,
    rc: &mut RenderContext<'reg, 'rc>,
    out: &mut dyn Output,
) -> HelperResult {
    let equal = h.param(0).map(handlebars::PathAndJson::value) == h.param(1).map(handlebars::PathAndJson::value);
    let branch = if equal { h.template() } else { h.inverse() };
    if let Some(template) = branch {
        out.write(&template.renders(hbs, ctx, rc)?)?;
    }
    Ok(())
}

/// `{{#unlessEquals a b}}...{{else}}...{{/unlessEquals}}`.
fn unless_equals_helper<'reg, 'rc>(
    h: &Helper<'rc>,
    hbs: &'reg Handlebars<'reg>,
    ctx: &'rc Context,
    rc: &mut RenderContext<'reg, 'rc>,
    out: &mut dyn Output,
) -> HelperResult {
    let equal = h.param(0).map(handlebars::PathAndJson::value) == h.param(1).map(handlebars::PathAndJson::value);
    let branch = if equal { h.inverse() } else { h.template() };
    if let Some(template) = branch {
        out.write(&template.renders(hbs, ctx, rc)?)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, data: &serde_json::Value) -> String {
        let mut hbs = Handlebars::new();
        register_builtin_helpers(&mut hbs);
        hbs.render_template(template, data).expect("render should succeed")
    }

    #[test]
    fn json_helper_compact_by_default() {
        let out = render("{{json obj}}", &json!({"obj": {"foo": "bar"}}));
        assert_eq!(out, r#"{"foo":"bar"}"#);
    }

    #[test]
    fn json_helper_pretty_with_numeric_string_indent() {
        let out = render(r#"{{json obj indent="2"}}"#, &json!({"obj": {"foo": "bar"}}));
        assert!(out.contains('\n'));
    }

    #[test]
    fn json_helper_missing_param_yields_empty_object() {
        let out = render("{{json missing}}", &json!({}));
        assert_eq!(out, "{}");
    }

    #[test]
    fn role_helper_emits_marker() {
        assert_eq!(render(r#"{{role "system"}}"#, &json!({})), "<<<dotprompt:role:system>>>");
    }

    #[test]
    fn role_helper_empty_param_is_empty_string() {
        assert_eq!(render(r#"{{role ""}}"#, &json!({})), "");
    }

    #[test]
    fn media_helper_without_content_type() {
        let out = render(r#"{{media url="http://x/y.png"}}"#, &json!({}));
        assert_eq!(out, "<<<dotprompt:media:url http://x/y.png>>>");
    }

    #[test]
    fn media_helper_missing_url_is_empty_string() {
        assert_eq!(render("{{media}}", &json!({})), "");
    }

    #[test]
    fn if_equals_renders_then_branch() {
        let out = render("{{#ifEquals a b}}yes{{else}}no{{/ifEquals}}", &json!({"a": 1, "b": 1}));
        assert_eq!(out, "yes");
    }

    #[test]
    fn unless_equals_renders_then_branch_when_different() {
        let out = render("{{#unlessEquals a b}}diff{{else}}same{{/unlessEquals}}", &json!({"a": 1, "b": 2}));
        assert_eq!(out, "diff");
    }
}
