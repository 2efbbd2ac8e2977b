//! Template rendering.
//!
//! The renderer is a pure function over text: scalar tags (`{{name}}`,
//! dotted paths allowed) resolve against a stack of JSON scopes, block
//! sections (`{{#name}}…{{/name}}`) repeat or suppress their body based on
//! the named value, and two-token placeholders (`{{helperName expr}}`)
//! invoke a registered [`Helper`](crate::helpers::Helper).
//!
//! Helper invocations are handled as rewritten block sections: the helper
//! receives the unevaluated inner expression (raw kind) or its rendered
//! value (rendered kind), never both. This is not a general-purpose
//! template language; it covers exactly what generator templates need.

use serde_json::Value;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::helpers::{Helper, HelperRegistry};

/// Template renderer with a helper registry.
#[derive(Debug, Clone)]
pub struct Renderer {
    helpers: HelperRegistry,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Create a renderer with the built-in helpers.
    pub fn new() -> Self {
        Self {
            helpers: HelperRegistry::new(),
        }
    }

    /// Create a renderer from an existing helper registry.
    pub fn with_helpers(helpers: HelperRegistry) -> Self {
        Self { helpers }
    }

    /// The helper registry.
    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    /// Mutable access to the helper registry, for host registration.
    pub fn helpers_mut(&mut self) -> &mut HelperRegistry {
        &mut self.helpers
    }

    /// Render a template against a context value.
    ///
    /// Unbound scalar tags render as the empty string.
    pub fn render(&self, template: &str, context: &Value) -> TemplateResult<String> {
        self.render_scoped(template, &[context])
    }

    fn render_scoped(&self, template: &str, scopes: &[&Value]) -> TemplateResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);

            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| TemplateError::UnclosedTag(snippet(&rest[start..])))?;
            let tag = after[..end].trim();
            let tag_end = start + 2 + end + 2;

            if let Some(name) = tag.strip_prefix('#') {
                let name = name.trim();
                let (body, body_len) = section_body(&rest[tag_end..], name)?;
                self.render_section(name, body, scopes, &mut out)?;
                rest = &rest[tag_end + body_len..];
            } else if let Some(name) = tag.strip_prefix('/') {
                return Err(TemplateError::UnbalancedSection(name.trim().to_string()));
            } else if tag.starts_with('!') {
                // comment tag
                rest = &rest[tag_end..];
            } else if let Some((head, expr)) = split_two_tokens(tag) {
                if let Some(helper) = self.helpers.get(head) {
                    out.push_str(&self.apply_helper(helper, expr, scopes));
                } else {
                    debug!("Ignoring unknown helper '{}' in tag '{{{{{}}}}}'", head, tag);
                }
                rest = &rest[tag_end..];
            } else {
                out.push_str(&value_to_string(lookup(scopes, tag)));
                rest = &rest[tag_end..];
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    fn render_section(
        &self,
        name: &str,
        body: &str,
        scopes: &[&Value],
        out: &mut String,
    ) -> TemplateResult<()> {
        match lookup(scopes, name) {
            Some(Value::Array(items)) => {
                for item in items {
                    let mut inner = scopes.to_vec();
                    inner.push(item);
                    out.push_str(&self.render_scoped(body, &inner)?);
                }
            }
            Some(value @ Value::Object(_)) if is_truthy(value) => {
                let mut inner = scopes.to_vec();
                inner.push(value);
                out.push_str(&self.render_scoped(body, &inner)?);
            }
            Some(value) if is_truthy(value) => {
                out.push_str(&self.render_scoped(body, scopes)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_helper(&self, helper: &Helper, expr: &str, scopes: &[&Value]) -> String {
        match helper {
            Helper::Rendered(f) => f(&value_to_string(lookup(scopes, expr))),
            Helper::Raw(f) => {
                let render = |template: &str| {
                    self.render_scoped(template, scopes).unwrap_or_else(|e| {
                        debug!("Helper sub-render failed: {}", e);
                        String::new()
                    })
                };
                f(expr, &render)
            }
        }
    }
}

/// Find the body of a section opened with `name`, honoring same-name
/// nesting. Returns the inner body slice and the total length consumed
/// including the closing tag.
fn section_body<'t>(rest: &'t str, name: &str) -> TemplateResult<(&'t str, usize)> {
    let mut depth = 1usize;
    let mut cursor = 0usize;

    while let Some(start) = rest[cursor..].find("{{") {
        let tag_start = cursor + start;
        let after = &rest[tag_start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError::UnclosedTag(snippet(&rest[tag_start..])))?;
        let tag = after[..end].trim();
        let tag_end = tag_start + 2 + end + 2;

        if let Some(inner) = tag.strip_prefix('#') {
            if inner.trim() == name {
                depth += 1;
            }
        } else if let Some(inner) = tag.strip_prefix('/') {
            if inner.trim() == name {
                depth -= 1;
                if depth == 0 {
                    return Ok((&rest[..tag_start], tag_end));
                }
            }
        }

        cursor = tag_end;
    }

    Err(TemplateError::UnclosedSection(name.to_string()))
}

/// Split a two-token tag into `(head, expr)`; `None` for single tokens.
fn split_two_tokens(tag: &str) -> Option<(&str, &str)> {
    let (head, expr) = tag.split_once(char::is_whitespace)?;
    let expr = expr.trim();
    if expr.is_empty() {
        return None;
    }
    Some((head, expr))
}

/// Resolve a dotted path against the scope stack, innermost scope first.
fn lookup<'a>(scopes: &[&'a Value], path: &str) -> Option<&'a Value> {
    for scope in scopes.iter().rev() {
        let mut current = *scope;
        let mut found = true;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(next) => current = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            return Some(current);
        }
    }
    None
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_to_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn snippet(s: &str) -> String {
    s.chars().take(24).collect()
}
