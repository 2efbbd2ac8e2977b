//! Placeholder tag scanning.
//!
//! Static analysis of a template's placeholders: every tag is classified
//! as scalar (`{{name}}`) or block (`{{#name}}…{{/name}}`, possibly
//! nested), in document order. The prompt resolver uses the result to
//! derive the prompts a template tree implicitly requires, without any
//! predeclared schema.

use std::path::Path;

use regex::Regex;

use crate::error::{TemplateError, TemplateResult};
use crate::helpers::HelperRegistry;

/// A placeholder tag discovered in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Root name the tag binds to (first dotted segment).
    pub name: String,
    pub kind: TagKind,
}

/// Tag classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
    Scalar,
    /// Block section with its inner tags, in document order.
    Block(Vec<Tag>),
}

impl Tag {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TagKind::Scalar,
        }
    }

    pub fn block(name: impl Into<String>, inner: Vec<Tag>) -> Self {
        Self {
            name: name.into(),
            kind: TagKind::Block(inner),
        }
    }
}

/// Scan a template for placeholder tags.
///
/// Helper invocations (`{{helperName expr}}`) contribute the expression's
/// root segment, not the helper name. Only identifier-shaped expressions
/// (dotted paths) count as tags; other `{{…}}` noise is ignored. Duplicate
/// names within one level are reported once, first occurrence wins.
pub fn scan(template: &str, helpers: &HelperRegistry) -> TemplateResult<Vec<Tag>> {
    // match {{name}} / {{a.b.c}} expressions worth prompting for
    let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap();
    scan_inner(template, helpers, &ident)
}

fn scan_inner(template: &str, helpers: &HelperRegistry, ident: &Regex) -> TemplateResult<Vec<Tag>> {
    let mut tags = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = match after.find("}}") {
            Some(end) => end,
            None => {
                return Err(TemplateError::UnclosedTag(
                    rest[start..].chars().take(24).collect(),
                ))
            }
        };
        let tag = after[..end].trim();
        let tag_end = start + 2 + end + 2;

        if let Some(name) = tag.strip_prefix('#') {
            let name = name.trim().to_string();
            let (body, body_len) = section_body(&rest[tag_end..], &name)?;
            let inner = scan_inner(body, helpers, ident)?;
            push_unique(&mut tags, Tag::block(name, inner));
            rest = &rest[tag_end + body_len..];
            continue;
        }

        if let Some(name) = tag.strip_prefix('/') {
            return Err(TemplateError::UnbalancedSection(name.trim().to_string()));
        }

        if !tag.starts_with('!') {
            if let Some((head, expr)) = tag.split_once(char::is_whitespace) {
                let expr = expr.trim();
                if helpers.contains(head) && ident.is_match(expr) {
                    push_unique(&mut tags, Tag::scalar(root_segment(expr)));
                }
                // unknown two-token tags are renderer no-ops; nothing to ask
            } else if ident.is_match(tag) {
                push_unique(&mut tags, Tag::scalar(root_segment(tag)));
            }
        }

        rest = &rest[tag_end..];
    }

    Ok(tags)
}

fn section_body<'t>(rest: &'t str, name: &str) -> TemplateResult<(&'t str, usize)> {
    let mut depth = 1usize;
    let mut cursor = 0usize;

    while let Some(start) = rest[cursor..].find("{{") {
        let tag_start = cursor + start;
        let after = &rest[tag_start + 2..];
        let end = match after.find("}}") {
            Some(end) => end,
            None => {
                return Err(TemplateError::UnclosedTag(
                    rest[tag_start..].chars().take(24).collect(),
                ))
            }
        };
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

fn push_unique(tags: &mut Vec<Tag>, tag: Tag) {
    if !tags.iter().any(|t| t.name == tag.name) {
        tags.push(tag);
    }
}

fn root_segment(expr: &str) -> &str {
    expr.split('.').next().unwrap_or(expr)
}

/// Check whether a path likely holds renderable text.
pub fn is_text_file(path: &Path) -> bool {
    const TEXT_EXTENSIONS: &[&str] = &[
        "txt", "md", "yaml", "yml", "json", "toml", "xml", "html", "css", "scss", "js",
        "ts", "jsx", "tsx", "py", "rs", "java", "kt", "go", "rb", "php", "cs", "sh",
        "bash", "zsh", "fish", "ps1", "bat", "cmd", "sql", "graphql", "properties",
        "cfg", "conf", "ini", "env", "gitignore", "dockerignore", "editorconfig",
        "lock", "svg", "vue", "tf", "hcl",
    ];

    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        return TEXT_EXTENSIONS.contains(&ext.as_str());
    }

    if let Some(name) = path.file_name() {
        let name = name.to_string_lossy().to_lowercase();
        return TEXT_EXTENSIONS.iter().any(|e| name.ends_with(e))
            || ["dockerfile", "makefile", "rakefile", "gemfile", "procfile", "license"]
                .contains(&name.as_str());
    }

    false
}
