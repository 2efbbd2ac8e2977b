//! Helper registry and built-in text transforms.
//!
//! Helpers are named transforms usable inside templates as two-token
//! placeholders: `{{snakeCase name}}`, `{{pluralize model}}`. A helper is
//! declared in one of two kinds:
//!
//! - [`Helper::Rendered`] receives the already-rendered value of the inner
//!   expression. All case-conversion and inflection built-ins are of this
//!   kind.
//! - [`Helper::Raw`] receives the unevaluated inner expression plus a
//!   render callback, so the helper decides whether (and how) to render its
//!   argument. Host-registered lookup helpers typically want this.
//!
//! Keeping the two kinds distinct avoids accidental double rendering.

use std::collections::HashMap;
use std::sync::Arc;

/// Callback handed to raw helpers for rendering sub-expressions.
pub type RenderFn = dyn Fn(&str) -> String;

/// A registered template helper.
#[derive(Clone)]
pub enum Helper {
    /// Receives the rendered value of `{{expr}}`.
    Rendered(Arc<dyn Fn(&str) -> String + Send + Sync>),
    /// Receives the raw expression and a render callback.
    Raw(Arc<dyn Fn(&str, &dyn Fn(&str) -> String) -> String + Send + Sync>),
}

/// Named collection of helpers, seeded with the built-ins.
#[derive(Clone)]
pub struct HelperRegistry {
    helpers: HashMap<String, Helper>,
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HelperRegistry {
    /// Create a registry containing all built-in helpers.
    pub fn new() -> Self {
        let mut registry = Self {
            helpers: HashMap::new(),
        };

        registry.register_rendered("camelCase", to_camel_case);
        registry.register_rendered("pascalCase", to_pascal_case);
        registry.register_rendered("snakeCase", to_snake_case);
        registry.register_rendered("paramCase", to_param_case);
        registry.register_rendered("constantCase", to_constant_case);
        registry.register_rendered("titleCase", to_title_case);
        registry.register_rendered("sentenceCase", to_sentence_case);
        registry.register_rendered("headerCase", to_header_case);
        registry.register_rendered("dotCase", to_dot_case);
        registry.register_rendered("pathCase", to_path_case);
        registry.register_rendered("upperCase", |s| s.to_uppercase());
        registry.register_rendered("lowerCase", |s| s.to_lowercase());
        registry.register_rendered("swapCase", swap_case);
        registry.register_rendered("ucFirst", uc_first);
        registry.register_rendered("lcFirst", lc_first);
        registry.register_rendered("pluralize", pluralize);
        registry.register_rendered("singularize", singularize);

        registry
    }

    /// Register a helper that receives the rendered value of its argument.
    pub fn register_rendered<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Helper::Rendered(Arc::new(f)));
    }

    /// Register a helper that receives the raw expression and a render callback.
    pub fn register_raw<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&str, &dyn Fn(&str) -> String) -> String + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Helper::Raw(Arc::new(f)));
    }

    /// Get a helper by name.
    pub fn get(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    /// Check whether a helper is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// All registered helper names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.helpers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helpers", &self.names())
            .finish()
    }
}

/// Split input into lowercase words on separators and camel humps.
fn words(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                out.push(current.clone());
                current.clear();
            }
            prev_lower = c.is_lowercase() || c.is_numeric();
            current.extend(c.to_lowercase());
        } else {
            if !current.is_empty() {
                out.push(current.clone());
                current.clear();
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

fn to_snake_case(s: &str) -> String {
    words(s).join("_")
}

fn to_param_case(s: &str) -> String {
    words(s).join("-")
}

fn to_dot_case(s: &str) -> String {
    words(s).join(".")
}

fn to_path_case(s: &str) -> String {
    words(s).join("/")
}

fn to_constant_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}

fn to_pascal_case(s: &str) -> String {
    words(s).iter().map(|w| capitalize(w)).collect()
}

fn to_camel_case(s: &str) -> String {
    let mut parts = words(s).into_iter();
    match parts.next() {
        None => String::new(),
        Some(first) => first + &parts.map(|w| capitalize(&w)).collect::<String>(),
    }
}

fn to_title_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_sentence_case(s: &str) -> String {
    let joined = words(s).join(" ");
    capitalize(&joined)
}

fn to_header_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join("-")
}

fn swap_case(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_uppercase() {
                c.to_lowercase().collect::<String>()
            } else {
                c.to_uppercase().collect::<String>()
            }
        })
        .collect()
}

fn uc_first(s: &str) -> String {
    capitalize(s)
}

fn lc_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
    }
}

/// Irregular noun forms the suffix rules get wrong.
const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
];

fn pluralize(s: &str) -> String {
    let lower = s.to_lowercase();
    for (singular, plural) in IRREGULAR {
        if lower == *singular {
            return (*plural).to_string();
        }
        if lower == *plural {
            return (*plural).to_string();
        }
    }

    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with('z')
        || lower.ends_with("ch") || lower.ends_with("sh")
    {
        if lower.ends_with("es") {
            return s.to_string();
        }
        return format!("{s}es");
    }

    if let Some(stem) = s.strip_suffix('y') {
        let before = stem.chars().last().unwrap_or('a');
        if !matches!(before, 'a' | 'e' | 'i' | 'o' | 'u') {
            return format!("{stem}ies");
        }
    }

    format!("{s}s")
}

fn singularize(s: &str) -> String {
    let lower = s.to_lowercase();
    for (singular, plural) in IRREGULAR {
        if lower == *plural {
            return (*singular).to_string();
        }
        if lower == *singular {
            return (*singular).to_string();
        }
    }

    if let Some(stem) = s.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = s.strip_suffix("es") {
        if stem.ends_with('s') || stem.ends_with('x') || stem.ends_with('z')
            || stem.ends_with("ch") || stem.ends_with("sh")
        {
            return stem.to_string();
        }
    }
    if lower.ends_with("ss") {
        return s.to_string();
    }
    s.strip_suffix('s').map(str::to_string).unwrap_or_else(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversions() {
        assert_eq!(to_snake_case("Hello World"), "hello_world");
        assert_eq!(to_snake_case("myValue"), "my_value");
        assert_eq!(to_param_case("MyValue"), "my-value");
        assert_eq!(to_pascal_case("my-value"), "MyValue");
        assert_eq!(to_camel_case("my_value"), "myValue");
        assert_eq!(to_constant_case("my value"), "MY_VALUE");
        assert_eq!(to_title_case("my value"), "My Value");
        assert_eq!(to_sentence_case("my great value"), "My great value");
        assert_eq!(to_header_case("my value"), "My-Value");
        assert_eq!(to_dot_case("MyValue"), "my.value");
        assert_eq!(to_path_case("MyValue"), "my/value");
    }

    #[test]
    fn test_char_helpers() {
        assert_eq!(swap_case("aBc"), "AbC");
        assert_eq!(uc_first("value"), "Value");
        assert_eq!(lc_first("Value"), "value");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("post"), "posts");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("city"), "cities");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("child"), "children");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("posts"), "post");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("cities"), "city");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("class"), "class");
    }

    #[test]
    fn test_registry_defaults() {
        let registry = HelperRegistry::new();
        assert!(registry.contains("snakeCase"));
        assert!(registry.contains("pluralize"));
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_register_custom() {
        let mut registry = HelperRegistry::new();
        registry.register_raw("echo", |expr, _render| expr.to_string());
        assert!(registry.contains("echo"));
        assert!(registry.names().contains(&"echo"));
    }
}
