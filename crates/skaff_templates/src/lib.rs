//! # skaff_templates
//!
//! Template rendering, helpers and placeholder scanning for skaff.
//!
//! This crate is the pure-text half of the engine: it renders generator
//! templates against a JSON context, applies named helpers (case
//! conversion, pluralization, host-defined transforms), and statically
//! scans templates for the placeholder tags they require.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use skaff_templates::Renderer;
//!
//! let renderer = Renderer::new();
//! let out = renderer
//!     .render("{{snakeCase name}}_controller", &json!({ "name": "BlogPost" }))
//!     .unwrap();
//! assert_eq!(out, "blog_post_controller");
//! ```

pub mod error;
pub mod helpers;
pub mod renderer;
pub mod scanner;

pub use error::{TemplateError, TemplateResult};
pub use helpers::{Helper, HelperRegistry};
pub use renderer::Renderer;
pub use scanner::{is_text_file, scan, Tag, TagKind};
