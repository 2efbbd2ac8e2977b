//! Error types for template rendering.

use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur during template operations.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unclosed tag near '{0}'")]
    UnclosedTag(String),

    #[error("Unclosed section '{{{{#{0}}}}}'")]
    UnclosedSection(String),

    #[error("Unexpected section close '{{{{/{0}}}}}'")]
    UnbalancedSection(String),

    #[error("Template rendering failed: {0}")]
    RenderingFailed(String),
}
