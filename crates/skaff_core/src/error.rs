//! Error types for the engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while resolving prompts or executing actions.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Missing required field '{field}' for '{kind}' action")]
    MissingField { kind: String, field: String },

    #[error("Unsupported '{0}' action")]
    UnsupportedAction(String),

    #[error("Unsupported '{0}' prompt")]
    UnsupportedPrompt(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Source '{0}' does not exist")]
    SourceMissing(PathBuf),

    #[error("Destination '{0}' does not exist")]
    DestinationMissing(PathBuf),

    #[error("Template '{0}' does not exist")]
    TemplateMissing(PathBuf),

    #[error("Aborted at '{0}'")]
    ConflictAbort(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid repository '{0}', expected 'org/repo'")]
    InvalidRepository(String),

    #[error("Command '{command}' failed: {message}")]
    Process { command: String, message: String },

    #[error("Failed to fetch '{repository}': {message}")]
    Fetch { repository: String, message: String },

    #[error("Prompt session error: {0}")]
    Session(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Template error: {0}")]
    Template(#[from] skaff_templates::TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Conflict aborts are run-fatal regardless of any `abort_on_fail`
    /// setting.
    pub fn is_always_fatal(&self) -> bool {
        matches!(self, Self::ConflictAbort(_))
    }
}
