//! Status reporting.
//!
//! The reporter wraps each timed operation in a `begin → ok/fail` pair.
//! It is a collaborator of the executor, not part of the engine contract;
//! quiet runs swap in the null reporter.

use std::time::Instant;

use tracing::{error, info};

use crate::error::EngineError;

/// Status reporter for timed operations.
#[derive(Debug, Clone, Copy, Default)]
pub enum Reporter {
    #[default]
    Tracing,
    Null,
}

impl Reporter {
    /// Begin one timed operation.
    pub fn begin(&self, kind: &str, label: &str) -> Status {
        Status {
            reporter: *self,
            kind: kind.to_string(),
            label: label.to_string(),
            started: Instant::now(),
        }
    }
}

/// Handle for one in-flight operation; consumed by `ok` or `fail`.
pub struct Status {
    reporter: Reporter,
    kind: String,
    label: String,
    started: Instant,
}

impl Status {
    pub fn ok(self) {
        if let Reporter::Tracing = self.reporter {
            info!(
                "{} {} (+{:.1?})",
                self.kind,
                self.label,
                self.started.elapsed()
            );
        }
    }

    pub fn fail(self, error: &EngineError) {
        if let Reporter::Tracing = self.reporter {
            error!(
                "{} {} failed: {} (+{:.1?})",
                self.kind,
                self.label,
                error,
                self.started.elapsed()
            );
        }
    }
}
