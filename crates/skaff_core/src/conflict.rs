//! Conflict resolution for actions whose destination already exists.
//!
//! Decisions are explicit enum returns, never exceptions; the executor
//! maps [`ConflictChoice::Abort`] to the run-fatal
//! [`EngineError::ConflictAbort`](crate::error::EngineError::ConflictAbort).

use crate::error::EngineResult;
use crate::session::{PromptAnswer, PromptRequest, PromptSession};

/// Operator decision for one conflicting destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Overwrite the destination (also the silent no-conflict outcome).
    Replace,
    Skip,
    /// Overwrite this and every remaining file of the same action.
    ReplaceAll,
    /// Skip this and every remaining file of the same action.
    SkipAll,
    /// Confirm deletion (`clean` only).
    Delete,
    /// Halt the run, regardless of `abort_on_fail`.
    Abort,
}

impl ConflictChoice {
    /// Whether the choice lets the mutation proceed.
    pub fn proceeds(&self) -> bool {
        matches!(self, Self::Replace | Self::ReplaceAll | Self::Delete)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Replace => "Replace",
            Self::Skip => "Do not replace",
            Self::ReplaceAll => "Replace this and all others",
            Self::SkipAll => "Skip this and all others",
            Self::Delete => "Delete",
            Self::Abort => "Abort",
        }
    }
}

/// Which choice vocabulary a conflict offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceSet {
    /// `replace | skip | abort` for single-destination actions.
    Single,
    /// `replace | skip | replaceAll | skipAll | abort` for batched `copy`.
    Multiple,
    /// `delete | skip | abort` for `clean`.
    Delete,
}

impl ChoiceSet {
    fn choices(&self) -> &'static [ConflictChoice] {
        match self {
            Self::Single => &[
                ConflictChoice::Replace,
                ConflictChoice::Skip,
                ConflictChoice::Abort,
            ],
            Self::Multiple => &[
                ConflictChoice::Replace,
                ConflictChoice::Skip,
                ConflictChoice::ReplaceAll,
                ConflictChoice::SkipAll,
                ConflictChoice::Abort,
            ],
            Self::Delete => &[
                ConflictChoice::Delete,
                ConflictChoice::Skip,
                ConflictChoice::Abort,
            ],
        }
    }

    fn message(&self, label: &str) -> String {
        match self {
            Self::Delete => format!("Delete '{label}'?"),
            _ => format!("File '{label}' already exists"),
        }
    }
}

/// Decision procedure invoked when an action's destination pre-exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictPolicy {
    /// Overwrite without prompting.
    pub force: bool,
    /// Skip conflicting destinations without prompting.
    pub skip_if_exists: bool,
}

impl ConflictPolicy {
    pub fn new(force: bool, skip_if_exists: bool) -> Self {
        Self {
            force,
            skip_if_exists,
        }
    }

    /// Decide what to do with a (possibly) conflicting destination.
    ///
    /// No conflict proceeds silently; `skip_if_exists` auto-skips; `force`
    /// auto-replaces; otherwise the operator is prompted with the choice
    /// set's vocabulary.
    pub fn decide(
        &self,
        exists: bool,
        label: &str,
        set: ChoiceSet,
        session: &mut dyn PromptSession,
    ) -> EngineResult<ConflictChoice> {
        if !exists {
            return Ok(match set {
                ChoiceSet::Delete => ConflictChoice::Delete,
                _ => ConflictChoice::Replace,
            });
        }
        if self.skip_if_exists {
            return Ok(ConflictChoice::Skip);
        }
        if self.force {
            return Ok(match set {
                ChoiceSet::Delete => ConflictChoice::Delete,
                _ => ConflictChoice::Replace,
            });
        }

        let choices = set.choices();
        let request = PromptRequest::Select {
            name: label.to_string(),
            message: set.message(label),
            options: choices.iter().map(|c| c.label().to_string()).collect(),
        };

        match session.ask(&request)? {
            PromptAnswer::Index(i) if i < choices.len() => Ok(choices[i]),
            // anything else falls back to the safe choice
            _ => Ok(ConflictChoice::Skip),
        }
    }
}
