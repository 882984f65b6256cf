//! Error types for intake flows

use crate::state::WizardPhase;
use thiserror::Error;

/// Errors raised by the intake wizard and manual-entry form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    /// The requested state change is not in the transition table
    #[error("illegal wizard transition {from:?} -> {to:?}")]
    IllegalTransition { from: WizardPhase, to: WizardPhase },

    /// A save or submission has not settled yet
    #[error("a save is already in flight")]
    Busy,

    /// Submission attempted before reaching the last step
    #[error("submission is only possible from the final step")]
    NotOnFinalStep,

    /// Advance attempted from the last step
    #[error("already on the final step")]
    NoNextStep,

    /// Submission attempted with blank mandatory fields
    #[error("mandatory fields incomplete: {}", .missing.join(", "))]
    MandatoryIncomplete { missing: Vec<String> },

    /// Answer given for a field the catalogue does not declare
    #[error("unknown intake field {0}")]
    UnknownField(String),

    /// Saving answers or starting the next pipeline stage failed
    #[error("{0}")]
    Backend(String),
}

/// Result type alias for intake operations
pub type Result<T> = std::result::Result<T, IntakeError>;
