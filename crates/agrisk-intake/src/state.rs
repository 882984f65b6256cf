//! Wizard state machine
//!
//! ```text
//! Editing(i) ──advance──> Saving(i) ──ok──> Editing(i+1)
//!     │                       └──err──> Error(i)
//!     └──submit──> Submitting(i) ──ok──> Submitted
//!                       └──err──> Error(i)
//! Error(i) ──dismiss/edit──> Editing(i), or retry advance/submit
//! ```

use crate::error::{IntakeError, Result};

/// Discriminant of [`WizardState`], used by the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardPhase {
    /// Answers on a step can change
    Editing,
    /// A step's answers are being persisted
    Saving,
    /// The submission chain is running
    Submitting,
    /// Gap detection has started; terminal
    Submitted,
    /// The last save or submission failed
    Error,
}

/// Current wizard state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
    /// Accepting answers on a step
    Editing { step: usize },
    /// Persisting a step before moving on
    Saving { step: usize },
    /// Running the submission chain from the final step
    Submitting { step: usize },
    /// Submission chain finished
    Submitted,
    /// The last save or submission failed; the user stays on `step`
    Error { step: usize, message: String },
}

impl WizardState {
    #[must_use]
    pub fn phase(&self) -> WizardPhase {
        match self {
            Self::Editing { .. } => WizardPhase::Editing,
            Self::Saving { .. } => WizardPhase::Saving,
            Self::Submitting { .. } => WizardPhase::Submitting,
            Self::Submitted => WizardPhase::Submitted,
            Self::Error { .. } => WizardPhase::Error,
        }
    }

    /// Step the user is on; `None` once submitted
    #[must_use]
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Editing { step }
            | Self::Saving { step }
            | Self::Submitting { step }
            | Self::Error { step, .. } => Some(*step),
            Self::Submitted => None,
        }
    }

    /// A save or submission is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Saving { .. } | Self::Submitting { .. })
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: WizardPhase) -> Vec<WizardPhase> {
    use WizardPhase::*;
    match from {
        Editing => vec![Editing, Saving, Submitting],
        Saving => vec![Editing, Error],
        Submitting => vec![Submitted, Error],
        Error => vec![Editing, Saving, Submitting],
        Submitted => vec![],
    }
}

/// Check a phase change against the table
///
/// Leaving a busy phase for anything but its outcomes reports [`IntakeError::Busy`].
pub fn validate_transition(from: WizardPhase, to: WizardPhase) -> Result<()> {
    if allowed_transitions(from).contains(&to) {
        return Ok(());
    }
    if matches!(from, WizardPhase::Saving | WizardPhase::Submitting) {
        return Err(IntakeError::Busy);
    }
    Err(IntakeError::IllegalTransition { from, to })
}

/// Apply a transition after validating it
pub(crate) fn transition(state: &mut WizardState, to: WizardState) -> Result<()> {
    validate_transition(state.phase(), to.phase())?;
    tracing::debug!(from = ?state, to = ?to, "wizard transition");
    *state = to;
    Ok(())
}

/// Holds the wizard in a busy phase until settled
///
/// If the owning future is dropped first, the wizard lands in
/// [`WizardState::Error`] on the same step instead of staying busy.
pub(crate) struct InFlight<'a> {
    state: &'a mut WizardState,
    step: usize,
    settled: bool,
}

impl<'a> InFlight<'a> {
    pub(crate) fn begin(state: &'a mut WizardState, busy: WizardState) -> Result<Self> {
        let step = busy.step().unwrap_or_default();
        transition(state, busy)?;
        Ok(Self {
            state,
            step,
            settled: false,
        })
    }

    pub(crate) fn settle(mut self, outcome: WizardState) -> Result<()> {
        self.settled = true;
        transition(&mut *self.state, outcome)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(step = self.step, "wizard operation interrupted");
            *self.state = WizardState::Error {
                step: self.step,
                message: "interrupted before completion".to_string(),
            };
        }
    }
}
