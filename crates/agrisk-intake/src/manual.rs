//! Manual entry: the whole catalogue on one page with auto-save

use crate::autosave::AutoSaver;
use crate::backend::{submission_chain, IntakeBackend, Route};
use crate::catalogue::Catalogue;
use crate::error::{IntakeError, Result};
use crate::gate::{mandatory_complete, missing_mandatory, non_blank};
use crate::state::{transition, InFlight, WizardState};
use agrisk_model::AssessmentId;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Single-page intake form
///
/// The gate is computed from local answers only, so a failed auto-save
/// never changes whether submission is enabled.
pub struct ManualEntry {
    assessment: AssessmentId,
    catalogue: Arc<Catalogue>,
    backend: Arc<dyn IntakeBackend>,
    answers: BTreeMap<String, String>,
    saver: AutoSaver,
    state: WizardState,
}

impl std::fmt::Debug for ManualEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualEntry")
            .field("assessment", &self.assessment)
            .field("state", &self.state)
            .field("answers", &self.answers.len())
            .finish_non_exhaustive()
    }
}

impl ManualEntry {
    /// Open the form; must be called inside a tokio runtime
    #[must_use]
    pub fn open(
        assessment: AssessmentId,
        catalogue: Arc<Catalogue>,
        backend: Arc<dyn IntakeBackend>,
        debounce: Duration,
    ) -> Self {
        let saver = AutoSaver::spawn(Arc::clone(&backend), assessment, debounce);
        Self {
            assessment,
            catalogue,
            backend,
            answers: BTreeMap::new(),
            saver,
            state: WizardState::Editing { step: 0 },
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    /// Record an edit and schedule an auto-save
    pub fn set_answer(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        if self.catalogue.field(field).is_none() {
            return Err(IntakeError::UnknownField(field.to_string()));
        }
        if let WizardState::Error { step, .. } = self.state {
            transition(&mut self.state, WizardState::Editing { step })?;
        }
        if !matches!(self.state, WizardState::Editing { .. }) {
            return Err(IntakeError::Busy);
        }
        let value = value.into();
        self.saver.record(field, value.clone());
        self.answers.insert(field.to_string(), value);
        Ok(())
    }

    /// Save buffered edits without waiting for the quiet period
    ///
    /// Used when the form is about to close. Failures are swallowed like
    /// any other auto-save.
    pub async fn save_now(&self) {
        self.saver.flush().await;
    }

    /// Whether the submit control should be enabled
    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.state.is_busy()
            && self.state != WizardState::Submitted
            && mandatory_complete(&self.catalogue, &self.answers)
    }

    /// Flush pending edits, then run the submission chain
    pub async fn submit(&mut self) -> Result<Route> {
        let missing = missing_mandatory(&self.catalogue, &self.answers);
        if !missing.is_empty() {
            return Err(IntakeError::MandatoryIncomplete {
                missing: missing.into_iter().map(str::to_string).collect(),
            });
        }
        let step = match &self.state {
            WizardState::Editing { step } | WizardState::Error { step, .. } => *step,
            WizardState::Saving { .. } | WizardState::Submitting { .. } => {
                return Err(IntakeError::Busy)
            }
            WizardState::Submitted => {
                return Err(IntakeError::IllegalTransition {
                    from: self.state.phase(),
                    to: crate::state::WizardPhase::Submitting,
                })
            }
        };

        self.saver.flush().await;
        let answers = non_blank(&self.answers);
        let flight = InFlight::begin(&mut self.state, WizardState::Submitting { step })?;
        match submission_chain(self.backend.as_ref(), self.assessment, answers).await {
            Ok(route) => {
                flight.settle(WizardState::Submitted)?;
                Ok(route)
            }
            Err(e) => {
                tracing::warn!(error = %e, "manual entry submission failed");
                flight.settle(WizardState::Error {
                    step,
                    message: e.to_string(),
                })?;
                Err(e)
            }
        }
    }
}
