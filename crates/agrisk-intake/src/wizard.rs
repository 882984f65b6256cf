//! Guided interview: one category per step, saved explicitly on advance

use crate::backend::{submission_chain, IntakeBackend, Route};
use crate::catalogue::{Catalogue, Category};
use crate::error::{IntakeError, Result};
use crate::gate::{mandatory_complete, missing_mandatory, non_blank};
use crate::state::{transition, InFlight, WizardState};
use agrisk_model::{AssessmentId, IntakeAnswers};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Step-wise intake wizard
///
/// Operations that touch the network take `&mut self`, so a second advance or
/// submission cannot start while one is awaiting.
pub struct Wizard {
    assessment: AssessmentId,
    catalogue: Arc<Catalogue>,
    backend: Arc<dyn IntakeBackend>,
    answers: BTreeMap<String, String>,
    state: WizardState,
}

impl std::fmt::Debug for Wizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wizard")
            .field("assessment", &self.assessment)
            .field("state", &self.state)
            .field("answers", &self.answers.len())
            .finish_non_exhaustive()
    }
}

impl Wizard {
    /// Start on the first step
    #[must_use]
    pub fn new(
        assessment: AssessmentId,
        catalogue: Arc<Catalogue>,
        backend: Arc<dyn IntakeBackend>,
    ) -> Self {
        Self {
            assessment,
            catalogue,
            backend,
            answers: BTreeMap::new(),
            state: WizardState::Editing { step: 0 },
        }
    }

    /// Resume with answers saved earlier; unknown keys are dropped
    #[must_use]
    pub fn with_answers(mut self, answers: BTreeMap<String, String>) -> Self {
        let catalogue = Arc::clone(&self.catalogue);
        self.answers = answers
            .into_iter()
            .filter(|(k, _)| catalogue.field(k).is_some())
            .collect();
        self
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    #[must_use]
    pub fn assessment(&self) -> AssessmentId {
        self.assessment
    }

    /// Current step; the last step once submitted
    #[must_use]
    pub fn step(&self) -> usize {
        self.state
            .step()
            .unwrap_or_else(|| self.catalogue.step_count().saturating_sub(1))
    }

    #[must_use]
    pub fn current_category(&self) -> Option<&Category> {
        self.catalogue.category(self.step())
    }

    #[must_use]
    pub fn is_final_step(&self) -> bool {
        self.step() + 1 >= self.catalogue.step_count()
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, field: &str) -> Option<&str> {
        self.answers.get(field).map(String::as_str)
    }

    /// Record an answer
    ///
    /// Editing after a failure returns the wizard to the editing phase.
    pub fn set_answer(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        if self.catalogue.field(field).is_none() {
            return Err(IntakeError::UnknownField(field.to_string()));
        }
        match &self.state {
            WizardState::Editing { .. } => {}
            WizardState::Error { step, .. } => {
                let step = *step;
                transition(&mut self.state, WizardState::Editing { step })?;
            }
            WizardState::Saving { .. } | WizardState::Submitting { .. } => {
                return Err(IntakeError::Busy)
            }
            WizardState::Submitted => {
                return Err(IntakeError::IllegalTransition {
                    from: self.state.phase(),
                    to: crate::state::WizardPhase::Editing,
                })
            }
        }
        self.answers.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Mandatory fields across every step are answered
    #[must_use]
    pub fn mandatory_complete(&self) -> bool {
        mandatory_complete(&self.catalogue, &self.answers)
    }

    /// Whether the submit control should be enabled
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.is_final_step() && !self.state.is_busy() && self.state != WizardState::Submitted
            && self.mandatory_complete()
    }

    /// Persist this step's answers, then move to the next step
    ///
    /// On failure the wizard stays on the current step in the error phase.
    pub async fn advance(&mut self) -> Result<()> {
        let step = self.current_step_for_action()?;
        if self.is_final_step() {
            return Err(IntakeError::NoNextStep);
        }

        let answers = self.step_answers(step);
        let flight = InFlight::begin(&mut self.state, WizardState::Saving { step })?;
        let saved = if answers.is_empty() {
            Ok(())
        } else {
            self.backend
                .save_answers(self.assessment, &IntakeAnswers::new(answers))
                .await
        };

        match saved {
            Ok(()) => flight.settle(WizardState::Editing { step: step + 1 }),
            Err(e) => {
                tracing::warn!(step, error = %e, "step save failed");
                flight.settle(WizardState::Error {
                    step,
                    message: e.to_string(),
                })?;
                Err(e)
            }
        }
    }

    /// Go back one step without saving
    pub fn back(&mut self) -> Result<()> {
        let step = self.current_step_for_action()?;
        transition(
            &mut self.state,
            WizardState::Editing {
                step: step.saturating_sub(1),
            },
        )
    }

    /// Persist the remaining answers, start gap detection and return the
    /// results route
    ///
    /// No route is returned unless the whole chain succeeds.
    pub async fn submit(&mut self) -> Result<Route> {
        let step = self.current_step_for_action()?;
        if !self.is_final_step() {
            return Err(IntakeError::NotOnFinalStep);
        }
        let missing = missing_mandatory(&self.catalogue, &self.answers);
        if !missing.is_empty() {
            return Err(IntakeError::MandatoryIncomplete {
                missing: missing.into_iter().map(str::to_string).collect(),
            });
        }

        let answers = non_blank(&self.answers);
        let flight = InFlight::begin(&mut self.state, WizardState::Submitting { step })?;
        match submission_chain(self.backend.as_ref(), self.assessment, answers).await {
            Ok(route) => {
                flight.settle(WizardState::Submitted)?;
                Ok(route)
            }
            Err(e) => {
                tracing::warn!(step, error = %e, "submission failed");
                flight.settle(WizardState::Error {
                    step,
                    message: e.to_string(),
                })?;
                Err(e)
            }
        }
    }

    /// Clear a displayed error
    pub fn dismiss_error(&mut self) -> Result<()> {
        if let WizardState::Error { step, .. } = self.state {
            transition(&mut self.state, WizardState::Editing { step })?;
        }
        Ok(())
    }

    fn current_step_for_action(&self) -> Result<usize> {
        match &self.state {
            WizardState::Editing { step } | WizardState::Error { step, .. } => Ok(*step),
            WizardState::Saving { .. } | WizardState::Submitting { .. } => Err(IntakeError::Busy),
            WizardState::Submitted => Err(IntakeError::IllegalTransition {
                from: self.state.phase(),
                to: crate::state::WizardPhase::Editing,
            }),
        }
    }

    fn step_answers(&self, step: usize) -> BTreeMap<String, String> {
        let Some(category) = self.catalogue.category(step) else {
            return BTreeMap::new();
        };
        category
            .fields
            .iter()
            .filter_map(|f| {
                self.answers
                    .get(&f.id)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (f.id.clone(), v.clone()))
            })
            .collect()
    }
}
