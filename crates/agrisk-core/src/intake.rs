//! Intake flows bound to the API and the cache

use crate::data::DataLayer;
use crate::keys::QueryKey;
use agrisk_client::ApiError;
use agrisk_intake::{Catalogue, IntakeBackend, IntakeError, ManualEntry, Wizard};
use agrisk_model::{AssessmentId, IntakeAnswers};
use async_trait::async_trait;
use std::sync::Arc;

/// [`IntakeBackend`] that writes through the data layer
///
/// Saved answers and a started pipeline both change the assessment record,
/// so each successful call invalidates it.
#[derive(Debug, Clone)]
pub struct ApiIntakeBackend {
    data: DataLayer,
}

impl ApiIntakeBackend {
    #[must_use]
    pub fn new(data: DataLayer) -> Self {
        Self { data }
    }
}

fn backend_error(err: ApiError) -> IntakeError {
    IntakeError::Backend(err.to_string())
}

#[async_trait]
impl IntakeBackend for ApiIntakeBackend {
    async fn save_answers(
        &self,
        assessment: AssessmentId,
        answers: &IntakeAnswers,
    ) -> agrisk_intake::Result<()> {
        self.data
            .api()
            .save_answers(assessment, answers)
            .await
            .map_err(backend_error)?;
        self.data.invalidate(&[QueryKey::Assessment(assessment)]).await;
        Ok(())
    }

    async fn start_gap_detection(&self, assessment: AssessmentId) -> agrisk_intake::Result<()> {
        self.data
            .api()
            .start_gap_detection(assessment)
            .await
            .map_err(backend_error)?;
        self.data
            .invalidate(&[
                QueryKey::Assessment(assessment),
                QueryKey::GapFields(assessment),
            ])
            .await;
        Ok(())
    }
}

impl DataLayer {
    /// Backend for intake flows over this data layer
    #[must_use]
    pub fn intake_backend(&self) -> Arc<dyn IntakeBackend> {
        Arc::new(ApiIntakeBackend::new(self.clone()))
    }

    /// Guided interview over the standard catalogue
    #[must_use]
    pub fn guided_interview(&self, assessment: AssessmentId) -> Wizard {
        Wizard::new(
            assessment,
            Arc::new(Catalogue::standard()),
            self.intake_backend(),
        )
    }

    /// Manual-entry form with auto-save; needs a running tokio runtime
    ///
    /// Edits are saved after [`DataLayer::autosave_debounce`] of inactivity.
    #[must_use]
    pub fn manual_entry(&self, assessment: AssessmentId) -> ManualEntry {
        ManualEntry::open(
            assessment,
            Arc::new(Catalogue::standard()),
            self.intake_backend(),
            self.autosave_debounce(),
        )
    }
}
