//! Persistence seam for intake flows

use crate::error::Result;
use agrisk_model::{AssessmentId, IntakeAnswers};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Where intake answers go
#[async_trait]
pub trait IntakeBackend: Send + Sync {
    /// Persist answers; keys not included are left as they are
    async fn save_answers(&self, assessment: AssessmentId, answers: &IntakeAnswers) -> Result<()>;

    /// Kick off the gap-detection pipeline stage
    async fn start_gap_detection(&self, assessment: AssessmentId) -> Result<()>;
}

/// View to show after a flow completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Gap-detection results for the assessment
    GapResults(AssessmentId),
}

/// Persist remaining answers, start gap detection, and name the next view
pub(crate) async fn submission_chain(
    backend: &dyn IntakeBackend,
    assessment: AssessmentId,
    answers: BTreeMap<String, String>,
) -> Result<Route> {
    if !answers.is_empty() {
        backend
            .save_answers(assessment, &IntakeAnswers::new(answers))
            .await?;
    }
    backend.start_gap_detection(assessment).await?;
    tracing::info!(%assessment, "intake submitted, gap detection started");
    Ok(Route::GapResults(assessment))
}
