//! Endpoint surface of the risk-assessment API
//!
//! [`RiskApi`] is the seam between the data layer and the network. Every
//! write validates its payload first, so a [`ApiError::Validation`] always
//! means nothing was sent.

use crate::error::{ApiError, Result};
use crate::http::ApiClient;
use agrisk_model::{
    Assessment, AssessmentId, AssessmentPatch, AssessmentStats, Comment, GapField, GapFieldBatch,
    GapStats, GroupMembership, IntakeAnswers, NewAssessment, NewComment, NewUser, PdfJob, Prompt,
    PromptComment, PromptId, PromptImport, PromptImportSummary, PromptInput, PromptRevision,
    RecommendationEdit, Report, RiskScore, RiskScoreId, UploadUrl, UploadUrlRequest, User, UserId,
    UserPatch, Validate,
};
use async_trait::async_trait;
use reqwest::Method;

/// Every endpoint consumed by the client
#[async_trait]
pub trait RiskApi: Send + Sync {
    // ---- assessments ----

    async fn list_assessments(&self) -> Result<Vec<Assessment>>;
    async fn assessment_stats(&self) -> Result<AssessmentStats>;
    async fn get_assessment(&self, id: AssessmentId) -> Result<Assessment>;
    async fn create_assessment(&self, new: &NewAssessment) -> Result<Assessment>;
    async fn update_assessment(&self, id: AssessmentId, patch: &AssessmentPatch)
        -> Result<Assessment>;
    async fn delete_assessment(&self, id: AssessmentId) -> Result<()>;
    /// Pre-signed URL for uploading a business-plan document
    async fn request_upload_url(
        &self,
        id: AssessmentId,
        request: &UploadUrlRequest,
    ) -> Result<UploadUrl>;
    /// Persist intake answers collected by a wizard
    async fn save_answers(&self, id: AssessmentId, answers: &IntakeAnswers) -> Result<()>;
    /// Start the gap-detection pipeline stage
    async fn start_gap_detection(&self, id: AssessmentId) -> Result<()>;

    // ---- gap fields ----

    async fn gap_fields(&self, id: AssessmentId) -> Result<Vec<GapField>>;
    async fn gap_stats(&self, id: AssessmentId) -> Result<GapStats>;
    /// Apply corrections; returns the updated fields
    async fn update_gap_fields(&self, id: AssessmentId, batch: &GapFieldBatch)
        -> Result<Vec<GapField>>;

    // ---- risk scores and report ----

    async fn risk_scores(&self, id: AssessmentId) -> Result<Vec<RiskScore>>;
    async fn edit_recommendation(
        &self,
        score: RiskScoreId,
        edit: &RecommendationEdit,
    ) -> Result<RiskScore>;
    async fn report(&self, id: AssessmentId) -> Result<Report>;
    /// Queue a PDF render of the report
    async fn generate_pdf(&self, id: AssessmentId) -> Result<PdfJob>;

    // ---- comments ----

    async fn comments(&self, id: AssessmentId) -> Result<Vec<Comment>>;
    async fn add_comment(&self, id: AssessmentId, comment: &NewComment) -> Result<Comment>;

    // ---- prompts ----

    async fn list_prompts(&self) -> Result<Vec<Prompt>>;
    async fn get_prompt(&self, id: PromptId) -> Result<Prompt>;
    async fn create_prompt(&self, input: &PromptInput) -> Result<Prompt>;
    async fn update_prompt(&self, id: PromptId, input: &PromptInput) -> Result<Prompt>;
    async fn delete_prompt(&self, id: PromptId) -> Result<()>;
    async fn import_prompts(&self, import: &PromptImport) -> Result<PromptImportSummary>;
    async fn prompt_comments(&self, id: PromptId) -> Result<Vec<PromptComment>>;
    async fn add_prompt_comment(&self, id: PromptId, comment: &NewComment)
        -> Result<PromptComment>;
    async fn prompt_history(&self, id: PromptId) -> Result<Vec<PromptRevision>>;

    // ---- users ----

    async fn list_users(&self) -> Result<Vec<User>>;
    async fn get_user(&self, id: UserId) -> Result<User>;
    async fn create_user(&self, new: &NewUser) -> Result<User>;
    async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User>;
    async fn delete_user(&self, id: UserId) -> Result<()>;
    async fn add_user_to_group(&self, id: UserId, membership: &GroupMembership) -> Result<User>;
    async fn remove_user_from_group(
        &self,
        id: UserId,
        membership: &GroupMembership,
    ) -> Result<User>;
}

fn assessment(id: AssessmentId) -> String {
    format!("/api/assessments/{id}")
}

fn prompt(id: PromptId) -> String {
    format!("/api/prompts/{id}")
}

fn user(id: UserId) -> String {
    format!("/api/users/{id}")
}

fn checked<T: Validate>(payload: &T) -> Result<&T> {
    payload.validate().map_err(ApiError::from)?;
    Ok(payload)
}

#[async_trait]
impl RiskApi for ApiClient {
    async fn list_assessments(&self) -> Result<Vec<Assessment>> {
        self.get("/api/assessments").await
    }

    async fn assessment_stats(&self) -> Result<AssessmentStats> {
        self.get("/api/assessments/stats").await
    }

    async fn get_assessment(&self, id: AssessmentId) -> Result<Assessment> {
        self.get(&assessment(id)).await
    }

    async fn create_assessment(&self, new: &NewAssessment) -> Result<Assessment> {
        self.send_json(Method::POST, "/api/assessments", checked(new)?)
            .await
    }

    async fn update_assessment(
        &self,
        id: AssessmentId,
        patch: &AssessmentPatch,
    ) -> Result<Assessment> {
        self.send_json(Method::PATCH, &assessment(id), checked(patch)?)
            .await
    }

    async fn delete_assessment(&self, id: AssessmentId) -> Result<()> {
        self.send_unit(Method::DELETE, &assessment(id), None::<&()>)
            .await
    }

    async fn request_upload_url(
        &self,
        id: AssessmentId,
        request: &UploadUrlRequest,
    ) -> Result<UploadUrl> {
        let path = format!("{}/upload-url", assessment(id));
        self.send_json(Method::POST, &path, checked(request)?).await
    }

    async fn save_answers(&self, id: AssessmentId, answers: &IntakeAnswers) -> Result<()> {
        let path = format!("{}/answers", assessment(id));
        self.send_unit(Method::PUT, &path, Some(answers)).await
    }

    async fn start_gap_detection(&self, id: AssessmentId) -> Result<()> {
        let path = format!("{}/gap-detection", assessment(id));
        self.send_unit(Method::POST, &path, None::<&()>).await
    }

    async fn gap_fields(&self, id: AssessmentId) -> Result<Vec<GapField>> {
        self.get(&format!("{}/gap-fields", assessment(id))).await
    }

    async fn gap_stats(&self, id: AssessmentId) -> Result<GapStats> {
        self.get(&format!("{}/gap-fields/stats", assessment(id)))
            .await
    }

    async fn update_gap_fields(
        &self,
        id: AssessmentId,
        batch: &GapFieldBatch,
    ) -> Result<Vec<GapField>> {
        let path = format!("{}/gap-fields", assessment(id));
        self.send_json(Method::PATCH, &path, checked(batch)?).await
    }

    async fn risk_scores(&self, id: AssessmentId) -> Result<Vec<RiskScore>> {
        self.get(&format!("{}/risk-scores", assessment(id))).await
    }

    async fn edit_recommendation(
        &self,
        score: RiskScoreId,
        edit: &RecommendationEdit,
    ) -> Result<RiskScore> {
        let path = format!("/api/risk-scores/{score}/recommendation");
        self.send_json(Method::PATCH, &path, checked(edit)?).await
    }

    async fn report(&self, id: AssessmentId) -> Result<Report> {
        self.get(&format!("{}/report", assessment(id))).await
    }

    async fn generate_pdf(&self, id: AssessmentId) -> Result<PdfJob> {
        let path = format!("{}/report/pdf", assessment(id));
        self.send_json(Method::POST, &path, &serde_json::json!({}))
            .await
    }

    async fn comments(&self, id: AssessmentId) -> Result<Vec<Comment>> {
        self.get(&format!("{}/comments", assessment(id))).await
    }

    async fn add_comment(&self, id: AssessmentId, comment: &NewComment) -> Result<Comment> {
        let path = format!("{}/comments", assessment(id));
        self.send_json(Method::POST, &path, checked(comment)?).await
    }

    async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        self.get("/api/prompts").await
    }

    async fn get_prompt(&self, id: PromptId) -> Result<Prompt> {
        self.get(&prompt(id)).await
    }

    async fn create_prompt(&self, input: &PromptInput) -> Result<Prompt> {
        self.send_json(Method::POST, "/api/prompts", checked(input)?)
            .await
    }

    async fn update_prompt(&self, id: PromptId, input: &PromptInput) -> Result<Prompt> {
        self.send_json(Method::PUT, &prompt(id), checked(input)?)
            .await
    }

    async fn delete_prompt(&self, id: PromptId) -> Result<()> {
        self.send_unit(Method::DELETE, &prompt(id), None::<&()>).await
    }

    async fn import_prompts(&self, import: &PromptImport) -> Result<PromptImportSummary> {
        self.send_json(Method::POST, "/api/prompts/import", checked(import)?)
            .await
    }

    async fn prompt_comments(&self, id: PromptId) -> Result<Vec<PromptComment>> {
        self.get(&format!("{}/comments", prompt(id))).await
    }

    async fn add_prompt_comment(
        &self,
        id: PromptId,
        comment: &NewComment,
    ) -> Result<PromptComment> {
        let path = format!("{}/comments", prompt(id));
        self.send_json(Method::POST, &path, checked(comment)?).await
    }

    async fn prompt_history(&self, id: PromptId) -> Result<Vec<PromptRevision>> {
        self.get(&format!("{}/history", prompt(id))).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.get("/api/users").await
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        self.get(&user(id)).await
    }

    async fn create_user(&self, new: &NewUser) -> Result<User> {
        self.send_json(Method::POST, "/api/users", checked(new)?).await
    }

    async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User> {
        self.send_json(Method::PATCH, &user(id), checked(patch)?).await
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.send_unit(Method::DELETE, &user(id), None::<&()>).await
    }

    async fn add_user_to_group(&self, id: UserId, membership: &GroupMembership) -> Result<User> {
        let path = format!("{}/groups", user(id));
        self.send_json(Method::POST, &path, checked(membership)?)
            .await
    }

    async fn remove_user_from_group(
        &self,
        id: UserId,
        membership: &GroupMembership,
    ) -> Result<User> {
        let path = format!("{}/groups", user(id));
        self.send_json(Method::DELETE, &path, checked(membership)?)
            .await
    }
}
