//! Testing utilities for the agrisk workspace
//!
//! [`FakeApi`] is an in-memory [`RiskApi`] with call recording, injected
//! failures and per-operation holds, so tests can look at the cache while
//! a call is still in flight. The `fixture_*` functions build records with
//! plausible defaults.

#![allow(missing_docs)]

use agrisk_client::{ApiError, Result, RiskApi};
use agrisk_model::{
    Assessment, AssessmentId, AssessmentPatch, AssessmentStats, AssessmentStatus, Comment,
    CommentId, CurrentUser, DocumentId, GapField, GapFieldBatch, GapFieldId, GapStats, GapStatus,
    GroupMembership, IntakeAnswers, IntakeMethod, NewAssessment, NewComment, NewUser, PdfJob,
    PdfJobStatus, Prompt, PromptComment, PromptId, PromptImport, PromptImportSummary,
    PromptInput, PromptRevision, PromptStage, RecommendationEdit, Report, ReportSection,
    RiskCategory, RiskLevel, RiskScore, RiskScoreId, UploadUrl, UploadUrlRequest, User, UserId,
    UserPatch, Validate,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// Fixed timestamp used by fixtures
#[must_use]
pub fn fixture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

#[must_use]
pub fn fixture_assessment(id: u64, business_name: &str) -> Assessment {
    Assessment {
        id: AssessmentId(id),
        business_name: business_name.to_string(),
        status: AssessmentStatus::Draft,
        intake_method: IntakeMethod::GuidedInterview,
        region: Some("Canterbury".to_string()),
        acreage: Some(420.0),
        annual_revenue: None,
        created_at: fixture_time(),
        updated_at: fixture_time(),
    }
}

#[must_use]
pub fn fixture_gap_field(id: u64, assessment: u64, key: &str, status: GapStatus) -> GapField {
    GapField {
        id: GapFieldId(id),
        assessment_id: AssessmentId(assessment),
        field_key: key.to_string(),
        label: key.replace('_', " "),
        category: "Financials".to_string(),
        extracted_value: None,
        corrected_value: None,
        confidence: None,
        status,
    }
}

#[must_use]
pub fn fixture_risk_score(id: u64, assessment: u64, category: RiskCategory, score: u8) -> RiskScore {
    RiskScore {
        id: RiskScoreId(id),
        assessment_id: AssessmentId(assessment),
        category,
        score,
        rationale: Some(format!("{} exposure", category.label())),
        recommendation: None,
    }
}

#[must_use]
pub fn fixture_comment(id: u64, author: &CurrentUser, body: &str) -> Comment {
    Comment {
        id: CommentId::Server(id),
        author_id: author.id,
        author_name: author.display_name.clone(),
        body: body.to_string(),
        created_at: fixture_time(),
    }
}

#[must_use]
pub fn fixture_user(id: u64, email: &str) -> User {
    User {
        id: UserId(id),
        email: email.to_string(),
        display_name: email.split('@').next().unwrap_or(email).to_string(),
        groups: vec!["analysts".to_string()],
        enabled: true,
        created_at: fixture_time(),
    }
}

#[must_use]
pub fn fixture_prompt(id: u64, name: &str, stage: PromptStage) -> Prompt {
    Prompt {
        id: PromptId(id),
        name: name.to_string(),
        stage,
        template: format!("You are reviewing {{{{business}}}} for {name}."),
        version: 1,
        active: true,
        updated_at: fixture_time(),
    }
}

/// Signed-in identity used by fixtures and by [`FakeApi`] for new comments
#[must_use]
pub fn fixture_reviewer() -> CurrentUser {
    CurrentUser::new(UserId(1), "Dana Field")
}

#[derive(Default)]
struct Records {
    assessments: BTreeMap<AssessmentId, Assessment>,
    answers: BTreeMap<AssessmentId, BTreeMap<String, String>>,
    detections: Vec<AssessmentId>,
    gap_fields: BTreeMap<AssessmentId, Vec<GapField>>,
    risk_scores: BTreeMap<AssessmentId, Vec<RiskScore>>,
    comments: BTreeMap<AssessmentId, Vec<Comment>>,
    pdf_urls: BTreeMap<AssessmentId, String>,
    prompts: BTreeMap<PromptId, Prompt>,
    prompt_comments: BTreeMap<PromptId, Vec<PromptComment>>,
    history: BTreeMap<PromptId, Vec<PromptRevision>>,
    users: BTreeMap<UserId, User>,
    next_id: u64,
}

impl Records {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn not_found(what: impl std::fmt::Display) -> ApiError {
    ApiError::Http {
        status: 404,
        body: format!("{what} not found"),
    }
}

/// In-memory API double
///
/// Every call is recorded under its operation name (the [`RiskApi`] method
/// name) before anything else happens. A held operation then waits for
/// [`FakeApi::release`]; after that, a queued failure for the operation is
/// returned instead of touching the records.
pub struct FakeApi {
    records: Mutex<Records>,
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ApiError>>>,
    holds: Mutex<HashMap<&'static str, Arc<Notify>>>,
    author: CurrentUser,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FakeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeApi")
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

impl FakeApi {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Records {
                next_id: 1000,
                ..Records::default()
            }),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            author: fixture_reviewer(),
        }
    }

    // ---- seeding ----

    #[must_use]
    pub fn with_assessment(self, assessment: Assessment) -> Self {
        self.records
            .lock()
            .assessments
            .insert(assessment.id, assessment);
        self
    }

    #[must_use]
    pub fn with_gap_fields(self, assessment: AssessmentId, fields: Vec<GapField>) -> Self {
        self.records.lock().gap_fields.insert(assessment, fields);
        self
    }

    #[must_use]
    pub fn with_risk_scores(self, assessment: AssessmentId, scores: Vec<RiskScore>) -> Self {
        self.records.lock().risk_scores.insert(assessment, scores);
        self
    }

    #[must_use]
    pub fn with_comments(self, assessment: AssessmentId, comments: Vec<Comment>) -> Self {
        self.records.lock().comments.insert(assessment, comments);
        self
    }

    #[must_use]
    pub fn with_prompt(self, prompt: Prompt) -> Self {
        self.records.lock().prompts.insert(prompt.id, prompt);
        self
    }

    #[must_use]
    pub fn with_user(self, user: User) -> Self {
        self.records.lock().users.insert(user.id, user);
        self
    }

    // ---- fault injection ----

    /// Fail the next call of `op` with `error`
    pub fn fail_next(&self, op: &'static str, error: ApiError) {
        self.failures.lock().entry(op).or_default().push_back(error);
    }

    /// Make calls of `op` wait until [`FakeApi::release`]
    pub fn hold(&self, op: &'static str) {
        self.holds.lock().insert(op, Arc::new(Notify::new()));
    }

    /// Let one held call of `op` proceed and stop holding later ones
    pub fn release(&self, op: &'static str) {
        if let Some(gate) = self.holds.lock().remove(op) {
            gate.notify_one();
        }
    }

    // ---- inspection ----

    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == op).count()
    }

    /// Yield until `op` has been called at least `times` times
    pub async fn wait_for_calls(&self, op: &str, times: usize) {
        while self.call_count(op) < times {
            tokio::task::yield_now().await;
        }
    }

    #[must_use]
    pub fn saved_answers(&self, assessment: AssessmentId) -> BTreeMap<String, String> {
        self.records
            .lock()
            .answers
            .get(&assessment)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn detections(&self) -> Vec<AssessmentId> {
        self.records.lock().detections.clone()
    }

    async fn enter(&self, op: &'static str) -> Result<()> {
        self.calls.lock().push(op);
        tracing::trace!(op, "fake api call");
        let gate = self.holds.lock().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.failures.lock().get_mut(op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn enter_with<T: Validate>(&self, op: &'static str, payload: &T) -> Result<()> {
        payload.validate()?;
        self.enter(op).await
    }

    fn report_for(records: &Records, id: AssessmentId) -> Result<Report> {
        let scores = records.risk_scores.get(&id).ok_or_else(|| not_found("report"))?;
        let total: u32 = scores.iter().map(|s| u32::from(s.score)).sum();
        let count = u32::try_from(scores.len()).unwrap_or(u32::MAX).max(1);
        Ok(Report {
            assessment_id: id,
            overall_score: u8::try_from(total / count).unwrap_or(u8::MAX),
            sections: scores
                .iter()
                .map(|s| ReportSection {
                    category: s.category,
                    score: s.score,
                    level: RiskLevel::from_score(s.score),
                    summary: s.rationale.clone().unwrap_or_default(),
                    recommendation: s.recommendation.clone(),
                })
                .collect(),
            generated_at: fixture_time(),
            pdf_url: records.pdf_urls.get(&id).cloned(),
        })
    }
}

#[async_trait]
impl RiskApi for FakeApi {
    async fn list_assessments(&self) -> Result<Vec<Assessment>> {
        self.enter("list_assessments").await?;
        Ok(self.records.lock().assessments.values().cloned().collect())
    }

    async fn assessment_stats(&self) -> Result<AssessmentStats> {
        self.enter("assessment_stats").await?;
        let records = self.records.lock();
        let mut stats = AssessmentStats {
            total: records.assessments.len() as u64,
            ..AssessmentStats::default()
        };
        for a in records.assessments.values() {
            *stats.by_status.entry(a.status).or_default() += 1;
        }
        Ok(stats)
    }

    async fn get_assessment(&self, id: AssessmentId) -> Result<Assessment> {
        self.enter("get_assessment").await?;
        self.records
            .lock()
            .assessments
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("assessment {id}")))
    }

    async fn create_assessment(&self, new: &NewAssessment) -> Result<Assessment> {
        self.enter_with("create_assessment", new).await?;
        let mut records = self.records.lock();
        let id = AssessmentId(records.next_id());
        let assessment = Assessment {
            id,
            business_name: new.business_name.clone(),
            status: AssessmentStatus::Draft,
            intake_method: new.intake_method,
            region: new.region.clone(),
            acreage: new.acreage,
            annual_revenue: new.annual_revenue,
            created_at: fixture_time(),
            updated_at: fixture_time(),
        };
        records.assessments.insert(id, assessment.clone());
        Ok(assessment)
    }

    async fn update_assessment(
        &self,
        id: AssessmentId,
        patch: &AssessmentPatch,
    ) -> Result<Assessment> {
        self.enter_with("update_assessment", patch).await?;
        let mut records = self.records.lock();
        let current = records
            .assessments
            .get(&id)
            .ok_or_else(|| not_found(format!("assessment {id}")))?;
        let next = patch.apply_to(current);
        records.assessments.insert(id, next.clone());
        Ok(next)
    }

    async fn delete_assessment(&self, id: AssessmentId) -> Result<()> {
        self.enter("delete_assessment").await?;
        self.records
            .lock()
            .assessments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("assessment {id}")))
    }

    async fn request_upload_url(
        &self,
        id: AssessmentId,
        request: &UploadUrlRequest,
    ) -> Result<UploadUrl> {
        self.enter_with("request_upload_url", request).await?;
        let document = DocumentId(self.records.lock().next_id());
        Ok(UploadUrl {
            upload_url: format!("https://uploads.test/{id}/{}", request.file_name),
            document_id: document,
            expires_at: fixture_time(),
        })
    }

    async fn save_answers(&self, id: AssessmentId, answers: &IntakeAnswers) -> Result<()> {
        self.enter("save_answers").await?;
        self.records
            .lock()
            .answers
            .entry(id)
            .or_default()
            .extend(answers.answers.clone());
        Ok(())
    }

    async fn start_gap_detection(&self, id: AssessmentId) -> Result<()> {
        self.enter("start_gap_detection").await?;
        let mut records = self.records.lock();
        if let Some(a) = records.assessments.get_mut(&id) {
            a.status = AssessmentStatus::GapDetection;
        }
        records.detections.push(id);
        Ok(())
    }

    async fn gap_fields(&self, id: AssessmentId) -> Result<Vec<GapField>> {
        self.enter("gap_fields").await?;
        Ok(self
            .records
            .lock()
            .gap_fields
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn gap_stats(&self, id: AssessmentId) -> Result<GapStats> {
        self.enter("gap_stats").await?;
        let records = self.records.lock();
        Ok(GapStats::from_fields(
            records.gap_fields.get(&id).map_or(&[], Vec::as_slice),
        ))
    }

    async fn update_gap_fields(
        &self,
        id: AssessmentId,
        batch: &GapFieldBatch,
    ) -> Result<Vec<GapField>> {
        self.enter_with("update_gap_fields", batch).await?;
        let mut records = self.records.lock();
        let fields = records.gap_fields.entry(id).or_default();
        *fields = batch.apply_to(fields);
        Ok(fields
            .iter()
            .filter(|f| batch.updates.iter().any(|u| u.id == f.id))
            .cloned()
            .collect())
    }

    async fn risk_scores(&self, id: AssessmentId) -> Result<Vec<RiskScore>> {
        self.enter("risk_scores").await?;
        Ok(self
            .records
            .lock()
            .risk_scores
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn edit_recommendation(
        &self,
        score: RiskScoreId,
        edit: &RecommendationEdit,
    ) -> Result<RiskScore> {
        self.enter_with("edit_recommendation", edit).await?;
        let mut records = self.records.lock();
        let found = records
            .risk_scores
            .values_mut()
            .flatten()
            .find(|s| s.id == score)
            .ok_or_else(|| not_found(format!("risk score {score}")))?;
        found.recommendation = Some(edit.recommendation.clone());
        Ok(found.clone())
    }

    async fn report(&self, id: AssessmentId) -> Result<Report> {
        self.enter("report").await?;
        Self::report_for(&self.records.lock(), id)
    }

    async fn generate_pdf(&self, id: AssessmentId) -> Result<PdfJob> {
        self.enter("generate_pdf").await?;
        let mut records = self.records.lock();
        let job = records.next_id();
        records
            .pdf_urls
            .insert(id, format!("https://reports.test/{id}.pdf"));
        Ok(PdfJob {
            job_id: format!("pdf-{job}"),
            status: PdfJobStatus::Ready,
        })
    }

    async fn comments(&self, id: AssessmentId) -> Result<Vec<Comment>> {
        self.enter("comments").await?;
        Ok(self
            .records
            .lock()
            .comments
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_comment(&self, id: AssessmentId, comment: &NewComment) -> Result<Comment> {
        self.enter_with("add_comment", comment).await?;
        let mut records = self.records.lock();
        let created = Comment {
            id: CommentId::Server(records.next_id()),
            author_id: self.author.id,
            author_name: self.author.display_name.clone(),
            body: comment.body.clone(),
            created_at: fixture_time(),
        };
        records.comments.entry(id).or_default().push(created.clone());
        Ok(created)
    }

    async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        self.enter("list_prompts").await?;
        Ok(self.records.lock().prompts.values().cloned().collect())
    }

    async fn get_prompt(&self, id: PromptId) -> Result<Prompt> {
        self.enter("get_prompt").await?;
        self.records
            .lock()
            .prompts
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("prompt {id}")))
    }

    async fn create_prompt(&self, input: &PromptInput) -> Result<Prompt> {
        self.enter_with("create_prompt", input).await?;
        let mut records = self.records.lock();
        let prompt = Prompt {
            id: PromptId(records.next_id()),
            name: input.name.clone(),
            stage: input.stage,
            template: input.template.clone(),
            version: 1,
            active: input.active,
            updated_at: fixture_time(),
        };
        records.prompts.insert(prompt.id, prompt.clone());
        Ok(prompt)
    }

    async fn update_prompt(&self, id: PromptId, input: &PromptInput) -> Result<Prompt> {
        self.enter_with("update_prompt", input).await?;
        let mut records = self.records.lock();
        let previous = records
            .prompts
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("prompt {id}")))?;
        records.history.entry(id).or_default().push(PromptRevision {
            prompt_id: id,
            version: previous.version,
            template: previous.template,
            changed_by: self.author.id,
            changed_at: fixture_time(),
        });
        let next = Prompt {
            id,
            name: input.name.clone(),
            stage: input.stage,
            template: input.template.clone(),
            version: previous.version + 1,
            active: input.active,
            updated_at: fixture_time(),
        };
        records.prompts.insert(id, next.clone());
        Ok(next)
    }

    async fn delete_prompt(&self, id: PromptId) -> Result<()> {
        self.enter("delete_prompt").await?;
        self.records
            .lock()
            .prompts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("prompt {id}")))
    }

    async fn import_prompts(&self, import: &PromptImport) -> Result<PromptImportSummary> {
        self.enter_with("import_prompts", import).await?;
        let mut records = self.records.lock();
        let mut summary = PromptImportSummary {
            created: 0,
            updated: 0,
        };
        for input in &import.prompts {
            let existing = records
                .prompts
                .values_mut()
                .find(|p| p.name == input.name && p.stage == input.stage);
            if let Some(prompt) = existing {
                prompt.template.clone_from(&input.template);
                prompt.version += 1;
                summary.updated += 1;
            } else {
                let id = PromptId(records.next_id());
                records.prompts.insert(
                    id,
                    Prompt {
                        id,
                        name: input.name.clone(),
                        stage: input.stage,
                        template: input.template.clone(),
                        version: 1,
                        active: input.active,
                        updated_at: fixture_time(),
                    },
                );
                summary.created += 1;
            }
        }
        Ok(summary)
    }

    async fn prompt_comments(&self, id: PromptId) -> Result<Vec<PromptComment>> {
        self.enter("prompt_comments").await?;
        Ok(self
            .records
            .lock()
            .prompt_comments
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_prompt_comment(&self, id: PromptId, comment: &NewComment) -> Result<PromptComment> {
        self.enter_with("add_prompt_comment", comment).await?;
        let mut records = self.records.lock();
        let created = PromptComment {
            id: CommentId::Server(records.next_id()),
            prompt_id: id,
            author_id: self.author.id,
            author_name: self.author.display_name.clone(),
            body: comment.body.clone(),
            created_at: fixture_time(),
        };
        records
            .prompt_comments
            .entry(id)
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn prompt_history(&self, id: PromptId) -> Result<Vec<PromptRevision>> {
        self.enter("prompt_history").await?;
        Ok(self
            .records
            .lock()
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.enter("list_users").await?;
        Ok(self.records.lock().users.values().cloned().collect())
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        self.enter("get_user").await?;
        self.records
            .lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("user {id}")))
    }

    async fn create_user(&self, new: &NewUser) -> Result<User> {
        self.enter_with("create_user", new).await?;
        let mut records = self.records.lock();
        let user = User {
            id: UserId(records.next_id()),
            email: new.email.clone(),
            display_name: new.display_name.clone(),
            groups: new.groups.clone(),
            enabled: true,
            created_at: fixture_time(),
        };
        records.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User> {
        self.enter_with("update_user", patch).await?;
        let mut records = self.records.lock();
        let user = records
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found(format!("user {id}")))?;
        if let Some(name) = &patch.display_name {
            user.display_name.clone_from(name);
        }
        if let Some(enabled) = patch.enabled {
            user.enabled = enabled;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.enter("delete_user").await?;
        self.records
            .lock()
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("user {id}")))
    }

    async fn add_user_to_group(&self, id: UserId, membership: &GroupMembership) -> Result<User> {
        self.enter_with("add_user_to_group", membership).await?;
        let mut records = self.records.lock();
        let user = records
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found(format!("user {id}")))?;
        if !user.groups.contains(&membership.group) {
            user.groups.push(membership.group.clone());
        }
        Ok(user.clone())
    }

    async fn remove_user_from_group(
        &self,
        id: UserId,
        membership: &GroupMembership,
    ) -> Result<User> {
        self.enter_with("remove_user_from_group", membership).await?;
        let mut records = self.records.lock();
        let user = records
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found(format!("user {id}")))?;
        user.groups.retain(|g| g != &membership.group);
        Ok(user.clone())
    }
}
