//! Typed queries and mutations over the cache
//!
//! Every read goes through the query cache under its [`QueryKey`], which
//! also registers the fetcher used by later invalidations. Writes listed in
//! the mutation table run through the optimistic coordinator; the remaining
//! writes call the API and invalidate what they touched.

use crate::error::{CoreError, Result};
use crate::keys::QueryKey;
use crate::mutations::{self, MutationKind};
use agrisk_cache::{InvalidationReport, MutationPlan, QueryCache, QueryObserver};
use agrisk_client::{ClientConfig, RiskApi};
use agrisk_intake::DEFAULT_DEBOUNCE;
use agrisk_model::{
    Assessment, AssessmentId, AssessmentPatch, AssessmentStats, Comment, CurrentUser, GapField,
    GapFieldBatch, GapStats, GroupMembership, NewAssessment, NewComment, NewUser, PdfJob, Prompt,
    PromptComment, PromptId, PromptImport, PromptImportSummary, PromptInput, PromptRevision,
    RecommendationEdit, Report, RiskScore, RiskScoreId, User, UserId, UserPatch, Validate,
};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Cached access to the risk-assessment API
#[derive(Clone)]
pub struct DataLayer {
    api: Arc<dyn RiskApi>,
    cache: QueryCache<QueryKey>,
    autosave_debounce: Duration,
}

impl std::fmt::Debug for DataLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLayer")
            .field("cache", &self.cache.stats())
            .field("autosave_debounce", &self.autosave_debounce)
            .finish_non_exhaustive()
    }
}

impl DataLayer {
    /// Bind an API to a fresh cache
    #[must_use]
    pub fn new(api: Arc<dyn RiskApi>) -> Self {
        Self::with_cache(api, QueryCache::new())
    }

    /// Bind an API to a cache that keeps unobserved values for `retention`
    #[must_use]
    pub fn with_retention(api: Arc<dyn RiskApi>, retention: Duration) -> Self {
        Self::with_cache(api, QueryCache::with_retention(retention))
    }

    /// Bind an API using the retention window and auto-save quiet period
    /// from `config`
    #[must_use]
    pub fn from_config(api: Arc<dyn RiskApi>, config: &ClientConfig) -> Self {
        Self::with_retention(api, config.cache_retention())
            .with_autosave_debounce(config.autosave_debounce())
    }

    #[must_use]
    pub fn with_cache(api: Arc<dyn RiskApi>, cache: QueryCache<QueryKey>) -> Self {
        Self {
            api,
            cache,
            autosave_debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Quiet period used by manual-entry forms opened from this layer
    #[inline]
    #[must_use]
    pub fn with_autosave_debounce(mut self, debounce: Duration) -> Self {
        self.autosave_debounce = debounce;
        self
    }

    #[inline]
    #[must_use]
    pub fn autosave_debounce(&self) -> Duration {
        self.autosave_debounce
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &QueryCache<QueryKey> {
        &self.cache
    }

    #[inline]
    #[must_use]
    pub fn api(&self) -> &Arc<dyn RiskApi> {
        &self.api
    }

    /// Keep a key's entry alive while the returned handle lives
    #[must_use]
    pub fn observe(&self, key: QueryKey) -> QueryObserver<QueryKey> {
        self.cache.observe(key)
    }

    /// Mark keys stale and refetch the observed ones
    pub async fn invalidate(&self, keys: &[QueryKey]) -> InvalidationReport<QueryKey> {
        self.cache.invalidate(keys).await
    }

    async fn query<T, F, Fut>(&self, key: QueryKey, call: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Arc<dyn RiskApi>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = agrisk_client::Result<T>> + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        self.cache
            .fetch_query(key, move || call(Arc::clone(&api)))
            .await
            .map_err(CoreError::from)
    }

    async fn run<T, P, R>(
        &self,
        kind: MutationKind,
        plan: MutationPlan<QueryKey, T, P>,
        payload: P,
        send: impl FnOnce(Arc<dyn RiskApi>, P) -> BoxFuture<'static, agrisk_client::Result<R>>,
    ) -> Result<R>
    where
        T: Clone + Send + Sync + 'static,
        P: Validate,
    {
        payload.validate()?;
        let key = *plan.key();
        tracing::debug!(%kind, %key, "mutation starting");
        let api = Arc::clone(&self.api);
        let result = self
            .cache
            .mutate(plan, payload, move |payload| send(api, payload))
            .await;
        if let Err(e) = &result {
            tracing::info!(%kind, %key, error = %e, "mutation did not apply");
        }
        result.map_err(CoreError::from)
    }

    async fn write<R, Fut>(&self, settles: &[QueryKey], call: Fut) -> Result<R>
    where
        Fut: Future<Output = agrisk_client::Result<R>>,
    {
        let result = call.await;
        self.cache.invalidate(settles).await;
        Ok(result?)
    }

    // ---- assessments ----

    pub async fn assessments(&self) -> Result<Vec<Assessment>> {
        self.query(QueryKey::Assessments, |api| async move {
            api.list_assessments().await
        })
        .await
    }

    pub async fn assessment_stats(&self) -> Result<AssessmentStats> {
        self.query(QueryKey::AssessmentStats, |api| async move {
            api.assessment_stats().await
        })
        .await
    }

    pub async fn assessment(&self, id: AssessmentId) -> Result<Assessment> {
        self.query(QueryKey::Assessment(id), move |api| async move {
            api.get_assessment(id).await
        })
        .await
    }

    /// Create an assessment; list views are refreshed
    pub async fn create_assessment(&self, new: &NewAssessment) -> Result<Assessment> {
        new.validate()?;
        self.write(
            &[QueryKey::Assessments, QueryKey::AssessmentStats],
            self.api.create_assessment(new),
        )
        .await
    }

    /// Optimistically merge `patch` into the cached assessment
    pub async fn update_assessment(
        &self,
        id: AssessmentId,
        patch: AssessmentPatch,
    ) -> Result<Assessment> {
        self.run(
            MutationKind::UpdateAssessment,
            mutations::update_assessment(id),
            patch,
            move |api, patch| async move { api.update_assessment(id, &patch).await }.boxed(),
        )
        .await
    }

    /// Delete an assessment and forget everything cached about it
    pub async fn delete_assessment(&self, id: AssessmentId) -> Result<()> {
        let result = self.api.delete_assessment(id).await;
        if result.is_ok() {
            self.cache.forget(&QueryKey::all_for_assessment(id));
        }
        self.write(&[QueryKey::Assessments, QueryKey::AssessmentStats], async {
            result
        })
        .await
    }

    // ---- gap fields ----

    pub async fn gap_fields(&self, id: AssessmentId) -> Result<Vec<GapField>> {
        self.query(QueryKey::GapFields(id), move |api| async move {
            api.gap_fields(id).await
        })
        .await
    }

    pub async fn gap_stats(&self, id: AssessmentId) -> Result<GapStats> {
        self.query(QueryKey::GapStats(id), move |api| async move {
            api.gap_stats(id).await
        })
        .await
    }

    /// Apply corrections; the fields show as verified until the refetch lands
    pub async fn update_gap_fields(
        &self,
        id: AssessmentId,
        batch: GapFieldBatch,
    ) -> Result<Vec<GapField>> {
        self.run(
            MutationKind::UpdateGapFields,
            mutations::update_gap_fields(id),
            batch,
            move |api, batch| async move { api.update_gap_fields(id, &batch).await }.boxed(),
        )
        .await
    }

    // ---- risk scores and report ----

    pub async fn risk_scores(&self, id: AssessmentId) -> Result<Vec<RiskScore>> {
        self.query(QueryKey::RiskScores(id), move |api| async move {
            api.risk_scores(id).await
        })
        .await
    }

    /// Replace a score's recommendation; nothing is projected locally
    pub async fn edit_recommendation(
        &self,
        id: AssessmentId,
        score: RiskScoreId,
        edit: RecommendationEdit,
    ) -> Result<RiskScore> {
        self.run(
            MutationKind::EditRecommendation,
            mutations::edit_recommendation(id),
            edit,
            move |api, edit| async move { api.edit_recommendation(score, &edit).await }.boxed(),
        )
        .await
    }

    /// Whether a recommendation edit for this assessment is in flight
    #[must_use]
    pub fn is_saving_recommendation(&self, id: AssessmentId) -> bool {
        self.cache.is_mutating(&QueryKey::RiskScores(id))
    }

    pub async fn report(&self, id: AssessmentId) -> Result<Report> {
        self.query(QueryKey::Report(id), move |api| async move {
            api.report(id).await
        })
        .await
    }

    /// Queue a PDF render; the report is refetched to pick up its link
    pub async fn generate_pdf(&self, id: AssessmentId) -> Result<PdfJob> {
        self.write(&[QueryKey::Report(id)], self.api.generate_pdf(id))
            .await
    }

    // ---- comments ----

    pub async fn comments(&self, id: AssessmentId) -> Result<Vec<Comment>> {
        self.query(QueryKey::Comments(id), move |api| async move {
            api.comments(id).await
        })
        .await
    }

    /// Post a comment; it appears at the end of the list immediately
    pub async fn add_comment(
        &self,
        id: AssessmentId,
        author: CurrentUser,
        comment: NewComment,
    ) -> Result<Comment> {
        self.run(
            MutationKind::AddComment,
            mutations::add_comment(id, author, Utc::now()),
            comment,
            move |api, comment| async move { api.add_comment(id, &comment).await }.boxed(),
        )
        .await
    }

    // ---- prompts ----

    pub async fn prompts(&self) -> Result<Vec<Prompt>> {
        self.query(QueryKey::Prompts, |api| async move { api.list_prompts().await })
            .await
    }

    pub async fn prompt(&self, id: PromptId) -> Result<Prompt> {
        self.query(QueryKey::Prompt(id), move |api| async move {
            api.get_prompt(id).await
        })
        .await
    }

    pub async fn prompt_comments(&self, id: PromptId) -> Result<Vec<PromptComment>> {
        self.query(QueryKey::PromptComments(id), move |api| async move {
            api.prompt_comments(id).await
        })
        .await
    }

    pub async fn prompt_history(&self, id: PromptId) -> Result<Vec<PromptRevision>> {
        self.query(QueryKey::PromptHistory(id), move |api| async move {
            api.prompt_history(id).await
        })
        .await
    }

    pub async fn create_prompt(&self, input: &PromptInput) -> Result<Prompt> {
        input.validate()?;
        self.write(&[QueryKey::Prompts], self.api.create_prompt(input))
            .await
    }

    /// Save a new prompt version; the list and history follow
    pub async fn update_prompt(&self, id: PromptId, input: PromptInput) -> Result<Prompt> {
        input.validate()?;
        let api = Arc::clone(&self.api);
        self.cache
            .mutate(
                MutationPlan::<QueryKey, Prompt, PromptInput>::new(QueryKey::Prompt(id)),
                input,
                move |input| async move { api.update_prompt(id, &input).await },
            )
            .await
            .map_err(CoreError::from)
    }

    /// Delete a prompt along with its cached notes and history
    pub async fn delete_prompt(&self, id: PromptId) -> Result<()> {
        let result = self.api.delete_prompt(id).await;
        if result.is_ok() {
            self.cache.forget(&QueryKey::all_for_prompt(id));
        }
        self.write(&[QueryKey::Prompts], async { result }).await
    }

    pub async fn import_prompts(&self, import: &PromptImport) -> Result<PromptImportSummary> {
        import.validate()?;
        self.write(&[QueryKey::Prompts], self.api.import_prompts(import))
            .await
    }

    /// Post a note on a prompt; it appears at the end of the list immediately
    pub async fn add_prompt_comment(
        &self,
        id: PromptId,
        author: CurrentUser,
        comment: NewComment,
    ) -> Result<PromptComment> {
        self.run(
            MutationKind::AddPromptComment,
            mutations::add_prompt_comment(id, author, Utc::now()),
            comment,
            move |api, comment| {
                async move { api.add_prompt_comment(id, &comment).await }.boxed()
            },
        )
        .await
    }

    // ---- users ----

    pub async fn users(&self) -> Result<Vec<User>> {
        self.query(QueryKey::Users, |api| async move { api.list_users().await })
            .await
    }

    pub async fn user(&self, id: UserId) -> Result<User> {
        self.query(QueryKey::User(id), move |api| async move {
            api.get_user(id).await
        })
        .await
    }

    pub async fn create_user(&self, new: &NewUser) -> Result<User> {
        new.validate()?;
        self.write(&[QueryKey::Users], self.api.create_user(new))
            .await
    }

    pub async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User> {
        patch.validate()?;
        self.write(&[QueryKey::User(id)], self.api.update_user(id, patch))
            .await
    }

    pub async fn delete_user(&self, id: UserId) -> Result<()> {
        let result = self.api.delete_user(id).await;
        if result.is_ok() {
            self.cache.forget(&[QueryKey::User(id)]);
        }
        self.write(&[QueryKey::Users], async { result }).await
    }

    pub async fn add_user_to_group(&self, id: UserId, membership: &GroupMembership) -> Result<User> {
        membership.validate()?;
        self.write(&[QueryKey::User(id)], self.api.add_user_to_group(id, membership))
            .await
    }

    pub async fn remove_user_from_group(
        &self,
        id: UserId,
        membership: &GroupMembership,
    ) -> Result<User> {
        membership.validate()?;
        self.write(
            &[QueryKey::User(id)],
            self.api.remove_user_from_group(id, membership),
        )
        .await
    }
}
