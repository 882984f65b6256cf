//! Mutation table
//!
//! One row per write the client performs against cached data. A row fixes
//! the key the mutation claims, the local projection shown while the call
//! is in flight, and what settling invalidates. Derived views such as
//! statistics and reports are reached through [`QueryKey`]'s edges rather
//! than listed here.

use crate::keys::QueryKey;
use agrisk_cache::MutationPlan;
use agrisk_model::{
    Assessment, AssessmentId, AssessmentPatch, Comment, CurrentUser, GapField, GapFieldBatch,
    NewComment, PromptComment, PromptId, RecommendationEdit, RiskScore,
};
use chrono::{DateTime, Utc};

/// Writes with a declared cache behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Bulk gap-field correction, shown as verified at once
    UpdateGapFields,
    /// Reviewer comment appended to the thread at once
    AddComment,
    /// Recommendation text on one risk score; not projected
    EditRecommendation,
    /// Partial assessment update merged into the cached record
    UpdateAssessment,
    /// Note appended to a prompt's thread at once
    AddPromptComment,
}

impl MutationKind {
    /// Every row of the table
    pub const ALL: [MutationKind; 5] = [
        MutationKind::UpdateGapFields,
        MutationKind::AddComment,
        MutationKind::EditRecommendation,
        MutationKind::UpdateAssessment,
        MutationKind::AddPromptComment,
    ];

    /// Whether the row shows a local projection before the server answers
    #[must_use]
    pub fn is_optimistic(self) -> bool {
        !matches!(self, MutationKind::EditRecommendation)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MutationKind::UpdateGapFields => "update-gap-fields",
            MutationKind::AddComment => "add-comment",
            MutationKind::EditRecommendation => "edit-recommendation",
            MutationKind::UpdateAssessment => "update-assessment",
            MutationKind::AddPromptComment => "add-prompt-comment",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Corrected values replace the cached ones and the fields turn verified
#[must_use]
pub fn update_gap_fields(
    assessment: AssessmentId,
) -> MutationPlan<QueryKey, Vec<GapField>, GapFieldBatch> {
    MutationPlan::new(QueryKey::GapFields(assessment))
        .optimistic(|fields: &Vec<GapField>, batch: &GapFieldBatch| batch.apply_to(fields))
}

/// A locally synthesized comment is appended to the list
///
/// The stand-in carries a local id and is dropped wholesale when the list
/// is refetched.
#[must_use]
pub fn add_comment(
    assessment: AssessmentId,
    author: CurrentUser,
    now: DateTime<Utc>,
) -> MutationPlan<QueryKey, Vec<Comment>, NewComment> {
    MutationPlan::new(QueryKey::Comments(assessment)).optimistic(
        move |comments: &Vec<Comment>, new: &NewComment| {
            let mut next = comments.clone();
            next.push(Comment::pending(&author, new.body.clone(), now));
            next
        },
    )
}

/// No projection; the caller disables the row while the call runs
#[must_use]
pub fn edit_recommendation(
    assessment: AssessmentId,
) -> MutationPlan<QueryKey, Vec<RiskScore>, RecommendationEdit> {
    MutationPlan::new(QueryKey::RiskScores(assessment))
}

/// Patched fields are merged into the cached record
#[must_use]
pub fn update_assessment(
    assessment: AssessmentId,
) -> MutationPlan<QueryKey, Assessment, AssessmentPatch> {
    MutationPlan::new(QueryKey::Assessment(assessment))
        .optimistic(|current: &Assessment, patch: &AssessmentPatch| patch.apply_to(current))
}

/// A locally synthesized note is appended to the prompt's discussion
#[must_use]
pub fn add_prompt_comment(
    prompt: PromptId,
    author: CurrentUser,
    now: DateTime<Utc>,
) -> MutationPlan<QueryKey, Vec<PromptComment>, NewComment> {
    MutationPlan::new(QueryKey::PromptComments(prompt)).optimistic(
        move |comments: &Vec<PromptComment>, new: &NewComment| {
            let mut next = comments.clone();
            next.push(PromptComment::pending(prompt, &author, new.body.clone(), now));
            next
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrisk_cache::dependency_closure;
    use agrisk_model::UserId;
    use pretty_assertions::assert_eq;

    const A: AssessmentId = AssessmentId(12);

    fn author() -> CurrentUser {
        CurrentUser::new(UserId(5), "Ana Reviewer")
    }

    fn settles(key: &QueryKey, extra: &[QueryKey]) -> Vec<QueryKey> {
        let mut roots = vec![*key];
        roots.extend_from_slice(extra);
        dependency_closure(&roots)
    }

    #[test]
    fn table_rows_match_their_plans() {
        for kind in MutationKind::ALL {
            let (key, optimistic, extra) = match kind {
                MutationKind::UpdateGapFields => {
                    let plan = update_gap_fields(A);
                    (*plan.key(), plan.is_optimistic(), plan.extra_invalidations().to_vec())
                }
                MutationKind::AddComment => {
                    let plan = add_comment(A, author(), Utc::now());
                    (*plan.key(), plan.is_optimistic(), plan.extra_invalidations().to_vec())
                }
                MutationKind::EditRecommendation => {
                    let plan = edit_recommendation(A);
                    (*plan.key(), plan.is_optimistic(), plan.extra_invalidations().to_vec())
                }
                MutationKind::UpdateAssessment => {
                    let plan = update_assessment(A);
                    (*plan.key(), plan.is_optimistic(), plan.extra_invalidations().to_vec())
                }
                MutationKind::AddPromptComment => {
                    let plan = add_prompt_comment(PromptId(3), author(), Utc::now());
                    (*plan.key(), plan.is_optimistic(), plan.extra_invalidations().to_vec())
                }
            };
            assert_eq!(optimistic, kind.is_optimistic(), "{kind}");

            let expected = match kind {
                MutationKind::UpdateGapFields => {
                    vec![QueryKey::GapFields(A), QueryKey::GapStats(A)]
                }
                MutationKind::AddComment => vec![QueryKey::Comments(A)],
                MutationKind::EditRecommendation => {
                    vec![QueryKey::RiskScores(A), QueryKey::Report(A)]
                }
                MutationKind::UpdateAssessment => vec![
                    QueryKey::Assessment(A),
                    QueryKey::Assessments,
                    QueryKey::AssessmentStats,
                ],
                MutationKind::AddPromptComment => vec![QueryKey::PromptComments(PromptId(3))],
            };
            assert_eq!(settles(&key, &extra), expected, "{kind}");
        }
    }
}
