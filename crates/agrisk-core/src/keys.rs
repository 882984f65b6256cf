//! Query keys for every cached API resource
//!
//! Derived edges mirror what the server recomputes: statistics follow their
//! collection, a report follows its scores, and list views follow the
//! records they summarise.

use agrisk_cache::CacheKey;
use agrisk_model::{AssessmentId, PromptId, UserId};

/// Identity of one cached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    /// Assessment list
    Assessments,
    /// Dashboard counters across all assessments
    AssessmentStats,
    /// One assessment record
    Assessment(AssessmentId),
    /// Gap fields extracted for an assessment
    GapFields(AssessmentId),
    /// Missing/partial/verified counts for an assessment's gap fields
    GapStats(AssessmentId),
    /// Risk scores per category
    RiskScores(AssessmentId),
    /// Reviewer comment thread
    Comments(AssessmentId),
    /// Generated report
    Report(AssessmentId),
    /// Prompt list
    Prompts,
    /// One prompt
    Prompt(PromptId),
    /// Notes left on a prompt
    PromptComments(PromptId),
    /// Saved versions of a prompt
    PromptHistory(PromptId),
    /// User list
    Users,
    /// One user
    User(UserId),
}

impl QueryKey {
    /// Assessment this key belongs to, if any
    #[must_use]
    pub fn assessment(&self) -> Option<AssessmentId> {
        match *self {
            QueryKey::Assessment(a)
            | QueryKey::GapFields(a)
            | QueryKey::GapStats(a)
            | QueryKey::RiskScores(a)
            | QueryKey::Comments(a)
            | QueryKey::Report(a) => Some(a),
            _ => None,
        }
    }

    /// Every per-assessment key, used when an assessment is deleted
    #[must_use]
    pub fn all_for_assessment(a: AssessmentId) -> [QueryKey; 6] {
        [
            QueryKey::Assessment(a),
            QueryKey::GapFields(a),
            QueryKey::GapStats(a),
            QueryKey::RiskScores(a),
            QueryKey::Comments(a),
            QueryKey::Report(a),
        ]
    }

    /// Every per-prompt key, used when a prompt is deleted
    #[must_use]
    pub fn all_for_prompt(p: PromptId) -> [QueryKey; 3] {
        [
            QueryKey::Prompt(p),
            QueryKey::PromptComments(p),
            QueryKey::PromptHistory(p),
        ]
    }
}

impl CacheKey for QueryKey {
    fn derived(&self) -> Vec<Self> {
        match *self {
            QueryKey::GapFields(a) => vec![QueryKey::GapStats(a)],
            QueryKey::Assessment(_) => vec![QueryKey::Assessments, QueryKey::AssessmentStats],
            QueryKey::RiskScores(a) => vec![QueryKey::Report(a)],
            QueryKey::Prompt(p) => vec![QueryKey::Prompts, QueryKey::PromptHistory(p)],
            QueryKey::User(_) => vec![QueryKey::Users],
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKey::Assessments => f.write_str("assessments"),
            QueryKey::AssessmentStats => f.write_str("assessments/stats"),
            QueryKey::Assessment(a) => write!(f, "assessments/{a}"),
            QueryKey::GapFields(a) => write!(f, "assessments/{a}/gap-fields"),
            QueryKey::GapStats(a) => write!(f, "assessments/{a}/gap-fields/stats"),
            QueryKey::RiskScores(a) => write!(f, "assessments/{a}/risk-scores"),
            QueryKey::Comments(a) => write!(f, "assessments/{a}/comments"),
            QueryKey::Report(a) => write!(f, "assessments/{a}/report"),
            QueryKey::Prompts => f.write_str("prompts"),
            QueryKey::Prompt(p) => write!(f, "prompts/{p}"),
            QueryKey::PromptComments(p) => write!(f, "prompts/{p}/comments"),
            QueryKey::PromptHistory(p) => write!(f, "prompts/{p}/history"),
            QueryKey::Users => f.write_str("users"),
            QueryKey::User(u) => write!(f, "users/{u}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrisk_cache::dependency_closure;
    use pretty_assertions::assert_eq;

    const A: AssessmentId = AssessmentId(9);

    #[test]
    fn gap_fields_pull_in_their_stats() {
        assert_eq!(
            dependency_closure(&[QueryKey::GapFields(A)]),
            vec![QueryKey::GapFields(A), QueryKey::GapStats(A)]
        );
    }

    #[test]
    fn assessment_edits_reach_list_views() {
        assert_eq!(
            dependency_closure(&[QueryKey::Assessment(A)]),
            vec![
                QueryKey::Assessment(A),
                QueryKey::Assessments,
                QueryKey::AssessmentStats
            ]
        );
    }

    #[test]
    fn scores_invalidate_the_report_only() {
        let closure = dependency_closure(&[QueryKey::RiskScores(A)]);
        assert_eq!(closure, vec![QueryKey::RiskScores(A), QueryKey::Report(A)]);
    }

    #[test]
    fn comments_are_a_leaf() {
        assert!(QueryKey::Comments(A).derived().is_empty());
        assert!(QueryKey::Report(A).derived().is_empty());
    }

    #[test]
    fn prompt_edges() {
        let p = PromptId(4);
        assert_eq!(
            QueryKey::Prompt(p).derived(),
            vec![QueryKey::Prompts, QueryKey::PromptHistory(p)]
        );
        assert_eq!(QueryKey::User(UserId(1)).derived(), vec![QueryKey::Users]);
    }

    #[test]
    fn display_reads_like_a_path() {
        assert_eq!(QueryKey::GapStats(A).to_string(), "assessments/9/gap-fields/stats");
        assert_eq!(QueryKey::Users.to_string(), "users");
    }
}
