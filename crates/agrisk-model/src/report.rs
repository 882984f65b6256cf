//! Rendered risk report

use crate::ids::AssessmentId;
use crate::risk::{RiskCategory, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One category section of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    /// Risk category
    pub category: RiskCategory,
    /// Score out of 100
    pub score: u8,
    /// Band derived from the score
    pub level: RiskLevel,
    /// Narrative for the category
    pub summary: String,
    /// Recommendation copied from the risk score
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Report for a completed assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Assessment reported on
    pub assessment_id: AssessmentId,
    /// Overall score out of 100
    pub overall_score: u8,
    /// One section per risk category
    pub sections: Vec<ReportSection>,
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Link to the rendered PDF, once available
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl Report {
    /// Highest-risk sections first
    #[must_use]
    pub fn sections_by_risk(&self) -> Vec<&ReportSection> {
        let mut sections: Vec<&ReportSection> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.score.cmp(&a.score));
        sections
    }
}

/// State of an asynchronous PDF render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfJobStatus {
    /// Waiting for a renderer
    Queued,
    /// Being rendered
    Rendering,
    /// PDF link is on the report
    Ready,
    /// Rendering gave up
    Failed,
}

/// Handle returned when a PDF render is triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfJob {
    /// Renderer job id
    pub job_id: String,
    /// Current status
    pub status: PdfJobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_sorted_by_score() {
        let section = |category, score| ReportSection {
            category,
            score,
            level: RiskLevel::from_score(score),
            summary: String::new(),
            recommendation: None,
        };
        let report = Report {
            assessment_id: AssessmentId(1),
            overall_score: 50,
            sections: vec![
                section(RiskCategory::Market, 30),
                section(RiskCategory::Financial, 80),
                section(RiskCategory::Production, 55),
            ],
            generated_at: Utc::now(),
            pdf_url: None,
        };
        let order: Vec<_> = report.sections_by_risk().iter().map(|s| s.category).collect();
        assert_eq!(
            order,
            vec![RiskCategory::Financial, RiskCategory::Production, RiskCategory::Market]
        );
    }
}
