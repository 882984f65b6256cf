//! Risk scores across the seven assessment categories

use crate::ids::{AssessmentId, RiskScoreId};
use crate::validate::{Validate, ValidationErrors};
use serde::{Deserialize, Serialize};

/// Scoring category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// Cash flow, debt and profitability
    Financial,
    /// Yield and livestock performance
    Production,
    /// Prices and access to buyers
    Market,
    /// Compliance and consents
    Regulatory,
    /// Climate, water and soil
    Environmental,
    /// Labour, equipment and processes
    Operational,
    /// Ownership transfer and key people
    Succession,
}

impl RiskCategory {
    /// Every category, in report order
    pub const ALL: [RiskCategory; 7] = [
        RiskCategory::Financial,
        RiskCategory::Production,
        RiskCategory::Market,
        RiskCategory::Regulatory,
        RiskCategory::Environmental,
        RiskCategory::Operational,
        RiskCategory::Succession,
    ];

    /// Human-readable label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Financial => "Financial",
            RiskCategory::Production => "Production",
            RiskCategory::Market => "Market",
            RiskCategory::Regulatory => "Regulatory",
            RiskCategory::Environmental => "Environmental",
            RiskCategory::Operational => "Operational",
            RiskCategory::Succession => "Succession",
        }
    }
}

/// Coarse banding of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Below 40
    Low,
    /// 40 to 69
    Medium,
    /// 70 and above
    High,
}

impl RiskLevel {
    /// Band a 0-100 score: below 40 is low, below 70 medium, otherwise high
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => RiskLevel::Low,
            40..=69 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

/// Score for one category of one assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    /// Server-assigned id
    pub id: RiskScoreId,
    /// Owning assessment
    pub assessment_id: AssessmentId,
    /// Risk category
    pub category: RiskCategory,
    /// Score out of 100
    pub score: u8,
    /// Why the model scored it so
    #[serde(default)]
    pub rationale: Option<String>,
    /// Reviewer-editable advice
    #[serde(default)]
    pub recommendation: Option<String>,
}

impl RiskScore {
    /// Band of this score
    #[inline]
    #[must_use]
    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_score(self.score)
    }
}

/// Replacement text for a score's recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationEdit {
    /// Replacement recommendation text
    pub recommendation: String,
}

impl RecommendationEdit {
    /// Create edit
    #[must_use]
    pub fn new(recommendation: impl Into<String>) -> Self {
        Self {
            recommendation: recommendation.into(),
        }
    }
}

impl Validate for RecommendationEdit {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("recommendation", &self.recommendation);
        errors.into_result()
    }
}
