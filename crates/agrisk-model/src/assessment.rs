//! Assessment records and their request payloads

use crate::ids::{AssessmentId, DocumentId};
use crate::validate::{Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pipeline stage of an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// Created, no intake data yet
    Draft,
    /// Intake in progress
    Intake,
    /// AI-assisted gap detection running or awaiting review
    GapDetection,
    /// Risk scoring running
    Scoring,
    /// Report available
    Complete,
}

/// How business data enters the assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeMethod {
    /// Business documents uploaded for extraction
    DocumentUpload,
    /// Step-by-step interview
    GuidedInterview,
    /// Free-form form with auto-save
    ManualEntry,
}

/// Assessment as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    /// Server-assigned id
    pub id: AssessmentId,
    /// Farm business being assessed
    pub business_name: String,
    /// Pipeline stage
    pub status: AssessmentStatus,
    /// How intake answers are collected
    pub intake_method: IntakeMethod,
    /// Region or district
    #[serde(default)]
    pub region: Option<String>,
    /// Farmed area in acres
    #[serde(default)]
    pub acreage: Option<f64>,
    /// Gross annual revenue
    #[serde(default)]
    pub annual_revenue: Option<f64>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating an assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssessment {
    /// Farm business being assessed
    pub business_name: String,
    /// How intake answers will be collected
    pub intake_method: IntakeMethod,
    /// Region or district
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Farmed area in acres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acreage: Option<f64>,
    /// Gross annual revenue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_revenue: Option<f64>,
}

impl NewAssessment {
    /// Create payload with the required fields
    #[must_use]
    pub fn new(business_name: impl Into<String>, intake_method: IntakeMethod) -> Self {
        Self {
            business_name: business_name.into(),
            intake_method,
            region: None,
            acreage: None,
            annual_revenue: None,
        }
    }
}

impl Validate for NewAssessment {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("businessName", &self.business_name);
        errors.require_non_negative("acreage", self.acreage);
        errors.require_non_negative("annualRevenue", self.annual_revenue);
        errors.into_result()
    }
}

/// Partial update of an assessment; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentPatch {
    /// New business name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    /// New pipeline stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AssessmentStatus>,
    /// New region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// New farmed area
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acreage: Option<f64>,
    /// New annual revenue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_revenue: Option<f64>,
}

impl AssessmentPatch {
    /// Project the patch onto a cached assessment
    #[must_use]
    pub fn apply_to(&self, current: &Assessment) -> Assessment {
        let mut next = current.clone();
        if let Some(name) = &self.business_name {
            next.business_name.clone_from(name);
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(region) = &self.region {
            next.region = Some(region.clone());
        }
        if let Some(acreage) = self.acreage {
            next.acreage = Some(acreage);
        }
        if let Some(revenue) = self.annual_revenue {
            next.annual_revenue = Some(revenue);
        }
        next
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Validate for AssessmentPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.is_empty() {
            errors.add("patch", "must change at least one field");
        }
        if let Some(name) = &self.business_name {
            errors.require_text("businessName", name);
        }
        errors.require_non_negative("acreage", self.acreage);
        errors.require_non_negative("annualRevenue", self.annual_revenue);
        errors.into_result()
    }
}

/// Aggregate counts shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentStats {
    /// Number of assessments
    pub total: u64,
    /// Count per pipeline stage
    #[serde(default)]
    pub by_status: BTreeMap<AssessmentStatus, u64>,
    /// Mean overall score of scored assessments
    #[serde(default)]
    pub average_risk_score: Option<f64>,
}

/// Request for a pre-signed document upload URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    /// Original file name
    pub file_name: String,
    /// MIME type of the upload
    pub content_type: String,
}

impl Validate for UploadUrlRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("fileName", &self.file_name);
        errors.require_text("contentType", &self.content_type);
        errors.into_result()
    }
}

/// Pre-signed upload target issued by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrl {
    /// Pre-signed target for a single PUT
    pub upload_url: String,
    /// Id the document will be registered under
    pub document_id: DocumentId,
    /// When the URL stops accepting uploads
    pub expires_at: DateTime<Utc>,
}

/// Intake answers keyed by field id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeAnswers {
    /// Answer per catalogue field id
    pub answers: BTreeMap<String, String>,
}

impl IntakeAnswers {
    /// Wrap a set of answers
    #[must_use]
    pub fn new(answers: BTreeMap<String, String>) -> Self {
        Self { answers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Assessment {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Assessment {
            id: AssessmentId(1),
            business_name: "Green Acres".to_string(),
            status: AssessmentStatus::Intake,
            intake_method: IntakeMethod::ManualEntry,
            region: None,
            acreage: Some(320.0),
            annual_revenue: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn non_finite_figures_are_rejected() {
        let new = NewAssessment {
            acreage: Some(f64::NAN),
            annual_revenue: Some(f64::INFINITY),
            ..NewAssessment::new("Green Acres", IntakeMethod::GuidedInterview)
        };
        let errors = new.validate().unwrap_err();
        assert_eq!(errors.field_names(), vec!["acreage", "annualRevenue"]);

        let patch = AssessmentPatch {
            acreage: Some(f64::NEG_INFINITY),
            ..AssessmentPatch::default()
        };
        assert_eq!(patch.validate().unwrap_err().field_names(), vec!["acreage"]);
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let patch = AssessmentPatch {
            business_name: Some("Green Acres LLC".to_string()),
            annual_revenue: Some(120_000.0),
            ..AssessmentPatch::default()
        };
        let next = patch.apply_to(&sample());

        assert_eq!(next.business_name, "Green Acres LLC");
        assert_eq!(next.annual_revenue, Some(120_000.0));
        assert_eq!(next.acreage, Some(320.0));
        assert_eq!(next.status, AssessmentStatus::Intake);
    }

    #[test]
    fn empty_patch_is_invalid() {
        let err = AssessmentPatch::default().validate().unwrap_err();
        assert_eq!(err.field("patch").len(), 1);
    }

    #[test]
    fn new_assessment_requires_name() {
        let mut payload = NewAssessment::new("  ", IntakeMethod::GuidedInterview);
        payload.acreage = Some(-5.0);
        let err = payload.validate().unwrap_err();
        assert_eq!(err.field_names(), vec!["acreage", "businessName"]);
    }

    #[test]
    fn assessment_wire_format_is_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["businessName"], "Green Acres");
        assert_eq!(json["intakeMethod"], "manual_entry");
    }
}
