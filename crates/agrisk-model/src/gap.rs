//! Gap fields produced by AI-assisted extraction
//!
//! A gap field is one business-plan datum the extraction step flagged as
//! missing, partially found, or already verified by a person.

use crate::ids::{AssessmentId, GapFieldId};
use crate::validate::{Validate, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Review status of a gap field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    /// Nothing extracted
    Missing,
    /// Extracted with low confidence
    Partial,
    /// Confirmed or corrected by a reviewer
    Verified,
}

/// One extracted datum awaiting review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapField {
    /// Server-assigned id
    pub id: GapFieldId,
    /// Owning assessment
    pub assessment_id: AssessmentId,
    /// Machine name of the datum, e.g. `annual_revenue`
    pub field_key: String,
    /// Label shown to reviewers
    pub label: String,
    /// Business-plan section the datum belongs to
    pub category: String,
    /// Value found by extraction
    #[serde(default)]
    pub extracted_value: Option<String>,
    /// Value entered by a reviewer
    #[serde(default)]
    pub corrected_value: Option<String>,
    /// Extraction confidence in 0..=1
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Current status
    pub status: GapStatus,
}

impl GapField {
    /// Value a reader should see: the correction when present, else the extraction
    #[must_use]
    pub fn effective_value(&self) -> Option<&str> {
        self.corrected_value
            .as_deref()
            .or(self.extracted_value.as_deref())
    }
}

/// Correction of a single gap field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapFieldUpdate {
    /// Field to correct
    pub id: GapFieldId,
    /// Replacement value
    pub corrected_value: String,
}

impl GapFieldUpdate {
    /// Create update
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<GapFieldId>, corrected_value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            corrected_value: corrected_value.into(),
        }
    }
}

/// Bulk correction payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapFieldBatch {
    /// Corrections in submission order
    pub updates: Vec<GapFieldUpdate>,
}

impl GapFieldBatch {
    /// Wrap updates
    #[must_use]
    pub fn new(updates: Vec<GapFieldUpdate>) -> Self {
        Self { updates }
    }

    /// Project the batch onto a cached collection
    ///
    /// Every field named in the batch takes the corrected value and becomes
    /// verified. Fields not named are returned unchanged.
    #[must_use]
    pub fn apply_to(&self, fields: &[GapField]) -> Vec<GapField> {
        fields
            .iter()
            .map(|field| {
                match self.updates.iter().rev().find(|u| u.id == field.id) {
                    Some(update) => GapField {
                        corrected_value: Some(update.corrected_value.clone()),
                        status: GapStatus::Verified,
                        ..field.clone()
                    },
                    None => field.clone(),
                }
            })
            .collect()
    }
}

impl Validate for GapFieldBatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.updates.is_empty() {
            errors.add("updates", "must contain at least one field");
        }
        let mut seen = HashSet::new();
        for update in &self.updates {
            if !seen.insert(update.id) {
                errors.add("updates", format!("field {} appears more than once", update.id));
            }
        }
        errors.into_result()
    }
}

/// Completion summary derived from the gap-field collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapStats {
    /// Number of gap fields
    pub total: u64,
    /// Fields with nothing extracted
    pub missing: u64,
    /// Fields extracted with low confidence
    pub partial: u64,
    /// Fields confirmed by a reviewer
    pub verified: u64,
}

impl GapStats {
    /// Tally a collection
    #[must_use]
    pub fn from_fields(fields: &[GapField]) -> Self {
        fields.iter().fold(Self::default(), |mut acc, field| {
            acc.total += 1;
            match field.status {
                GapStatus::Missing => acc.missing += 1,
                GapStatus::Partial => acc.partial += 1,
                GapStatus::Verified => acc.verified += 1,
            }
            acc
        })
    }

    /// Whether every field has been verified
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing == 0 && self.partial == 0
    }
}
