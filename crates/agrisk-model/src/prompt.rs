//! Prompt templates administered for the AI pipeline stages

use crate::comment::{CommentId, CurrentUser};
use crate::ids::{PromptId, UserId};
use crate::validate::{Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage a prompt drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStage {
    /// Reads uploaded documents into fields
    Extraction,
    /// Finds missing or weak fields
    GapDetection,
    /// Scores each risk category
    Scoring,
    /// Writes the report narrative
    Report,
}

/// Prompt template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Server-assigned id
    pub id: PromptId,
    /// Display name
    pub name: String,
    /// Pipeline stage that runs this prompt
    pub stage: PromptStage,
    /// Template text sent to the model
    pub template: String,
    /// Incremented on every saved edit
    pub version: u32,
    /// Whether the stage uses this prompt
    pub active: bool,
    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or replacing a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptInput {
    /// Display name
    pub name: String,
    /// Pipeline stage that runs this prompt
    pub stage: PromptStage,
    /// Template text sent to the model
    pub template: String,
    /// Whether the stage uses this prompt
    #[serde(default)]
    pub active: bool,
}

impl Validate for PromptInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("name", &self.name);
        errors.require_text("template", &self.template);
        errors.into_result()
    }
}

/// Bulk import of prompt definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptImport {
    /// Prompts to create or update by name
    pub prompts: Vec<PromptInput>,
}

impl Validate for PromptImport {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.prompts.is_empty() {
            errors.add("prompts", "must contain at least one prompt");
        }
        for (idx, prompt) in self.prompts.iter().enumerate() {
            if let Err(inner) = prompt.validate() {
                for name in inner.field_names() {
                    for message in inner.field(name) {
                        errors.add(format!("prompts[{idx}].{name}"), message.clone());
                    }
                }
            }
        }
        errors.into_result()
    }
}

/// Result of a bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptImportSummary {
    /// Prompts added
    pub created: u32,
    /// Prompts given a new version
    pub updated: u32,
}

/// Reviewer note on a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptComment {
    /// Server id, or a local id until confirmed
    pub id: CommentId,
    /// Prompt the note is on
    pub prompt_id: PromptId,
    /// Author's user id
    pub author_id: UserId,
    /// Author's display name at posting time
    pub author_name: String,
    /// Note text
    pub body: String,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl PromptComment {
    /// Local stand-in for a note that has been posted but not confirmed
    #[must_use]
    pub fn pending(
        prompt_id: PromptId,
        author: &CurrentUser,
        body: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CommentId::local(),
            prompt_id,
            author_id: author.id,
            author_name: author.display_name.clone(),
            body: body.into(),
            created_at: now,
        }
    }
}

/// Earlier version of a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRevision {
    /// Prompt this revision belongs to
    pub prompt_id: PromptId,
    /// Version number of this revision
    pub version: u32,
    /// Template text at this version
    pub template: String,
    /// Who saved the revision
    pub changed_by: UserId,
    /// When the revision was saved
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, template: &str) -> PromptInput {
        PromptInput {
            name: name.to_string(),
            stage: PromptStage::GapDetection,
            template: template.to_string(),
            active: true,
        }
    }

    #[test]
    fn import_reports_nested_fields() {
        let import = PromptImport {
            prompts: vec![input("ok", "{{plan}}"), input("", "{{plan}}")],
        };
        let err = import.validate().unwrap_err();
        assert_eq!(err.field_names(), vec!["prompts[1].name"]);
    }

    #[test]
    fn empty_import_rejected() {
        let err = PromptImport { prompts: vec![] }.validate().unwrap_err();
        assert_eq!(err.field_names(), vec!["prompts"]);
    }
}
