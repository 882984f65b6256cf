//! User administration records

use crate::ids::UserId;
use crate::validate::{Validate, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account as listed by the administration endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned id
    pub id: UserId,
    /// Sign-in email
    pub email: String,
    /// Name shown on comments
    pub display_name: String,
    /// Permission groups
    #[serde(default)]
    pub groups: Vec<String>,
    /// Whether the account can sign in
    pub enabled: bool,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Payload for inviting a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Sign-in email
    pub email: String,
    /// Name shown on comments
    pub display_name: String,
    /// Initial permission groups
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_email("email", &self.email);
        errors.require_text("displayName", &self.display_name);
        if self.groups.iter().any(|g| g.trim().is_empty()) {
            errors.add("groups", "group names must not be blank");
        }
        errors.into_result()
    }
}

/// Partial update of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Enable or disable sign-in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Validate for UserPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.display_name {
            errors.require_text("displayName", name);
        }
        errors.into_result()
    }
}

/// Group membership change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Group name
    pub group: String,
}

impl Validate for GroupMembership {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("group", &self.group);
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_checks_email_and_groups() {
        let user = NewUser {
            email: "nope".to_string(),
            display_name: "Sam".to_string(),
            groups: vec!["admins".to_string(), " ".to_string()],
        };
        let err = user.validate().unwrap_err();
        assert_eq!(err.field_names(), vec!["email", "groups"]);
    }

    #[test]
    fn patch_without_name_is_valid() {
        let patch = UserPatch {
            enabled: Some(false),
            ..UserPatch::default()
        };
        assert!(patch.validate().is_ok());
    }
}
