//! Authentication payloads

use crate::validate::{Validate, ValidationErrors};
use serde::{Deserialize, Serialize};

/// Credentials for sign-in
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_email("email", &self.email);
        if self.password.is_empty() {
            errors.add("password", "is required");
        }
        errors.into_result()
    }
}

/// Bearer and refresh tokens issued by the identity service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived bearer token
    pub access_token: String,
    /// Token used to obtain a new access token
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Sign-in outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponse {
    /// Signed in
    Authenticated(TokenPair),
    /// A temporary password must be replaced before tokens are issued
    NewPasswordRequired { session: String },
}

/// Body of `POST /api/auth/refresh-token`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Current refresh token
    pub refresh_token: String,
}

impl std::fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRequest").finish_non_exhaustive()
    }
}

/// Reply to a refresh; the refresh token is only rotated when present
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// Replacement access token
    pub access_token: String,
    /// Rotated refresh token, when the server issued one
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("rotated", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Start of the password-reset flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    /// Account to send the code to
    pub email: String,
}

impl Validate for ForgotPasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_email("email", &self.email);
        errors.into_result()
    }
}

/// Completion of the password-reset flow with an emailed code
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// Account being reset
    pub email: String,
    /// Code from the reset email
    pub code: String,
    /// Replacement password
    pub new_password: String,
}

impl std::fmt::Debug for ResetPasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetPasswordRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_email("email", &self.email);
        errors.require_text("code", &self.code);
        errors.require_password("newPassword", &self.new_password);
        errors.into_result()
    }
}

/// Replacement of a temporary password after a `NewPasswordRequired` challenge
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePasswordChangeRequest {
    /// Account answering the challenge
    pub email: String,
    /// Challenge session from the login response
    pub session: String,
    /// Replacement for the temporary password
    pub new_password: String,
}

impl std::fmt::Debug for CompletePasswordChangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletePasswordChangeRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Validate for CompletePasswordChangeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_email("email", &self.email);
        errors.require_text("session", &self.session);
        errors.require_password("newPassword", &self.new_password);
        errors.into_result()
    }
}
