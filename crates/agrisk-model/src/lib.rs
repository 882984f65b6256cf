//! Agrisk domain model
//!
//! Records exchanged with the risk-assessment API and the request payloads
//! sent to it. Every payload implements [`Validate`] so that malformed input
//! is rejected before a network call is made.
//!
//! # Example
//!
//! ```rust
//! use agrisk_model::{GapFieldBatch, GapFieldUpdate, Validate};
//!
//! let batch = GapFieldBatch::new(vec![GapFieldUpdate::new(42u64, "120000")]);
//! assert!(batch.validate().is_ok());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod assessment;
pub mod auth;
pub mod comment;
pub mod gap;
pub mod ids;
pub mod prompt;
pub mod report;
pub mod risk;
pub mod user;
pub mod validate;

pub use assessment::{
    Assessment, AssessmentPatch, AssessmentStats, AssessmentStatus, IntakeAnswers, IntakeMethod,
    NewAssessment, UploadUrl, UploadUrlRequest,
};
pub use auth::{
    CompletePasswordChangeRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
    RefreshRequest, RefreshResponse, ResetPasswordRequest, TokenPair,
};
pub use comment::{Comment, CommentId, CurrentUser, NewComment};
pub use gap::{GapField, GapFieldBatch, GapFieldUpdate, GapStats, GapStatus};
pub use ids::{AssessmentId, DocumentId, GapFieldId, PromptId, RiskScoreId, UserId};
pub use prompt::{
    Prompt, PromptComment, PromptImport, PromptImportSummary, PromptInput, PromptRevision,
    PromptStage,
};
pub use report::{PdfJob, PdfJobStatus, Report, ReportSection};
pub use risk::{RecommendationEdit, RiskCategory, RiskLevel, RiskScore};
pub use user::{GroupMembership, NewUser, User, UserPatch};
pub use validate::{Validate, ValidationErrors};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
