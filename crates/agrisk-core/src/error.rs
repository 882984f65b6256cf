//! Error types for the data layer

use agrisk_cache::{CacheError, MutationError};
use agrisk_client::ApiError;
use agrisk_intake::IntakeError;
use agrisk_model::ValidationErrors;

/// Errors surfaced by [`crate::DataLayer`]
///
/// A mutation that fails with any variant other than [`CoreError::InFlight`]
/// has already been rolled back.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// Payload rejected before the cache or network was touched
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A mutation of the same resource has not settled yet
    #[error("{key} is already being saved")]
    InFlight { key: String },

    /// The API call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Cached value could not be read as the requested type
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An intake flow refused the operation or its backend failed
    #[error(transparent)]
    Intake(#[from] IntakeError),
}

impl CoreError {
    /// Per-field messages, whether raised locally or by the client
    #[must_use]
    pub fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) | Self::Api(ApiError::Validation(errors)) => Some(errors),
            _ => None,
        }
    }

    /// Whether the user must sign in again
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_auth())
    }
}

impl From<MutationError<ApiError>> for CoreError {
    fn from(err: MutationError<ApiError>) -> Self {
        match err {
            MutationError::InFlight { key } => Self::InFlight { key },
            MutationError::Failed(e) => Self::Api(e),
        }
    }
}

/// Result type alias for data-layer operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_found_through_the_client_error() {
        let mut errors = ValidationErrors::new();
        errors.add("body", "must not be empty");
        let err = CoreError::from(ApiError::Validation(errors.clone()));
        assert_eq!(err.validation(), Some(&errors));
        assert!(CoreError::from(ApiError::Network("down".into()))
            .validation()
            .is_none());
    }

    #[test]
    fn mutation_errors_unwrap() {
        let busy = CoreError::from(MutationError::<ApiError>::InFlight {
            key: "GapFields(AssessmentId(1))".to_string(),
        });
        assert!(matches!(busy, CoreError::InFlight { .. }));

        let expired = CoreError::from(MutationError::Failed(ApiError::SessionExpired));
        assert!(expired.is_auth());
    }
}
