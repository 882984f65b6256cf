//! Error types for the query cache

/// Errors raised by cache operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// No fetcher has been registered for the key, so it cannot be refetched
    #[error("no fetcher registered for {key}")]
    NoFetcher { key: String },

    /// The registered fetcher failed
    #[error("fetch failed for {key}: {message}")]
    Fetch { key: String, message: String },

    /// The cached value is not of the requested type
    #[error("type mismatch for {key}: expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Outcome of a failed mutation
///
/// When this is returned the cache has already been restored to the value
/// it held before the mutation started.
#[derive(Debug, thiserror::Error)]
pub enum MutationError<E> {
    /// Another mutation for the same key has not settled yet
    #[error("a mutation is already in flight for {key}")]
    InFlight { key: String },

    /// The remote call failed
    #[error("mutation failed: {0}")]
    Failed(E),
}

impl<E> MutationError<E> {
    /// Whether the mutation was refused without being sent
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight { .. })
    }

    /// The remote failure, if the call was sent
    #[must_use]
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::InFlight { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_error_display() {
        let err = CacheError::NoFetcher {
            key: "Comments(3)".to_string(),
        };
        assert_eq!(err.to_string(), "no fetcher registered for Comments(3)");
    }

    #[test]
    fn mutation_error_helpers() {
        let busy: MutationError<String> = MutationError::InFlight {
            key: "GapFields(1)".to_string(),
        };
        assert!(busy.is_in_flight());
        assert!(busy.into_failure().is_none());

        let failed = MutationError::Failed("offline".to_string());
        assert_eq!(failed.to_string(), "mutation failed: offline");
        assert_eq!(failed.into_failure().as_deref(), Some("offline"));
    }
}
