//! Typed identifiers for server-side records
//!
//! Every id the API hands out is a positive integer. Wrapping them keeps an
//! assessment id from being passed where a gap-field id is expected.

use serde::{Deserialize, Serialize};

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value
            #[inline]
            #[must_use]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

server_id!(
    /// Assessment identifier
    AssessmentId
);
server_id!(
    /// Gap field identifier
    GapFieldId
);
server_id!(
    /// Risk score identifier
    RiskScoreId
);
server_id!(
    /// Prompt identifier
    PromptId
);
server_id!(
    /// User identifier
    UserId
);
server_id!(
    /// Uploaded document identifier
    DocumentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&GapFieldId(42)).unwrap();
        assert_eq!(json, "42");

        let back: AssessmentId = serde_json::from_str("7").unwrap();
        assert_eq!(back, AssessmentId(7));
    }

    #[test]
    fn ids_display_raw_value() {
        assert_eq!(UserId(12).to_string(), "12");
        assert_eq!(PromptId::from(3).get(), 3);
    }
}
