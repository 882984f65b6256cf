//! Agrisk Core - data layer for the risk-assessment client
//!
//! [`DataLayer`] binds a [`agrisk_client::RiskApi`] to a query cache keyed by
//! [`QueryKey`]. Reads are cached and refetched on invalidation; the writes
//! in [`MutationKind`]'s table show a local projection until the server
//! answers and roll back on failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use agrisk_core::DataLayer;
//! use agrisk_model::{AssessmentId, GapFieldBatch, GapFieldUpdate};
//!
//! # async fn example(data: DataLayer) -> agrisk_core::Result<()> {
//! let id = AssessmentId(42);
//! let _fields = data.observe(agrisk_core::QueryKey::GapFields(id));
//! data.gap_fields(id).await?;
//! data.update_gap_fields(id, GapFieldBatch::new(vec![GapFieldUpdate::new(7u64, "120000")]))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod data;
pub mod error;
pub mod intake;
pub mod keys;
pub mod mutations;

pub use data::DataLayer;
pub use error::{CoreError, Result};
pub use intake::ApiIntakeBackend;
pub use keys::QueryKey;
pub use mutations::MutationKind;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
