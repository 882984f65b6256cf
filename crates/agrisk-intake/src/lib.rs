//! Agrisk Intake - guided and manual questionnaire flows
//!
//! The questionnaire is a fixed [`Catalogue`] of categories. [`Wizard`]
//! walks it one category per step and saves on every advance;
//! [`ManualEntry`] shows every field at once and saves through a debounced
//! [`AutoSaver`]. Both share the same submission gate and the same
//! [`WizardState`] machine, and both finish by starting gap detection.

#![forbid(unsafe_code)]
#![warn(unreachable_pub)]

pub mod autosave;
pub mod backend;
pub mod catalogue;
pub mod error;
pub mod gate;
pub mod manual;
pub mod state;
pub mod wizard;

pub use autosave::{AutoSaver, DEFAULT_DEBOUNCE};
pub use backend::{IntakeBackend, Route};
pub use catalogue::{Catalogue, Category, FieldDef};
pub use error::{IntakeError, Result};
pub use gate::{mandatory_complete, missing_mandatory};
pub use manual::ManualEntry;
pub use state::{allowed_transitions, validate_transition, WizardPhase, WizardState};
pub use wizard::Wizard;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
