//! Agrisk Client - REST transport for the risk-assessment API
//!
//! This crate provides:
//! - [`ApiClient`]: bearer-token JSON client with serialized single-retry refresh
//! - [`RiskApi`]: every endpoint the data layer consumes
//! - [`TokenStore`]: durable vs. session token persistence
//! - [`ClientConfig`]: TOML configuration with environment overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use agrisk_client::{ApiClient, ClientConfig, RiskApi, TokenStore};
//!
//! # async fn run() -> agrisk_client::Result<()> {
//! let config = ClientConfig::default().with_base_url("https://risk.example.org");
//! let client = ApiClient::new(&config, TokenStore::persistent(config.token_path()))?;
//! for assessment in client.list_assessments().await? {
//!     println!("{} {}", assessment.id, assessment.business_name);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod store;

pub use api::RiskApi;
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use http::ApiClient;
pub use session::{LogOnlyListener, SessionListener};
pub use store::{FileStore, KeyValueStore, MemoryStore, TokenStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
