//! Shared HTTP client infrastructure for the upstream demo API.
//!
//! This crate provides:
//! - HTTP client construction with bearer token authentication
//! - The session context and its on-disk persistence
//! - Common error handling for API operations
//! - Wire types of the records served by the API
//!
//! ## Usage
//!
//! ```ignore
//! use hsa_api::{ApiClient, ApiClientConfig, SessionContext, SessionStore};
//!
//! let session = SessionContext::new(Some(SessionStore::in_dir(data_dir)));
//! session.load()?;
//!
//! let client = ApiClient::new(ApiClientConfig::default(), session)?;
//! let users: serde_json::Value = client.get_json("/users", &[]).await?;
//! ```

mod auth;
mod client;
mod config;
mod error;
mod session;
pub mod types;

pub use auth::{Credentials, LOGIN_PATH, LoginOutcome, LoginPolicy, LoginSource};
pub use client::ApiClient;
pub use config::{ApiClientConfig, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ApiClientError, ApiError};
pub use session::{
    ListenerId,
    SESSION_STORAGE_KEY,
    Session,
    SessionContext,
    SessionEvent,
    SessionListener,
    SessionStore,
    SessionStoreError,
    SessionUser,
};
