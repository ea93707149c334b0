//! Configuration types for API client construction.

use std::collections::BTreeMap;
use std::time::Duration;

/// Base URL of the public demo API.
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";

/// Requests that take longer than this fail with [crate::ApiError::Network].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for [crate::ApiClient] construction.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the upstream API.
    pub base_url: String,
    /// Timeout applied to every request.
    pub request_timeout: Duration,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Value of the `User-Agent` header, if any.
    pub user_agent: Option<String>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            extra_headers: BTreeMap::new(),
            user_agent: None,
        }
    }
}
