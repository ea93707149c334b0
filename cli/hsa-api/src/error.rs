//! Error handling for upstream API operations.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single upstream request.
///
/// Callers that resolve lists swallow these into an empty page,
/// single record lookups turn them into `None`.
/// Only [ApiError::Auth] has a side effect beyond the call itself:
/// the session is cleared and listeners are told to return to login.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not reach the API")]
    Network(#[source] reqwest::Error),
    #[error("not authorized, please log in again")]
    Auth,
    #[error("record not found")]
    NotFound,
    #[error("unexpected response status: {0}")]
    Status(StatusCode),
    #[error("could not decode API response")]
    Decode(#[source] reqwest::Error),
    #[error("invalid request path '{0}'")]
    InvalidUrl(String),
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Classify a transport error produced by reqwest.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err)
        } else {
            ApiError::Network(err)
        }
    }
}

/// Errors constructing an [crate::ApiClient].
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("invalid base url '{url}'")]
    InvalidBaseUrl {
        url: String,
        #[source]
        err: url::ParseError,
    },
    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),
    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String),
    #[error("could not build HTTP client")]
    Build(#[source] reqwest::Error),
}
