//! HTTP client wrapper for the upstream API.

use std::fmt::Debug;
use std::str::FromStr;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ApiClientConfig;
use crate::error::{ApiClientError, ApiError};
use crate::session::SessionContext;

/// A client for the upstream API.
///
/// This is the single place outbound requests are built. It handles:
/// - HTTP client configuration with a fixed request timeout
/// - Bearer token authentication from the [SessionContext]
/// - Clearing the session when the upstream API answers `401`
///
/// Failed requests are never retried.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    session: SessionContext,
    config: ApiClientConfig,
}

impl Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new client from configuration and an explicit session.
    pub fn new(config: ApiClientConfig, session: SessionContext) -> Result<Self, ApiClientError> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = build_http_client(&config)?;

        Ok(Self {
            client,
            base_url,
            session,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Resolve a path (with or without leading `/`) against the base url.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ApiError::InvalidUrl(path.to_string()))
    }

    /// Resolve path segments against the base url, percent-encoding each one.
    pub fn url_from_segments<I, S>(&self, segments: I) -> Result<Url, ApiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.config.base_url.clone()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment.as_ref());
            }
        }
        Ok(url)
    }

    /// Send a request and return the successful response.
    ///
    /// * attaches `Authorization: Bearer <token>` if the session holds a token
    /// * `401` clears the session (see [SessionContext::expire]) and fails with [ApiError::Auth]
    /// * `404` fails with [ApiError::NotFound]
    #[instrument(skip_all, fields(method = %method, url = %url))]
    pub async fn request<B>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, timeout = e.is_timeout(), "request failed");
            ApiError::from_transport(e)
        })?;

        let status = response.status();
        debug!(%status, "received response");
        match status {
            StatusCode::UNAUTHORIZED => {
                if self.session.expire() {
                    warn!("session rejected by the API, login required");
                }
                Err(ApiError::Auth)
            },
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            status if status.is_success() => Ok(response),
            status => Err(ApiError::Status(status)),
        }
    }

    /// `GET` a path and decode the JSON body.
    pub async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        self.get_json_url(url, query).await
    }

    /// `GET` an already resolved url and decode the JSON body.
    pub async fn get_json_url<T>(&self, url: Url, query: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.request::<()>(Method::GET, url, query, None).await?;
        response.json::<T>().await.map_err(ApiError::Decode)
    }

    /// `POST` a JSON body to a path and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let response = self.request(Method::POST, url, &[], Some(body)).await?;
        response.json::<T>().await.map_err(ApiError::Decode)
    }
}

/// Parse the base url, making sure relative joins keep its path.
fn parse_base_url(base_url: &str) -> Result<Url, ApiClientError> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };
    Url::parse(&normalized).map_err(|err| ApiClientError::InvalidBaseUrl {
        url: base_url.to_string(),
        err,
    })
}

// ---------------------------------------------------------------------------
// HTTP client builder
// ---------------------------------------------------------------------------

/// Build the HTTP client shared by all requests.
///
/// The bearer token is not a default header since it changes over the
/// lifetime of the client, it is attached per request instead.
fn build_http_client(config: &ApiClientConfig) -> Result<reqwest::Client, ApiClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    for (key, value) in &config.extra_headers {
        headers.insert(
            HeaderName::from_str(key)
                .map_err(|_| ApiClientError::InvalidHeaderName(key.clone()))?,
            HeaderValue::from_str(value)
                .map_err(|_| ApiClientError::InvalidHeaderValue(key.clone()))?,
        );
    }

    debug!(
        base_url = %config.base_url,
        timeout = ?config.request_timeout,
        extra_headers = config.extra_headers.len(),
        "building API HTTP client"
    );

    let client_builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout);

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    client_builder.build().map_err(ApiClientError::Build)
}

#[cfg(test)]
pub mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use httpmock::MockServer;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::session::{Session, SessionEvent, SessionStore};

    pub fn client_config(url: &str) -> ApiClientConfig {
        ApiClientConfig {
            base_url: url.to_string(),
            ..Default::default()
        }
    }

    fn signed_in_session() -> SessionContext {
        let session = SessionContext::in_memory();
        session.set(Session {
            token: Some("secret-token".to_string()),
            user: None,
        });
        session
    }

    #[tokio::test]
    async fn bearer_token_attached_when_signed_in() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/users")
                .header("authorization", "Bearer secret-token");
            then.status(200).json_body(json!({ "users": [] }));
        });

        let client =
            ApiClient::new(client_config(&server.base_url()), signed_in_session()).unwrap();
        let _: Value = client.get_json("/users", &[]).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn no_authorization_header_without_token() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/users").matches(|req| {
                !req.headers
                    .iter()
                    .flatten()
                    .any(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            });
            then.status(200).json_body(json!({ "users": [] }));
        });

        let client =
            ApiClient::new(client_config(&server.base_url()), SessionContext::in_memory())
                .unwrap();
        let _: Value = client.get_json("users", &[]).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn extra_headers_set_on_all_requests() {
        let mut extra_headers: BTreeMap<String, String> = BTreeMap::new();
        extra_headers.insert("hsa-test".to_string(), "test-value".to_string());

        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.header("hsa-test", "test-value");
            then.status(200).json_body(json!({}));
        });

        let config = ApiClientConfig {
            extra_headers,
            ..client_config(&server.base_url())
        };
        let client = ApiClient::new(config, SessionContext::in_memory()).unwrap();
        let _: Value = client.get_json("/products", &[]).await.unwrap();
        let _: Value = client.get_json("/users", &[]).await.unwrap();
        mock.assert_hits(2);
    }

    #[tokio::test]
    async fn unauthorized_clears_session_once() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/users");
            then.status(401).json_body(json!({ "message": "Token Expired!" }));
        });

        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::in_dir(dir.path());
        let session = SessionContext::new(Some(store.clone()));
        session.set(Session {
            token: Some("expired".to_string()),
            user: None,
        });
        assert!(store.path().exists());

        let login_required = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&login_required);
        session.subscribe(move |event| {
            if *event == SessionEvent::LoginRequired {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let client = ApiClient::new(client_config(&server.base_url()), session.clone()).unwrap();
        let (first, second) = tokio::join!(
            client.get_json::<Value>("/users", &[]),
            client.get_json::<Value>("/users", &[]),
        );

        assert!(matches!(first, Err(ApiError::Auth)));
        assert!(matches!(second, Err(ApiError::Auth)));
        mock.assert_hits(2);
        assert_eq!(login_required.load(Ordering::SeqCst), 1);
        assert!(!session.is_signed_in());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn not_found_is_distinguished() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/users/9999");
            then.status(404).json_body(json!({ "message": "User with id '9999' not found" }));
        });

        let client =
            ApiClient::new(client_config(&server.base_url()), SessionContext::in_memory())
                .unwrap();
        let result = client.get_json::<Value>("/users/9999", &[]).await;
        assert!(matches!(result, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/products");
            then.status(503);
        });

        let client =
            ApiClient::new(client_config(&server.base_url()), SessionContext::in_memory())
                .unwrap();
        let result = client.get_json::<Value>("/products", &[]).await;
        assert!(matches!(
            result,
            Err(ApiError::Status(StatusCode::SERVICE_UNAVAILABLE))
        ));
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn timeout_is_a_network_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/users");
            then.status(200)
                .json_body(json!({ "users": [] }))
                .delay(Duration::from_millis(500));
        });

        let config = ApiClientConfig {
            request_timeout: Duration::from_millis(50),
            ..client_config(&server.base_url())
        };
        let client = ApiClient::new(config, SessionContext::in_memory()).unwrap();
        let result = client.get_json::<Value>("/users", &[]).await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }

    #[tokio::test]
    async fn query_parameters_are_encoded() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.path("/users/search")
                .query_param("q", "john smith")
                .query_param("limit", "10")
                .query_param("skip", "20");
            then.status(200).json_body(json!({ "users": [] }));
        });

        let client =
            ApiClient::new(client_config(&server.base_url()), SessionContext::in_memory())
                .unwrap();
        let _: Value = client
            .get_json("/users/search", &[
                ("q", "john smith".to_string()),
                ("limit", "10".to_string()),
                ("skip", "20".to_string()),
            ])
            .await
            .unwrap();
        mock.assert();
    }

    #[test]
    fn urls_keep_base_path() {
        let client = ApiClient::new(
            client_config("https://example.com/api"),
            SessionContext::in_memory(),
        )
        .unwrap();
        assert_eq!(
            client.url("/users/1").unwrap().as_str(),
            "https://example.com/api/users/1"
        );
        assert_eq!(
            client
                .url_from_segments(["products", "category", "home decoration"])
                .unwrap()
                .as_str(),
            "https://example.com/api/products/category/home%20decoration"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = ApiClient::new(client_config("not a url"), SessionContext::in_memory());
        assert!(matches!(result, Err(ApiClientError::InvalidBaseUrl { .. })));
    }
}
