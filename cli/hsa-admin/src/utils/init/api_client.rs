use std::collections::BTreeMap;

use anyhow::{Context, Result};
use hsa_api::{ApiClient, ApiClientConfig, SessionContext, SessionEvent, SessionStore};
use tracing::{debug, warn};

use crate::config::Config;
use crate::utils::message;

/// Open the persisted session in the data directory.
///
/// A session file that can't be read is treated as no session.
pub fn init_session(config: &Config) -> SessionContext {
    let store = SessionStore::in_dir(&config.data_dir);
    debug!(path = ?store.path(), "using session store");
    let session = SessionContext::new(Some(store));

    match session.load() {
        Ok(true) => debug!("restored session"),
        Ok(false) => debug!("no session found"),
        Err(e) => warn!(error = %e, "could not restore session"),
    }

    session.subscribe(|event| {
        if *event == SessionEvent::LoginRequired {
            message::warning("Your session has expired. Sign in again with 'hsa-admin auth login'.");
        }
    });

    session
}

/// Initialize the upstream API client
pub fn init_api_client(config: &Config, session: SessionContext) -> Result<ApiClient> {
    let mut extra_headers: BTreeMap<String, String> = BTreeMap::new();

    // Pass in a bool if we are running in CI, so requests can reflect this in the headers
    if std::env::var("CI").is_ok() {
        extra_headers.insert("hsa-ci".to_string(), "true".to_string());
    }

    let api_config = ApiClientConfig {
        base_url: config.base_url.clone(),
        request_timeout: config.request_timeout(),
        extra_headers,
        user_agent: Some(
            config
                .user_agent
                .clone()
                .unwrap_or_else(|| format!("hsa-admin/{}", env!("CARGO_PKG_VERSION"))),
        ),
    };

    debug!("using api client with url: {}", api_config.base_url);
    ApiClient::new(api_config, session).context("Could not create API client")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::message::history::History;

    fn config_in(dir: &std::path::Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn expired_session_prints_hint_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let history = History::global();
        history.clear();

        let session = init_session(&config);
        session.set(hsa_api::Session {
            token: Some("token".to_string()),
            user: None,
        });
        assert!(session.expire());
        assert!(!session.expire());

        assert_eq!(history.messages().len(), 1);
        assert!(history.messages()[0].contains("hsa-admin auth login"));
        // cleared on disk as well
        assert!(!init_session(&config).is_signed_in());
    }

    #[test]
    fn client_uses_configured_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            base_url: "http://localhost:9000".to_string(),
            ..config_in(dir.path())
        };
        let client = init_api_client(&config, SessionContext::in_memory()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[test]
    fn invalid_base_url_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            base_url: "not a url".to_string(),
            ..config_in(dir.path())
        };
        assert!(init_api_client(&config, SessionContext::in_memory()).is_err());
    }
}
