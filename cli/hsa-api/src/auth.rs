//! Credential login against the upstream API.
//!
//! The token issuing service is opaque to us: credentials go in,
//! a bearer token with a few profile fields (or nothing) comes out.

use tracing::{debug, error, instrument, warn};

use crate::client::ApiClient;
use crate::session::{Session, SessionUser};
use crate::types::{LoginRequest, LoginResponse};

pub const LOGIN_PATH: &str = "/auth/login";

const FALLBACK_TOKEN_PREFIX: &str = "local-fallback-token-";
const FALLBACK_USER_ID: u64 = 9999;

/// Username and password as typed by the user.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Where a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginSource {
    Upstream,
    /// A locally minted session, see [LoginPolicy::allow_fallback].
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub source: LoginSource,
    pub session: Session,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoginPolicy {
    /// Mint a local session when the upstream login fails.
    ///
    /// The resulting token is not accepted by the upstream API,
    /// so only endpoints that don't check it keep working.
    pub allow_fallback: bool,
}

impl ApiClient {
    /// Exchange credentials for a session.
    ///
    /// Returns `None` if the credentials are incomplete or the upstream
    /// service did not issue a token and the policy does not allow a fallback.
    /// The session context is not modified, see [crate::SessionContext::set].
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn login(
        &self,
        credentials: &Credentials,
        policy: LoginPolicy,
    ) -> Option<LoginOutcome> {
        if credentials.username.is_empty() || credentials.password.is_empty() {
            debug!("username and password are required");
            return None;
        }

        let request = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
        };

        match self.post_json::<_, LoginResponse>(LOGIN_PATH, &request).await {
            Ok(response) => {
                if let Some(session) = session_from_response(response) {
                    debug!("login successful");
                    return Some(LoginOutcome {
                        source: LoginSource::Upstream,
                        session,
                    });
                }
                warn!("login response did not contain a token");
            },
            Err(e) => {
                error!(error = %e, "login failed");
            },
        }

        if !policy.allow_fallback {
            return None;
        }

        warn!("using local fallback session");
        Some(LoginOutcome {
            source: LoginSource::Fallback,
            session: fallback_session(&credentials.username),
        })
    }
}

fn session_from_response(response: LoginResponse) -> Option<Session> {
    let token = response.bearer_token()?.to_string();
    let user = response.id.map(|id| SessionUser {
        id,
        username: response.username,
        email: response.email,
        first_name: response.first_name,
        last_name: response.last_name,
    });
    Some(Session {
        token: Some(token),
        user,
    })
}

fn fallback_session(username: &str) -> Session {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Session {
        token: Some(format!("{FALLBACK_TOKEN_PREFIX}{}", &suffix[..8])),
        user: Some(SessionUser {
            id: FALLBACK_USER_ID,
            username: Some(username.to_string()),
            email: Some(format!("{username}@local")),
            first_name: Some("Fallback".to_string()),
            last_name: Some("User".to_string()),
        }),
    }
}
