use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use hsa_api::{Credentials, LoginPolicy, LoginSource, Session};
use tracing::{debug, instrument};

use super::Admin;
use crate::utils::dialog::{Dialog, Password, Text};
use crate::utils::message;

#[derive(Clone, Debug, Bpaf)]
pub struct Login {
    /// Username to sign in with
    #[bpaf(long, short, argument("name"))]
    username: Option<String>,

    /// Password to sign in with, prompted for if omitted
    #[bpaf(long, argument("password"))]
    password: Option<String>,
}

// Session commands
#[derive(Clone, Debug, Bpaf)]
pub enum Auth {
    /// Sign in to the upstream API
    #[bpaf(command)]
    Login(#[bpaf(external(login))] Login),

    /// Sign out and forget the session
    #[bpaf(command)]
    Logout,

    /// Print the current session
    #[bpaf(command)]
    Status,
}

impl Auth {
    #[instrument(name = "auth", skip_all)]
    pub async fn handle(self, admin: Admin) -> Result<()> {
        match self {
            Auth::Login(args) => {
                let credentials = args.credentials().await?;
                let session = sign_in(&admin, &credentials).await?;
                message::updated(format!("Signed in as {}", describe(&session)));
                Ok(())
            },
            Auth::Logout => {
                if !admin.session.logout() {
                    message::warning("You are not signed in");
                    return Ok(());
                }
                message::deleted("Signed out");
                Ok(())
            },
            Auth::Status => {
                let session = admin.session.snapshot();
                if !session.is_signed_in() {
                    message::warning("You are not signed in. Sign in with 'hsa-admin auth login'.");
                    return Ok(());
                }
                message::plain(format!(
                    "You are signed in as {} on {}",
                    describe(&session),
                    admin.api_client.base_url()
                ));
                Ok(())
            },
        }
    }
}

impl Login {
    /// Credentials from the arguments, prompting for whatever is missing.
    async fn credentials(self) -> Result<Credentials> {
        let username = match self.username {
            Some(username) => username,
            None if Dialog::can_prompt() => Dialog {
                message: "Username:",
                help_message: None,
                typed: Text { default: None },
            }
            .prompt()
            .await
            .context("Could not read username")?,
            None => bail!("No username given and cannot prompt for one, use '--username'"),
        };

        let password = match self.password {
            Some(password) => password,
            None if Dialog::can_prompt() => Dialog {
                message: "Password:",
                help_message: None,
                typed: Password,
            }
            .prompt()
            .await
            .context("Could not read password")?,
            None => bail!("No password given and cannot prompt for one, use '--password'"),
        };

        Ok(Credentials { username, password })
    }
}

/// Exchange credentials for a session and make it the current one.
pub async fn sign_in(admin: &Admin, credentials: &Credentials) -> Result<Session> {
    let policy = LoginPolicy {
        allow_fallback: admin.config.allow_fallback_login,
    };

    let Some(outcome) = admin.api_client.login(credentials, policy).await else {
        bail!("Sign in failed, check your username and password");
    };

    if outcome.source == LoginSource::Fallback {
        message::warning(
            "The upstream API did not accept the credentials, using a local session instead.\nRequests that require authentication will fail.",
        );
    }

    debug!(source = ?outcome.source, "storing session");
    admin.session.set(outcome.session.clone());
    Ok(outcome.session)
}

fn describe(session: &Session) -> String {
    match &session.user {
        Some(user) => user.display_name(),
        None => "an unknown user".to_string(),
    }
}
