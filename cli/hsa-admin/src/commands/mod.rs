mod auth;
mod dashboard;
mod general;
mod products;
mod users;

use std::fmt;

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use hsa_api::{ApiClient, SessionContext};
use hsa_sdk::providers::directory::Client;
use indoc::indoc;

use crate::config::Config;
use crate::utils::init::{init_api_client, init_session};

static HSA_DESCRIPTION: &'_ str = indoc! {"
    Administer the users and products of a dummyjson.com style API.\n\n

    Sign in with 'hsa-admin auth login', then browse with 'hsa-admin users list'
    or 'hsa-admin products list'."
};

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, descr(HSA_DESCRIPTION), version)]
pub struct HsaCli(#[bpaf(external(hsa_args))] pub HsaArgs);

/// Main hsa-admin args parser
///
/// To parse the whole CLI, use [`HsaCli`] through [`hsa_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)]
pub struct HsaArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    #[bpaf(external(commands))]
    command: Commands,
}

/// Everything a command needs to talk to the upstream API.
#[derive(Debug)]
pub struct Admin {
    pub config: Config,
    pub session: SessionContext,
    pub api_client: ApiClient,
    /// The same client, behind the directory interface the resolvers use.
    pub directory: Client,
}

impl Admin {
    pub fn new(config: Config) -> Result<Self> {
        let session = init_session(&config);
        let api_client = init_api_client(&config, session.clone())?;
        Ok(Self {
            directory: Client::from(api_client.clone()),
            config,
            session,
            api_client,
        })
    }

    /// Fail unless a session is active, the upstream data is only browsed signed in.
    pub fn ensure_signed_in(&self) -> Result<()> {
        if !self.session.is_signed_in() {
            bail!("You are not signed in. Sign in with 'hsa-admin auth login'.");
        }
        Ok(())
    }
}

impl HsaArgs {
    pub async fn handle(self, config: Config) -> Result<()> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("Could not create data directory {:?}", config.data_dir))?;

        match self.command {
            // works without a usable client
            Commands::Config(args) => args.handle(config).await,
            Commands::Auth(args) => args.handle(Admin::new(config)?).await,
            Commands::Dashboard(args) => args.handle(Admin::new(config)?).await,
            Commands::Users(args) => args.handle(Admin::new(config)?).await,
            Commands::Products(args) => args.handle(Admin::new(config)?).await,
        }
    }
}

#[derive(Bpaf, Clone)]
enum Commands {
    /// Sign in, sign out or show the current session
    #[bpaf(command)]
    Auth(#[bpaf(external(auth::auth))] auth::Auth),

    /// Show how many users and products there are
    #[bpaf(command)]
    Dashboard(#[bpaf(external(dashboard::dashboard))] dashboard::Dashboard),

    /// Browse users
    #[bpaf(command)]
    Users(#[bpaf(external(users::users))] users::Users),

    /// Browse products and categories
    #[bpaf(command)]
    Products(#[bpaf(external(products::products))] products::Products),

    /// View and set configuration options
    #[bpaf(command)]
    Config(#[bpaf(external(general::config_args))] general::ConfigArgs),
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command")
    }
}

/// Options shared by the list commands
#[derive(Debug, Clone, Bpaf)]
pub struct ListOptions {
    /// Page to show, starting at 1
    #[bpaf(long, short, argument("n"), fallback(1))]
    pub page: u32,

    /// Print the page as JSON
    #[bpaf(long)]
    pub json: bool,
}

impl ListOptions {
    /// Zero based page index.
    pub fn page_index(&self) -> u32 {
        self.page.saturating_sub(1)
    }
}
