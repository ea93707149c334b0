use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::{Context, Result, bail};
use config::{Config as HierarchicalConfig, Environment};
use hsa_api::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use hsa_sdk::models::page::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use tempfile::PersistError;
use thiserror::Error;
use toml_edit::{DocumentMut, Item};
use tracing::{debug, trace};
use xdg::BaseDirectories;

/// Name of hsa-admin managed directories (config, data, cache)
pub const HSA_DIR_NAME: &str = "hsa-admin";
pub const HSA_CONFIG_DIR_VAR: &str = "HSA_CONFIG_DIR";
pub const HSA_CONFIG_FILE: &str = "hsa-admin.toml";
const HSA_ENV_PREFIX: &str = "HSA_";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Base URL of the upstream API
    pub base_url: String,

    /// Records per page for list commands
    pub page_size: u32,

    /// Seconds before an upstream request is abandoned
    pub request_timeout_secs: u64,

    /// Mint a local session if the upstream login fails.
    ///
    /// Such a session is not accepted by endpoints that check the token.
    #[serde(default)]
    pub allow_fallback_login: bool,

    /// `User-Agent` sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Directory where hsa-admin stores the session (default:
    /// `$XDG_DATA_HOME/hsa-admin`)
    pub data_dir: PathBuf,
    /// Directory where hsa-admin loads its configuration file from (default:
    /// `$XDG_CONFIG_HOME/hsa-admin`)
    pub config_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE.get(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            allow_fallback_login: false,
            user_agent: None,
            data_dir: PathBuf::new(),
            config_dir: PathBuf::new(),
        }
    }
}

/// Error returned when reading or writing single config values
#[derive(Debug, Error)]
pub enum ReadWriteError {
    #[error("Invalid config key: '{0}'")]
    InvalidKey(String),
    #[error("Config key '{0}' not in user configuration")]
    NotAUserValue(String),
    #[error("Invalid value for '{key}': {err}")]
    InvalidValue {
        key: String,
        #[source]
        err: toml_edit::de::Error,
    },
    #[error(transparent)]
    TomlEdit(#[from] toml_edit::TomlError),
    #[error(transparent)]
    TomlSer(#[from] toml_edit::ser::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Could not read config file: {0}")]
    ReadConfig(std::io::Error),
    #[error("Could not write config file: {0}")]
    WriteConfig(std::io::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Keys that may be set in a config file.
/// `config_dir` is derived from the environment only.
const USER_KEYS: &[&str] = &[
    "base_url",
    "page_size",
    "request_timeout_secs",
    "allow_fallback_login",
    "user_agent",
    "data_dir",
];

impl Config {
    fn read_raw_config() -> Result<HierarchicalConfig> {
        let hsa_dirs = BaseDirectories::with_prefix(HSA_DIR_NAME);

        let data_dir = hsa_dirs
            .get_data_home()
            .context("Could not determine data directory, is $HOME set?")?;

        let config_dir = match env::var(HSA_CONFIG_DIR_VAR) {
            Ok(v) => {
                debug!("`${HSA_CONFIG_DIR_VAR}` set: {v}");
                PathBuf::from(v)
            },
            Err(_) => {
                let config_dir = hsa_dirs
                    .get_config_home()
                    .context("Could not determine config directory, is $HOME set?")?;
                debug!("`${HSA_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
                config_dir
            },
        };

        let mut builder = HierarchicalConfig::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("page_size", i64::from(DEFAULT_PAGE_SIZE.get()))?
            .set_default(
                "request_timeout_secs",
                DEFAULT_REQUEST_TIMEOUT.as_secs() as i64,
            )?
            .set_default("allow_fallback_login", false)?
            .set_default("data_dir", data_dir.to_string_lossy().into_owned())?
            // the config file cannot change the config dir
            .set_override("config_dir", config_dir.to_string_lossy().into_owned())?;

        // read from /etc
        builder = builder.add_source(
            config::File::from(PathBuf::from("/etc").join(HSA_DIR_NAME).join(HSA_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // look for files in XDG_CONFIG_DIRS locations
        for file in hsa_dirs.find_config_files(HSA_CONFIG_FILE) {
            builder = builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
        }

        // explicit HSA_CONFIG_DIR file last
        builder = builder.add_source(
            config::File::from(config_dir.join(HSA_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // override via env variables
        let hsa_envs = env::vars()
            .filter_map(|(k, v)| k.strip_prefix(HSA_ENV_PREFIX).map(|k| (k.to_owned(), v)))
            .collect::<HashMap<_, _>>();

        let builder = builder.add_source(
            Environment::default()
                .source(Some(hsa_envs))
                .try_parsing(true),
        );

        Ok(builder.build()?)
    }

    /// Creates a [Config] from the environment and config files
    pub fn parse() -> Result<Config> {
        let raw_config = Self::read_raw_config()?;
        let config: Config = raw_config
            .try_deserialize()
            .context("Could not parse config")?;

        if config.page_size == 0 {
            bail!("'page_size' must be at least 1");
        }
        if config.request_timeout_secs == 0 {
            bail!("'request_timeout_secs' must be at least 1");
        }
        Ok(config)
    }

    pub fn page_size(&self) -> NonZeroU32 {
        NonZeroU32::new(self.page_size).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The config as TOML, **for human consumption only**
    pub fn to_toml(&self) -> Result<String, ReadWriteError> {
        Ok(toml_edit::ser::to_document(self)?.to_string())
    }

    /// Set or remove a key in the TOML text of a user config file.
    ///
    /// New values are validated against [Config] before they are written.
    pub fn write_to<V: Serialize>(
        config_file: Option<String>,
        key: &str,
        value: Option<V>,
    ) -> Result<String, ReadWriteError> {
        if !USER_KEYS.contains(&key) {
            return Err(ReadWriteError::InvalidKey(key.to_string()));
        }

        let mut document = match config_file {
            Some(content) => content.parse::<DocumentMut>()?,
            None => DocumentMut::new(),
        };

        match value {
            None => {
                document
                    .remove(key)
                    .ok_or_else(|| ReadWriteError::NotAUserValue(key.to_string()))?;
            },
            Some(value) => {
                let value = value.serialize(toml_edit::ser::ValueSerializer::new())?;

                trace!("try parsing the new virtual config (validation)");
                let mut validation_document = toml_edit::ser::to_document(&Config::default())?;
                validation_document.insert(key, Item::Value(value.clone()));
                toml_edit::de::from_document::<Config>(validation_document).map_err(|err| {
                    ReadWriteError::InvalidValue {
                        key: key.to_string(),
                        err,
                    }
                })?;

                document.insert(key, Item::Value(value));
            },
        }

        Ok(document.to_string())
    }

    /// Update a key of the config file at `config_file_path` in place.
    pub fn write_to_in<V: Serialize>(
        config_file_path: impl AsRef<Path>,
        key: &str,
        value: Option<V>,
    ) -> Result<(), ReadWriteError> {
        let config_file_path = config_file_path.as_ref();
        let config_file_contents = match fs::read_to_string(config_file_path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No existing user config file found in {:?}, creating it now",
                    config_file_path
                );
                Ok(None)
            },
            Err(e) => Err(e),
        }
        .map_err(ReadWriteError::ReadConfig)?;

        let config_file_contents = Self::write_to(config_file_contents, key, value)?;

        let parent = config_file_path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(ReadWriteError::WriteConfig)?;
        let tempfile = tempfile::Builder::new().tempfile_in(parent)?;
        fs::write(&tempfile, config_file_contents).map_err(ReadWriteError::WriteConfig)?;
        tempfile.persist(config_file_path)?;
        Ok(())
    }
}
