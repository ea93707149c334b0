use std::io;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, instrument};

use crate::config::{Config, HSA_CONFIG_FILE, ReadWriteError};
use crate::utils::message;

#[derive(Bpaf, Clone)]
#[bpaf(fallback(ConfigArgs::List))]
pub enum ConfigArgs {
    /// List the current values of all options
    #[bpaf(short, long)]
    List,
    /// Reset all options to their default values without further confirmation
    #[bpaf(short, long)]
    Reset,
    /// Set a config value
    Set(#[bpaf(external(config_set))] ConfigSet),
    /// Delete a config value
    Delete(#[bpaf(external(config_delete))] ConfigDelete),
}

#[derive(Debug, Clone, Bpaf)]
#[bpaf(adjacent)]
pub struct ConfigSet {
    /// set <key> to <value>
    #[allow(unused)]
    set: (),
    /// Configuration key
    #[bpaf(positional("key"))]
    key: String,
    /// Configuration value, parsed as JSON if possible
    #[bpaf(positional("value"))]
    value: String,
}

#[derive(Debug, Clone, Bpaf)]
pub struct ConfigDelete {
    /// Delete config key
    #[bpaf(long("delete"), argument("key"))]
    key: String,
}

impl ConfigArgs {
    /// handle config flags like commands
    #[instrument(name = "config", skip_all)]
    pub async fn handle(self, config: Config) -> Result<()> {
        match self {
            ConfigArgs::List => print!("{}", config.to_toml()?),
            ConfigArgs::Reset => {
                match fs::remove_file(&config.config_dir.join(HSA_CONFIG_FILE)).await {
                    Err(err) if err.kind() != io::ErrorKind::NotFound => {
                        Err(err).context("Could not reset config file")?
                    },
                    _ => (),
                }
                message::updated("Configuration reset");
            },
            ConfigArgs::Set(ConfigSet { key, value, .. }) => {
                let parsed_value = parse_value(&value);
                update_config(&config.config_dir, &key, Some(parsed_value))?;
                message::updated(format!("'{key}' set to {value}"));
            },
            ConfigArgs::Delete(ConfigDelete { key }) => {
                update_config::<()>(&config.config_dir, &key, None)?;
                message::updated(format!("'{key}' removed"));
            },
        }
        Ok(())
    }
}

/// JSON if it parses, an unquoted string otherwise
fn parse_value(value: &str) -> Value {
    match Value::from_str(value) {
        Ok(parsed) => {
            debug!(supplied = value, ?parsed, "parsed config value");
            parsed
        },
        Err(error) => {
            debug!(
                supplied = value,
                ?error,
                "failed to parse as JSON value, treating as unquoted string"
            );
            Value::String(value.to_string())
        },
    }
}

/// wrapper around [Config::write_to_in]
pub(super) fn update_config<V: Serialize>(
    config_dir: &Path,
    key: &str,
    value: Option<V>,
) -> Result<()> {
    let config_file_path = config_dir.join(HSA_CONFIG_FILE);

    match Config::write_to_in(config_file_path, key, value) {
        err @ Err(ReadWriteError::ReadConfig(_)) => err.context(
            "Could not read current config file.\nPlease verify the format or reset using `hsa-admin config --reset`",
        )?,
        err @ Err(_) => err?,
        Ok(()) => (),
    }
    Ok(())
}
