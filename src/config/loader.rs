//! Configuration Loader
//!
//! Layers configuration sources with the `config` crate, lowest priority
//! first:
//!
//! 1. Built-in defaults ([`WorkerConfig::default`])
//! 2. Optional config file (`config/worker.{toml,yaml,json}`)
//! 3. Legacy variable names: `AZURE_STORAGE_CONNECTION_STRING` /
//!    `AzureWebJobsStorage`, `OUTPUT_CONTAINER`, `RULES_PATH`
//! 4. Prefixed variables: `VALIDATOR__OUTPUT_CONTAINER`,
//!    `VALIDATOR__QUEUE__CONCURRENCY`, ...

use super::error::{ConfigResult, ConfigurationError};
use super::WorkerConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

const ENV_PREFIX: &str = "VALIDATOR";
const DEFAULT_CONFIG_FILE: &str = "config/worker";

/// Builder-style loader for [`WorkerConfig`]
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit config file, which must then exist
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Read variables from `env` instead of the process environment
    pub fn with_env_map(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn load(&self) -> ConfigResult<WorkerConfig> {
        let file_source = match &self.config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigurationError::file_read_error(
                        path.display().to_string(),
                        "file does not exist",
                    ));
                }
                File::from(path.as_path()).required(true)
            }
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let prefixed = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(self.env.clone());

        let config: WorkerConfig = Config::builder()
            .add_source(file_source)
            .add_source(Environment::default().source(Some(self.legacy_variables())))
            .add_source(prefixed)
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(config = %config.sanitized(), "Worker configuration loaded");
        Ok(config)
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let value = match &self.env {
            Some(env) => env.get(key).cloned(),
            None => std::env::var(key).ok(),
        };
        value.filter(|v| !v.is_empty())
    }

    fn legacy_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        if let Some(conn) = self
            .lookup("AZURE_STORAGE_CONNECTION_STRING")
            .or_else(|| self.lookup("AzureWebJobsStorage"))
        {
            vars.insert("STORAGE_CONNECTION".to_string(), conn);
        }
        if let Some(container) = self.lookup("OUTPUT_CONTAINER") {
            vars.insert("OUTPUT_CONTAINER".to_string(), container);
        }
        if let Some(rules) = self.lookup("RULES_PATH") {
            vars.insert("RULES_PATH".to_string(), rules);
        }
        vars
    }
}
