//! # Worker Configuration
//!
//! Explicit configuration handed to the job orchestrator at construction time.
//! Nothing in the pipeline reads process environment directly; the
//! [`ConfigLoader`] is the only place that does, and it can be given an
//! injected environment map instead.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use validator_worker::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! println!("publishing to container {}", config.output_container);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

use crate::constants::{
    DEFAULT_MAX_DELIVERY_COUNT, DEFAULT_OUTPUT_CONTAINER, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_PROFILE, DEFAULT_RULES_PATH,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root worker configuration
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Storage backend connection string. Treated as a secret.
    pub storage_connection: String,

    /// Container receiving `{run_id}/{artifact}` objects
    pub output_container: String,

    /// Validation rule configuration file
    pub rules_path: PathBuf,

    /// Profile applied when a message omits one
    pub default_profile: String,

    /// Parent directory for job workspaces; the system temp dir when unset
    pub workspace_root: Option<PathBuf>,

    /// Queue consumption settings
    pub queue: QueueConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            storage_connection: String::new(),
            output_container: DEFAULT_OUTPUT_CONTAINER.to_string(),
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
            default_profile: DEFAULT_PROFILE.to_string(),
            workspace_root: None,
            queue: QueueConfig::default(),
        }
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("storage_connection", &redact(&self.storage_connection))
            .field("output_container", &self.output_container)
            .field("rules_path", &self.rules_path)
            .field("default_profile", &self.default_profile)
            .field("workspace_root", &self.workspace_root)
            .field("queue", &self.queue)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "[REDACTED]"
    }
}

impl WorkerConfig {
    /// Validate field values after all sources are merged
    pub fn validate(&self) -> ConfigResult<()> {
        validate_container_name("output_container", &self.output_container)?;

        if self.rules_path.as_os_str().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "rules_path",
                "worker configuration",
            ));
        }

        if self.default_profile.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "default_profile",
                "worker configuration",
            ));
        }

        self.queue.validate()
    }

    /// Sanitized view for logging
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "storage_connection".to_string(),
                serde_json::Value::String(redact(&self.storage_connection).to_string()),
            );
        }
        value
    }
}

/// Queue consumption configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Spool directory for the directory-backed queue
    pub directory: PathBuf,

    /// Deliveries after which a transiently failing message is dead-lettered
    pub max_delivery_count: u32,

    /// Sleep between polls of an empty queue
    pub poll_interval_ms: u64,

    /// Independent job slots per worker process
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("queue"),
            max_delivery_count: DEFAULT_MAX_DELIVERY_COUNT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            concurrency: 1,
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_delivery_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.max_delivery_count",
                "0",
                "must allow at least one delivery",
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.concurrency",
                "0",
                "at least one job slot is required",
            ));
        }
        Ok(())
    }
}

/// Container names: 3-63 characters of lowercase letters, digits and
/// single hyphens, starting and ending with a letter or digit.
pub fn validate_container_name(field: &str, name: &str) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigurationError::invalid_value(field, name, reason);

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("container names must be 3-63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "container names may only contain lowercase letters, digits and hyphens",
        ));
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        return Err(invalid(
            "container names must start and end with a letter or digit and not repeat hyphens",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        assert_eq!(config.output_container, "outputs");
        assert_eq!(config.rules_path, PathBuf::from("config/rules.yml"));
        assert_eq!(config.default_profile, "A1");
        assert_eq!(config.queue.max_delivery_count, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_container_name_rules() {
        assert!(validate_container_name("c", "outputs").is_ok());
        assert!(validate_container_name("c", "run-results-2").is_ok());
        assert!(validate_container_name("c", "ab").is_err());
        assert!(validate_container_name("c", "Outputs").is_err());
        assert!(validate_container_name("c", "-outputs").is_err());
        assert!(validate_container_name("c", "out--puts").is_err());
        assert!(validate_container_name("c", "out_puts").is_err());
    }

    #[test]
    fn test_queue_validation() {
        let mut config = WorkerConfig::default();
        config.queue.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.queue.max_delivery_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = WorkerConfig {
            storage_connection: "AccountKey=supersecret".to_string(),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("[REDACTED]"));

        let sanitized = config.sanitized().to_string();
        assert!(!sanitized.contains("supersecret"));
    }
}
