//! Configuration loading via `ortho-config`.

use std::collections::BTreeMap;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Environment configuration derived from defaults, configuration files,
/// and `DRYDOCK_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "DRYDOCK")]
pub struct EnvironmentConfig {
    /// Container image running the object-storage emulator.
    #[ortho_config(default = "localstack/localstack:3.8".to_owned())]
    pub image: String,
    /// Port the emulator listens on inside the container.
    #[ortho_config(default = 4566)]
    pub service_port: u16,
    /// Access key handed to clients. The emulator accepts any value, so the
    /// default mirrors its documented test credentials.
    #[ortho_config(default = "test".to_owned())]
    pub access_key: String,
    /// Secret key handed to clients.
    #[ortho_config(default = "test".to_owned())]
    pub secret_key: String,
    /// Region identifier clients are configured with.
    #[ortho_config(default = "us-east-1".to_owned())]
    pub region: String,
    /// Container runtime binary used to start and remove the environment.
    #[ortho_config(default = "docker".to_owned())]
    pub docker_bin: String,
    /// Upper bound in seconds for the backend to report healthy after start.
    #[ortho_config(default = 120)]
    pub startup_timeout_secs: u64,
    /// Interval in milliseconds between readiness polls.
    #[ortho_config(default = 500)]
    pub poll_interval_ms: u64,
    /// Upper bound in seconds for a created bucket to be confirmed.
    #[ortho_config(default = 30)]
    pub confirm_timeout_secs: u64,
    /// Number of retries for transient store errors during teardown.
    #[ortho_config(default = 3)]
    pub sweep_retry_limit: u32,
    /// Base backoff in milliseconds between teardown retries.
    #[ortho_config(default = 200)]
    pub sweep_retry_backoff_ms: u64,
    /// Opaque `key=value` settings published to the system under test for
    /// the duration of the run (for example routing destination aliases).
    #[ortho_config(default = Vec::new())]
    pub route_overrides: Vec<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl EnvironmentConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to drydock.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags
    /// in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("drydock")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages
    /// include guidance on how to provide missing values via environment
    /// variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidTimeout`] when a timeout or interval is
    /// zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.image,
            &FieldMetadata::new("container image", "DRYDOCK_IMAGE", "image"),
        )?;
        Self::require_field(
            &self.region,
            &FieldMetadata::new("region identifier", "DRYDOCK_REGION", "region"),
        )?;
        Self::require_field(
            &self.docker_bin,
            &FieldMetadata::new(
                "container runtime binary",
                "DRYDOCK_DOCKER_BIN",
                "docker_bin",
            ),
        )?;
        if self.startup_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: String::from("startup_timeout_secs"),
            });
        }
        if self.confirm_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: String::from("confirm_timeout_secs"),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: String::from("poll_interval_ms"),
            });
        }
        Ok(())
    }

    /// Parses the `route_overrides` entries into the mapping published to
    /// the system under test. Entries are split on the first `=`; an entry
    /// with no `=` becomes a key with an empty value. The values are opaque
    /// to the core and are not validated.
    #[must_use]
    pub fn override_map(&self) -> BTreeMap<String, String> {
        self.route_overrides
            .iter()
            .map(|entry| {
                entry.split_once('=').map_or_else(
                    || (entry.clone(), String::new()),
                    |(key, value)| (key.to_owned(), value.to_owned()),
                )
            })
            .collect()
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a timeout or interval was configured as zero.
    #[error("{field} must be greater than zero")]
    InvalidTimeout {
        /// Name of the offending field.
        field: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
