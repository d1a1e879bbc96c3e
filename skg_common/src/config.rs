//! Explicit, constructor-time configuration.
//!
//! Extractor credentials are process-wide environment state only at
//! startup; everything downstream receives them through a struct field, not
//! an implicit global lookup. This mirrors `svql_common::config`'s
//! builder-style config struct, scaled down to the one credential this
//! workspace's external collaborator needs.

use crate::error::ConfigError;

/// Credentials and tuning knobs for the external extractor collaborator,
/// read once at process startup.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// The API key for the extractor service. Never re-read from the
    /// environment after construction.
    pub api_key: String,
}

impl ExtractorConfig {
    /// Reads `var_name` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if the variable is unset or
    /// empty. Startup aborts rather than proceeding with a blank credential.
    pub fn from_env(var_name: &str) -> Result<Self, ConfigError> {
        let api_key = std::env::var(var_name).unwrap_or_default();
        if api_key.is_empty() {
            return Err(ConfigError::missing_env_var(var_name));
        }
        Ok(Self { api_key })
    }
}
