use std::env;

use dinegenus_collab::{CollabConfig, CollabError};
use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

const PORT_VAR: &str = "DINEGENUS_SERVER_PORT";
const RECOMMENDATIONS_URL_VAR: &str = "DINEGENUS_RECOMMENDATIONS_URL";
const MAX_CODE_ATTEMPTS_VAR: &str = "DINEGENUS_MAX_CODE_ATTEMPTS";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Base url of the recommendation service, if one is available
    pub recommendations_url: Option<String>,
    pub collab: CollabConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    InvalidVar {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("DINEGENUS_RECOMMENDATIONS_URL is not usable: {0}")]
    Recommendations(CollabError),
}

impl ServerConfig {
    /// Reads the configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Reads the configuration from a variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match var(PORT_VAR) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidVar {
                name: PORT_VAR,
                expected: "a port number",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let mut collab = CollabConfig::default();

        if let Some(value) = var(MAX_CODE_ATTEMPTS_VAR) {
            collab.max_code_attempts = value
                .parse()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ConfigError::InvalidVar {
                    name: MAX_CODE_ATTEMPTS_VAR,
                    expected: "a positive number",
                    value,
                })?;
        }

        let recommendations_url = var(RECOMMENDATIONS_URL_VAR).filter(|url| !url.trim().is_empty());

        Ok(Self {
            port,
            recommendations_url,
            collab,
        })
    }
}
