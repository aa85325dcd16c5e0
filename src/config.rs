//! Service Configuration
//!
//! TigerStyle: Env file plus process environment, read once at startup.
//!
//! Values already present in the process environment win over the env file,
//! matching how `dotenvy` treats existing variables.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use userstore_core::{StorageConfig, StorageError};

use crate::BIND_ADDRESS_DEFAULT;

/// Errors raised while assembling the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The env file exists but could not be read or parsed.
    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        /// File that failed
        path: String,
        /// Parser error
        #[source]
        source: dotenvy::Error,
    },

    /// `PORT` is not a port, `:port`, or `host:port`.
    #[error("PORT=`{0}` is not a valid port or address")]
    InvalidPort(String),

    /// The storage section is invalid.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything the binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Address the RPC listener binds to
    pub bind_addr: String,
    /// Backend selection and parameters
    pub storage: StorageConfig,
}

impl ServiceConfig {
    /// Load `path` (if present) layered under the process environment.
    ///
    /// A missing file is not an error; the process environment alone is used.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is unreadable or any value is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file_vars = read_env_file(path)?;
        Self::from_sources(&file_vars, |key| std::env::var(key).ok())
    }

    /// Build from env-file pairs and an environment lookup.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if any value is invalid.
    pub fn from_sources<F>(
        file_vars: &HashMap<String, String>,
        env_lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env_lookup(key).or_else(|| file_vars.get(key).cloned());

        let bind_addr = match lookup("PORT").filter(|p| !p.trim().is_empty()) {
            Some(port) => bind_addr_from_port(&port)?,
            None => BIND_ADDRESS_DEFAULT.to_string(),
        };
        let storage = StorageConfig::from_lookup(lookup)?;

        Ok(Self { bind_addr, storage })
    }
}

/// Read `KEY=value` pairs from an env file without touching the process
/// environment.
fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let to_error = |source| ConfigError::EnvFile {
        path: path.display().to_string(),
        source,
    };

    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            tracing::warn!(path = %path.display(), "env file not found, using process environment");
            return Ok(HashMap::new());
        }
        Err(e) => return Err(to_error(e)),
    };

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(to_error)?;
        vars.insert(key, value);
    }
    tracing::info!(path = %path.display(), keys = vars.len(), "loaded env file");
    Ok(vars)
}

/// Accept `8080`, `:8080`, or `host:8080`.
fn bind_addr_from_port(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let invalid = || ConfigError::InvalidPort(raw.to_string());

    let (host, port) = match raw.rsplit_once(':') {
        Some(("", port)) => ("0.0.0.0", port),
        Some((host, port)) => (host, port),
        None => ("0.0.0.0", raw),
    };
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if host.is_empty() {
        return Err(invalid());
    }
    Ok(format!("{host}:{port}"))
}
