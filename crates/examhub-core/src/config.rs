use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use thiserror::Error;
use url::Url;

pub const API_URL_VAR: &str = "EXAMHUB_API_URL";
pub const ANALYTICS_URL_VAR: &str = "EXAMHUB_ANALYTICS_URL";
pub const HOME_VAR: &str = "EXAMHUB_HOME";

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_ANALYTICS_URL: &str = "http://localhost:8000/api";

/// Timeout applied to primary API calls.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);
/// Analytics endpoints aggregate a lot of data and get a longer budget.
pub const ANALYTICS_TIMEOUT: Duration = Duration::from_secs(60);

const STORAGE_FILE: &str = "storage.json";

/// Base origins of the two backends the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub api_base_url: Url,
    pub analytics_base_url: Url,
}

impl ApiConfig {
    pub fn new(api_base_url: &str, analytics_base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_origin(API_URL_VAR, api_base_url)?,
            analytics_base_url: parse_origin(ANALYTICS_URL_VAR, analytics_base_url)?,
        })
    }

    /// Read both origins from the process environment, falling back to local placeholders.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] but with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api = lookup(API_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let analytics = lookup(ANALYTICS_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ANALYTICS_URL.to_owned());
        Self::new(api.trim(), analytics.trim())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("valid default API URL"),
            analytics_base_url: Url::parse(DEFAULT_ANALYTICS_URL)
                .expect("valid default analytics URL"),
        }
    }
}

fn parse_origin(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        var,
        value: value.to_owned(),
        source,
    })
}

/// Locates the per-user directory holding durable client state.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    root: PathBuf,
}

impl ConfigLocator {
    /// Discover the configuration directory (honouring `EXAMHUB_HOME`), creating it if needed.
    pub fn new() -> Result<Self, ConfigError> {
        let root = match env::var_os(HOME_VAR) {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => ProjectDirs::from("app", "examhub", "examhub")
                .ok_or(ConfigError::MissingProjectDirs)?
                .config_dir()
                .to_path_buf(),
        };
        Self::with_root(root)
    }

    /// Use an explicit root directory, creating it if needed.
    pub fn with_root(root: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&root).map_err(ConfigError::CreateDir)?;
        set_user_only_permissions(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the key-value file backing tokens and the persisted session.
    pub fn storage_file(&self) -> PathBuf {
        self.root.join(STORAGE_FILE)
    }
}

fn set_user_only_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o700);
        fs::set_permissions(path, permissions)?;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

/// Errors that can occur while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine configuration directory for examhub")]
    MissingProjectDirs,
    #[error("failed to create configuration directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("filesystem error: {0}")]
    Io(#[source] std::io::Error),
    #[error("invalid URL in {var} ('{value}'): {source}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}
