//! Settings resolution
//!
//! Settings are resolved once per process from an environment-named file,
//! falling back to the `dev` file and finally to built-in values. Resolution
//! never fails: every degradation is logged and the next tier is tried.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::StoreTestError;

/// Environment variable selecting the settings file
pub const ENVIRONMENT_VAR: &str = "ENV";
/// Environment variable overriding the settings directory
pub const CONFIG_DIR_VAR: &str = "PETSTORE_CONFIG_DIR";

pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_CONFIG_DIR: &str = "config";

pub const DEFAULT_BASE_URL: &str = "https://petstore.swagger.io/v2";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;

const SUPPORTED_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// Where a resolved [`Settings`] value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// The file named after the selected environment
    Environment(PathBuf),
    /// The `dev` file, used because the environment file was missing or unreadable
    Default(PathBuf),
    /// Neither file could be loaded
    BuiltIn,
}

impl std::fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsSource::Environment(path) => write!(f, "environment file {}", path.display()),
            SettingsSource::Default(path) => write!(f, "default file {}", path.display()),
            SettingsSource::BuiltIn => write!(f, "built-in defaults"),
        }
    }
}

/// Read-only suite settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub environment: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
    pub log_requests: bool,
    pub log_responses: bool,
    pub source: SettingsSource,
}

/// On-disk shape. Dotted keys such as `base.url` nest naturally in every
/// supported format.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    base: BaseSection,
    request: TimeoutSection,
    connection: TimeoutSection,
    log: LogSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BaseSection {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimeoutSection {
    timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogSection {
    requests: Option<bool>,
    responses: Option<bool>,
}

static GLOBAL: OnceLock<Settings> = OnceLock::new();

impl Settings {
    /// Built-in values, used when no settings file can be loaded
    pub fn built_in(environment: &str) -> Self {
        Self {
            environment: environment.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            connection_timeout: Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS),
            log_requests: true,
            log_responses: true,
            source: SettingsSource::BuiltIn,
        }
    }

    /// Point the settings at another service, keeping everything else
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve settings for `environment` from files in `config_dir`
    pub fn resolve(environment: &str, config_dir: &Path) -> Self {
        match find_settings_file(config_dir, environment) {
            Some(path) => match load_settings_file(&path) {
                Ok(file) => {
                    log::info!(
                        "Loaded configuration from: {} for environment: {}",
                        path.display(),
                        environment
                    );
                    return Self::from_file(environment, file, SettingsSource::Environment(path));
                }
                Err(e) => log::error!("Error loading configuration: {:#}", e),
            },
            None => log::error!(
                "Configuration file not found for environment '{}' in {}",
                environment,
                config_dir.display()
            ),
        }

        match find_settings_file(config_dir, DEFAULT_ENVIRONMENT) {
            Some(path) => match load_settings_file(&path) {
                Ok(file) => {
                    log::info!("Loaded default configuration ({})", path.display());
                    return Self::from_file(environment, file, SettingsSource::Default(path));
                }
                Err(e) => log::error!("Error loading default configuration: {:#}", e),
            },
            None => log::error!(
                "Default configuration file ({}) not found in {}",
                DEFAULT_ENVIRONMENT,
                config_dir.display()
            ),
        }

        log::warn!("Using hardcoded default values");
        Self::built_in(environment)
    }

    /// Resolve settings using the `ENV` and `PETSTORE_CONFIG_DIR` variables
    pub fn from_env() -> Self {
        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
        let config_dir = std::env::var(CONFIG_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));
        Self::resolve(&environment, &config_dir)
    }

    /// Process-wide settings, resolved from the environment on first access.
    ///
    /// Concurrent first callers all observe the same single instance.
    pub fn global() -> &'static Settings {
        GLOBAL.get_or_init(Self::from_env)
    }

    /// Check the base URL is usable before a client is built from it
    pub fn validate(&self) -> std::result::Result<(), StoreTestError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(StoreTestError::Configuration(format!(
                "base.url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    fn from_file(environment: &str, file: SettingsFile, source: SettingsSource) -> Self {
        let defaults = Self::built_in(environment);
        Self {
            environment: environment.to_string(),
            base_url: file.base.url.unwrap_or(defaults.base_url),
            request_timeout: file
                .request
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            connection_timeout: file
                .connection
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(defaults.connection_timeout),
            log_requests: file.log.requests.unwrap_or(defaults.log_requests),
            log_responses: file.log.responses.unwrap_or(defaults.log_responses),
            source,
        }
    }
}

fn find_settings_file(config_dir: &Path, environment: &str) -> Option<PathBuf> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| config_dir.join(format!("{}.{}", environment, ext)))
        .find(|path| path.is_file())
}

fn load_settings_file(path: &Path) -> Result<SettingsFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {:?}", path))?;

    let file = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML settings: {:?}", path))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML settings: {:?}", path))?,
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON settings: {:?}", path))?,
        _ => anyhow::bail!("Unsupported settings file format: {:?}", path),
    };

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_environment_file_first() {
        let dir = TempDir::new().unwrap();
        write(&dir, "dev.toml", "base.url = \"http://dev.local/v2\"\n");
        let staging = write(
            &dir,
            "staging.toml",
            "base.url = \"http://staging.local/v2\"\nrequest.timeout = 5000\nlog.requests = false\n",
        );

        let settings = Settings::resolve("staging", dir.path());

        assert_eq!(settings.base_url, "http://staging.local/v2");
        assert_eq!(settings.request_timeout, Duration::from_millis(5000));
        assert!(!settings.log_requests);
        // keys absent from the file keep their built-in values
        assert!(settings.log_responses);
        assert_eq!(settings.connection_timeout, Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS));
        assert_eq!(settings.source, SettingsSource::Environment(staging));
        assert_eq!(settings.environment, "staging");
    }

    #[test]
    fn falls_back_to_dev_file_when_environment_file_missing() {
        let dir = TempDir::new().unwrap();
        let dev = write(&dir, "dev.yaml", "base:\n  url: http://dev.local/v2\n");

        let settings = Settings::resolve("qa", dir.path());

        assert_eq!(settings.base_url, "http://dev.local/v2");
        assert_eq!(settings.environment, "qa");
        assert_eq!(settings.source, SettingsSource::Default(dev));
    }

    #[test]
    fn falls_back_to_dev_file_when_environment_file_unreadable() {
        let dir = TempDir::new().unwrap();
        write(&dir, "qa.json", "{ not json");
        let dev = write(&dir, "dev.json", r#"{"base": {"url": "http://dev.local/v2"}}"#);

        let settings = Settings::resolve("qa", dir.path());

        assert_eq!(settings.base_url, "http://dev.local/v2");
        assert_eq!(settings.source, SettingsSource::Default(dev));
    }

    #[test]
    fn falls_back_to_built_in_values() {
        let dir = TempDir::new().unwrap();

        let settings = Settings::resolve("prod", dir.path());

        assert_eq!(settings, Settings::built_in("prod"));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn unreadable_dev_file_falls_back_to_built_in_values() {
        let dir = TempDir::new().unwrap();
        write(&dir, "dev.toml", "base.url = [");

        let settings = Settings::resolve("dev", dir.path());

        assert_eq!(settings.source, SettingsSource::BuiltIn);
    }

    #[test]
    fn validate_rejects_non_http_base_url() {
        let settings = Settings::built_in("dev").with_base_url("ftp://example.com");
        assert!(settings.validate().is_err());
        assert!(Settings::built_in("dev").validate().is_ok());
    }

    #[test]
    fn global_settings_are_constructed_once() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| Settings::global() as *const Settings as usize))
            .collect();
        let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
