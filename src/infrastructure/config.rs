//! Configuration infrastructure
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `LINKMINE__SECTION__KEY` environment variables.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Config directory unavailable: {message}")]
    Directory { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub resolver: ResolverConfig,
    pub extractor: ExtractorConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Linear,
    Exponential,
}

/// Admission, timeout and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Informational only; admission is staggered, not bounded
    pub max_concurrency_hint: usize,
    pub ramp_up_count: usize,
    pub ramp_up_delay_ms: u64,
    pub steady_delay_ms: u64,
    pub per_item_timeout_ms: u64,
    pub max_retries: u32,
    pub backoff: BackoffKind,
    pub backoff_base_ms: u64,
    /// Upper bound for exponential backoff
    pub backoff_cap_ms: u64,
    pub backoff_jitter: bool,
    pub progress_every: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Listing service domain; derived from each input URL when unset
    pub source_domain: Option<String>,
    /// Regex with one capture group extracting the item identifier
    pub item_id_pattern: String,
    /// Retry blocked fetches through the fetch proxy
    pub use_proxy_on_block: bool,
    /// Hosts never accepted as a destination during content recovery
    pub non_destination_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub enabled: bool,
    pub guess_missing: bool,
    pub max_emails: usize,
    pub icon_window_chars: usize,
    pub signup_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub max_redirects: usize,
    /// Client-side request rate limit; `0` disables it
    pub max_requests_per_second: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,
    pub file_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency_hint: defaults::MAX_CONCURRENCY_HINT,
            ramp_up_count: defaults::RAMP_UP_COUNT,
            ramp_up_delay_ms: defaults::RAMP_UP_DELAY_MS,
            steady_delay_ms: defaults::STEADY_DELAY_MS,
            per_item_timeout_ms: defaults::PER_ITEM_TIMEOUT_MS,
            max_retries: defaults::MAX_RETRIES,
            backoff: BackoffKind::Linear,
            backoff_base_ms: defaults::BACKOFF_BASE_MS,
            backoff_cap_ms: defaults::BACKOFF_CAP_MS,
            backoff_jitter: false,
            progress_every: defaults::PROGRESS_EVERY,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            source_domain: None,
            item_id_pattern: defaults::ITEM_ID_PATTERN.to_string(),
            use_proxy_on_block: true,
            non_destination_domains: defaults::NON_DESTINATION_DOMAINS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            guess_missing: false,
            max_emails: defaults::MAX_EMAILS,
            icon_window_chars: defaults::ICON_WINDOW_CHARS,
            signup_keywords: defaults::SIGNUP_KEYWORDS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            max_redirects: defaults::MAX_REDIRECTS,
            max_requests_per_second: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.per_item_timeout_ms == 0 {
            return Err(ConfigError::Validation {
                message: "scheduler.per_item_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.scheduler.progress_every == 0 {
            return Err(ConfigError::Validation {
                message: "scheduler.progress_every must be greater than 0".to_string(),
            });
        }

        if self.extractor.max_emails == 0 {
            return Err(ConfigError::Validation {
                message: "extractor.max_emails must be greater than 0".to_string(),
            });
        }

        let pattern = Regex::new(&self.resolver.item_id_pattern).map_err(|e| ConfigError::Validation {
            message: format!("resolver.item_id_pattern is not a valid regex: {e}"),
        })?;
        if pattern.captures_len() < 2 {
            return Err(ConfigError::Validation {
                message: "resolver.item_id_pattern needs a capture group".to_string(),
            });
        }

        Ok(())
    }
}

/// Loads [`AppConfig`] from file and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    pub const ENV_PREFIX: &'static str = "LINKMINE";

    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Directory {
                message: "Failed to get user config directory".to_string(),
            })?
            .join("linkmine");

        Ok(config_dir)
    }

    /// Use the default `config.toml` in the user config directory, if present
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Use an explicit file, which must exist
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut builder = config::Config::builder();

        match &self.config_path {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                builder = builder.add_source(config::File::from(path.as_path()));
            }
            None => match Self::get_config_dir() {
                Ok(dir) => {
                    let default_path = dir.join("config.toml");
                    debug!("Looking for optional configuration at {:?}", default_path);
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
                Err(e) => debug!("Skipping default config file: {}", e),
            },
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

/// Default configuration values
pub mod defaults {
    pub const MAX_CONCURRENCY_HINT: usize = 50;
    pub const RAMP_UP_COUNT: usize = 10;
    pub const RAMP_UP_DELAY_MS: u64 = 2000;
    pub const STEADY_DELAY_MS: u64 = 500;
    pub const PER_ITEM_TIMEOUT_MS: u64 = 15_000;
    pub const MAX_RETRIES: u32 = 2;
    pub const BACKOFF_BASE_MS: u64 = 2000;
    pub const BACKOFF_CAP_MS: u64 = 30_000;
    pub const PROGRESS_EVERY: usize = 10;

    pub const ITEM_ID_PATTERN: &str = r"/r/p/(\d+)";
    pub const NON_DESTINATION_DOMAINS: &[&str] = &[
        "twitter.com",
        "x.com",
        "facebook.com",
        "linkedin.com",
        "instagram.com",
        "youtube.com",
        "google.com",
        "googleapis.com",
        "gstatic.com",
        "googletagmanager.com",
        "cloudfront.net",
        "imgix.net",
        "cloudinary.com",
        "jsdelivr.net",
        "unpkg.com",
        "apple.com",
    ];

    pub const MAX_EMAILS: usize = 5;
    pub const ICON_WINDOW_CHARS: usize = 400;
    pub const SIGNUP_KEYWORDS: &[&str] = &[
        "sign up",
        "signup",
        "sign-up",
        "register",
        "create account",
        "create an account",
        "get started",
        "start free",
        "free trial",
        "join now",
        "join free",
        "try for free",
        "try it free",
        "log in",
        "login",
        "sign in",
        "demo",
        "book a demo",
        "request a demo",
    ];

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
    pub const MAX_REDIRECTS: usize = 10;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "linkmine.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.ramp_up_count, 10);
        assert_eq!(config.scheduler.backoff, BackoffKind::Linear);
        assert_eq!(config.http.max_requests_per_second, 0);
        assert!(!config.extractor.guess_missing);
    }

    #[test]
    fn test_load_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[scheduler]\nmax_retries = 4\nbackoff = \"exponential\"\n\n[resolver]\nsource_domain = \"listing.example\""
        )
        .unwrap();

        let config = ConfigManager::with_path(file.path()).load().unwrap();
        assert_eq!(config.scheduler.max_retries, 4);
        assert_eq!(config.scheduler.backoff, BackoffKind::Exponential);
        assert_eq!(config.scheduler.ramp_up_delay_ms, 2000);
        assert_eq!(config.resolver.source_domain.as_deref(), Some("listing.example"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigManager::with_path(dir.path().join("absent.toml")).load();
        assert!(matches!(result, Err(ConfigError::FileLoad { .. })));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.scheduler.progress_every = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.resolver.item_id_pattern = r"/r/p/\d+".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scheduler.per_item_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
