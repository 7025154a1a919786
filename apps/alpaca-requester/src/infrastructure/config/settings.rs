//! Client Configuration Settings
//!
//! Configuration types for the client, built explicitly or loaded from
//! environment variables (and a `.env` file, if one exists).

use std::path::Path;
use std::time::Duration;

/// Environment variable holding the API key ID.
pub const API_KEY_ENV: &str = "APCA_API_KEY_ID";

/// Environment variable holding the API secret key.
pub const API_SECRET_ENV: &str = "APCA_API_SECRET_KEY";

/// Production market data host.
pub const DEFAULT_DATA_URL: &str = "https://data.alpaca.markets";

/// Longest accepted duration for windows, backoff caps and rate-limit waits.
pub const MAX_DURATION_SETTING: Duration = Duration::from_secs(24 * 60 * 60);

/// Alpaca API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read credentials from the process environment, after loading a
    /// `.env` file from the current directory or an ancestor.
    ///
    /// Variables already set in the process take precedence over the file.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials from a `.env`-style file without touching the
    /// process environment.
    pub fn from_dotenv_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path).map_err(|e| ConfigError::DotEnv {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut pairs = Vec::new();
        for entry in entries {
            let (key, value) = entry.map_err(|e| ConfigError::DotEnv {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            pairs.push((key, value));
        }

        Self::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
    }

    /// Read credentials through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key =
            lookup(API_KEY_ENV).ok_or_else(|| ConfigError::MissingEnvVar(API_KEY_ENV.to_string()))?;
        let api_secret = lookup(API_SECRET_ENV)
            .ok_or_else(|| ConfigError::MissingEnvVar(API_SECRET_ENV.to_string()))?;

        let credentials = Self::new(api_key, api_secret);
        credentials.validate()?;
        Ok(credentials)
    }

    /// Reject blank values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue(API_KEY_ENV.to_string()));
        }
        if self.api_secret.trim().is_empty() {
            return Err(ConfigError::EmptyValue(API_SECRET_ENV.to_string()));
        }
        Ok(())
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Request budget settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 200,
            window: Duration::from_secs(60),
        }
    }
}

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Retries after the first attempt of a page.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Growth factor between delays.
    pub multiplier: f64,
    /// Jitter factor as a fraction (0.2 = ±20%).
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API credentials.
    pub credentials: Credentials,
    /// Data API base URL, without trailing slash.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Request budget.
    pub rate_limit: RateLimitSettings,
    /// Retry policy.
    pub retry: RetrySettings,
    /// Longest wait honoured from a server rate-limit reset hint.
    pub max_rate_limit_wait: Duration,
}

impl ClientConfig {
    /// Configuration with default settings for the given credentials.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_DATA_URL.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit: RateLimitSettings::default(),
            retry: RetrySettings::default(),
            max_rate_limit_wait: Duration::from_secs(60),
        }
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration through an arbitrary variable lookup.
    ///
    /// Credentials are required; every other setting falls back to its
    /// default when absent or unparseable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::from_lookup(&lookup)?;
        let defaults = Self::new(credentials);

        let rate_limit = RateLimitSettings {
            max_requests: parse_u32(
                &lookup,
                "ALPACA_REQUESTER_RATE_LIMIT",
                defaults.rate_limit.max_requests,
            ),
            window: parse_duration_secs(
                &lookup,
                "ALPACA_REQUESTER_RATE_WINDOW_SECS",
                defaults.rate_limit.window,
            ),
        };

        let retry = RetrySettings {
            max_retries: parse_u32(
                &lookup,
                "ALPACA_REQUESTER_MAX_RETRIES",
                defaults.retry.max_retries,
            ),
            initial_backoff: parse_duration_millis(
                &lookup,
                "ALPACA_REQUESTER_INITIAL_BACKOFF_MS",
                defaults.retry.initial_backoff,
            ),
            max_backoff: parse_duration_secs(
                &lookup,
                "ALPACA_REQUESTER_MAX_BACKOFF_SECS",
                defaults.retry.max_backoff,
            ),
            ..defaults.retry.clone()
        };

        let config = Self {
            base_url: lookup("ALPACA_DATA_URL")
                .filter(|url| !url.trim().is_empty())
                .map_or(defaults.base_url.clone(), |url| normalize_base_url(&url)),
            timeout: parse_duration_secs(&lookup, "ALPACA_REQUESTER_TIMEOUT_SECS", defaults.timeout),
            rate_limit,
            retry,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Point the client at another host (a proxy or a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(base_url.as_ref());
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the request budget.
    #[must_use]
    pub const fn with_rate_limit(mut self, rate_limit: RateLimitSettings) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Cap waits derived from server rate-limit headers.
    #[must_use]
    pub const fn with_max_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.max_rate_limit_wait = wait;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials.validate()?;

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: format!("expected an http(s) URL, got {:?}", self.base_url),
            });
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid {
                field: "rate_limit.max_requests",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::Invalid {
                field: "rate_limit.window",
                reason: "must be non-zero".to_string(),
            });
        }
        check_bounded("rate_limit.window", self.rate_limit.window)?;
        check_bounded("retry.max_backoff", self.retry.max_backoff)?;
        check_bounded("max_rate_limit_wait", self.max_rate_limit_wait)?;
        if self.retry.multiplier.is_nan() || self.retry.multiplier <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "retry.multiplier",
                reason: format!("must be positive, got {}", self.retry.multiplier),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ConfigError::Invalid {
                field: "retry.jitter_factor",
                reason: format!("must be within 0..=1, got {}", self.retry.jitter_factor),
            });
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// A `.env` file could not be read.
    #[error("failed to read env file '{path}': {reason}")]
    DotEnv {
        /// File path.
        path: String,
        /// Underlying failure.
        reason: String,
    },
    /// A setting is out of range.
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Load `.env` from the current or an ancestor directory; a missing file is fine.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }
}

fn check_bounded(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value > MAX_DURATION_SETTING {
        return Err(ConfigError::Invalid {
            field,
            reason: format!(
                "must be at most {}s, got {}s",
                MAX_DURATION_SETTING.as_secs(),
                value.as_secs()
            ),
        });
    }
    Ok(())
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_u32<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
