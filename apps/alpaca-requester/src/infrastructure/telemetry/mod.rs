//! Logging Setup
//!
//! The library only emits `tracing` events. Applications that do not install
//! their own subscriber can call [`init`] to get formatted logs.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default adds `alpaca_requester=info`)
//! - `ALPACA_REQUESTER_LOG_FORMAT`: `pretty` (default) or `json`
//! - `ALPACA_REQUESTER_LOG_ANSI`: set to `false` to disable colours
//!
//! # Usage
//!
//! ```ignore
//! use alpaca_requester::infrastructure::telemetry;
//!
//! telemetry::init();
//! tracing::info!("Downloading bars");
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to `Pretty`.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Output format.
    pub format: LogFormat,
    /// Whether to emit ANSI colours.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = lookup("ALPACA_REQUESTER_LOG_FORMAT")
            .map(|v| LogFormat::from_str_lossy(&v))
            .unwrap_or_default();

        let ansi = lookup("ALPACA_REQUESTER_LOG_ANSI")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Self { format, ansi }
    }
}

/// Initialize logging from environment configuration.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_config(&TelemetryConfig::from_env())
}

/// Initialize logging with custom configuration.
///
/// Returns `false` if a global subscriber was already installed.
#[allow(clippy::expect_used)]
pub fn init_with_config(config: &TelemetryConfig) -> bool {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(
            "alpaca_requester=info"
                .parse()
                .expect("static directive 'alpaca_requester=info' is valid"),
        )
        .add_directive(
            "hyper=warn"
                .parse()
                .expect("static directive 'hyper=warn' is valid"),
        )
        .add_directive(
            "reqwest=warn"
                .parse()
                .expect("static directive 'reqwest=warn' is valid"),
        );

    let (json_layer, text_layer) = match config.format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_ansi(config.ansi)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_ok()
}
