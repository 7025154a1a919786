//! Configuration Module
//!
//! Credentials and client settings.

mod settings;

pub use settings::{
    API_KEY_ENV, API_SECRET_ENV, ClientConfig, ConfigError, Credentials, DEFAULT_DATA_URL,
    MAX_DURATION_SETTING, RateLimitSettings, RetrySettings,
};
