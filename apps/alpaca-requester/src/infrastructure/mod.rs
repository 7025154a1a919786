//! Infrastructure Layer - Adapters and external integrations.
//!
//! Everything that talks to the network, reads the environment or installs
//! process-wide state lives here.

/// Alpaca data API client.
pub mod alpaca;

/// Credentials and client settings.
pub mod config;

/// Metrics instrumentation through the `metrics` facade.
pub mod metrics;

/// Logging setup.
pub mod telemetry;
