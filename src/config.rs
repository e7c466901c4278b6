//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct,
//! then resolves the gateway knobs into [`GatewayConfig`] with their defaults applied.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

/// Fallback quota when neither the client record nor the environment supplies a positive rate.
pub const DEFAULT_RATE_PER_MINUTE: u32 = 29;

/// Fallback clock skew tolerance, in seconds.
pub const DEFAULT_DATE_SKEW_SECONDS: u64 = 60;

/// Fallback nonce lifetime, in seconds.
pub const DEFAULT_NONCE_TTL_SECONDS: u64 = 600;

/// Fallback cadence of the background nonce sweep, in seconds.
pub const DEFAULT_NONCE_SWEEP_SECONDS: u64 = 60;

/// Upper bound for any configured duration (30 days).
pub const MAX_DURATION_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8086
/// - `DATABASE_URL` (optional): PostgreSQL connection string for the client directory
/// - `CLIENTS_FILE` (optional): JSON file with client records, used when `DATABASE_URL` is unset
/// - `AUTH_STRICT_MODE` (optional): require signed requests, defaults to false
/// - `DATE_SKEW_SECONDS` (optional): allowed `X-Date` skew, defaults to 60
/// - `NONCE_TTL_SECONDS` (optional): replay window, defaults to 600
/// - `DEFAULT_RATE_PER_MIN` (optional): quota for clients without one, defaults to 29
/// - `NONCE_SWEEP_INTERVAL_SECONDS` (optional): expired nonce purge cadence, defaults to 60
///
/// Numeric values that are zero or negative fall back to their defaults, as do
/// durations above [`MAX_DURATION_SECONDS`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub clients_file: Option<PathBuf>,

    #[serde(default)]
    pub auth_strict_mode: bool,

    #[serde(default)]
    pub date_skew_seconds: i64,

    #[serde(default)]
    pub nonce_ttl_seconds: i64,

    #[serde(default)]
    pub default_rate_per_min: i64,

    #[serde(default)]
    pub nonce_sweep_interval_seconds: i64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    8086
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        // Field names are converted automatically: auth_strict_mode -> AUTH_STRICT_MODE
        envy::from_env::<Config>()
    }

    /// Resolve the gateway knobs, applying defaults to unset or non-positive values.
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            strict_mode: self.auth_strict_mode,
            date_skew: bounded_secs(
                "DATE_SKEW_SECONDS",
                self.date_skew_seconds,
                DEFAULT_DATE_SKEW_SECONDS,
            ),
            nonce_ttl: bounded_secs(
                "NONCE_TTL_SECONDS",
                self.nonce_ttl_seconds,
                DEFAULT_NONCE_TTL_SECONDS,
            ),
            nonce_sweep_interval: bounded_secs(
                "NONCE_SWEEP_INTERVAL_SECONDS",
                self.nonce_sweep_interval_seconds,
                DEFAULT_NONCE_SWEEP_SECONDS,
            ),
            default_rate_per_minute: positive_rate(self.default_rate_per_min)
                .unwrap_or(DEFAULT_RATE_PER_MINUTE),
        }
    }
}

/// Resolved settings consumed by the auth gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// When set, `X-Signature` is mandatory and the shared-secret fallback is disabled.
    pub strict_mode: bool,

    /// Maximum distance between `X-Date` and the server clock, in either direction.
    pub date_skew: Duration,

    /// How long an accepted nonce blocks reuse.
    pub nonce_ttl: Duration,

    pub nonce_sweep_interval: Duration,

    /// Quota applied to clients whose record carries no positive rate.
    pub default_rate_per_minute: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            date_skew: Duration::from_secs(DEFAULT_DATE_SKEW_SECONDS),
            nonce_ttl: Duration::from_secs(DEFAULT_NONCE_TTL_SECONDS),
            nonce_sweep_interval: Duration::from_secs(DEFAULT_NONCE_SWEEP_SECONDS),
            default_rate_per_minute: DEFAULT_RATE_PER_MINUTE,
        }
    }
}

fn bounded_secs(name: &str, value: i64, default: u64) -> Duration {
    match u64::try_from(value) {
        Ok(secs) if secs > 0 && secs <= MAX_DURATION_SECONDS => Duration::from_secs(secs),
        Ok(secs) if secs > MAX_DURATION_SECONDS => {
            tracing::warn!(
                var = name,
                value = secs,
                max = MAX_DURATION_SECONDS,
                default_secs = default,
                "Configured duration out of range, using default"
            );
            Duration::from_secs(default)
        }
        _ => Duration::from_secs(default),
    }
}

/// Convert a configured per-minute rate into a usable quota, rejecting non-positive values.
pub fn positive_rate(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|rate| *rate > 0)
}
