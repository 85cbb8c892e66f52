// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shipper configuration.
//!
//! Configuration is fixed at construction. It can be built in code (starting from
//! [`ShipperConfig::default`]) or read from `LOG_SHIPPER_*` environment variables
//! with [`ShipperConfig::from_env`].
//!
//! A missing backend URL is not a construction error: the shipper is created
//! inactive, every dispatch step is a no-op, and the host keeps running.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use crate::constants;
use crate::errors::ShipperError;
use crate::severity::{IncludeCallstackMode, LogSeverityLevel};

pub const ENV_BACKEND_URL: &str = "LOG_SHIPPER_BACKEND_URL";
pub const ENV_MAX_MESSAGES_PER_POST: &str = "LOG_SHIPPER_MAX_MESSAGES_PER_POST";
pub const ENV_MIN_INTERVAL_BETWEEN_POSTS: &str = "LOG_SHIPPER_MIN_INTERVAL_BETWEEN_POSTS";
pub const ENV_LOG_SEVERITY_LEVEL: &str = "LOG_SHIPPER_LOG_SEVERITY_LEVEL";
pub const ENV_INCLUDE_CALLSTACKS: &str = "LOG_SHIPPER_INCLUDE_CALLSTACKS";
pub const ENV_MAX_RETRIES: &str = "LOG_SHIPPER_MAX_RETRIES";
pub const ENV_SESSION_ID: &str = "LOG_SHIPPER_SESSION_ID";
pub const ENV_MAX_PENDING_RECORDS: &str = "LOG_SHIPPER_MAX_PENDING_RECORDS";
pub const ENV_REQUEST_TIMEOUT: &str = "LOG_SHIPPER_REQUEST_TIMEOUT";
pub const ENV_PROXY_HTTPS: &str = "LOG_SHIPPER_PROXY_HTTPS";
pub const ENV_LOG_LEVEL: &str = "LOG_SHIPPER_LOG_LEVEL";

#[derive(Debug, Clone)]
pub struct ShipperConfig {
    /// Ingestion endpoint. `None` leaves the shipper inactive.
    pub backend_url: Option<String>,
    /// Maximum records per POST.
    pub max_messages_per_post: usize,
    /// Minimum time between the starts of two POSTs.
    pub min_interval_between_posts: Duration,
    /// Lowest severity admitted into the buffer.
    pub log_severity_level: LogSeverityLevel,
    /// Lowest severity that carries its full call stack.
    pub include_callstacks: IncludeCallstackMode,
    /// Times a failed batch is requeued before being dropped.
    pub max_retries: u32,
    /// Stable per-process identifier; also the batch `logName`.
    pub session_id: String,
    /// Pending records kept before the oldest are evicted, `0` for no limit.
    pub max_pending_records: usize,
    /// Timeout applied to every POST.
    pub request_timeout: Duration,
    /// How often the dispatch loop runs a step.
    pub tick_interval: Duration,
    /// Upper bound on the final drain at shutdown.
    pub shutdown_timeout: Duration,
    pub https_proxy: Option<String>,
    /// Level for the shipper's own diagnostics (e.g. trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            max_messages_per_post: constants::DEFAULT_MAX_MESSAGES_PER_POST,
            min_interval_between_posts: constants::DEFAULT_MIN_INTERVAL_BETWEEN_POSTS,
            log_severity_level: LogSeverityLevel::default(),
            include_callstacks: IncludeCallstackMode::default(),
            max_retries: constants::DEFAULT_MAX_RETRIES,
            session_id: Uuid::new_v4().to_string(),
            max_pending_records: constants::DEFAULT_MAX_PENDING_RECORDS,
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT,
            tick_interval: constants::DEFAULT_TICK_INTERVAL,
            shutdown_timeout: constants::DEFAULT_SHUTDOWN_TIMEOUT,
            https_proxy: None,
            log_level: "info".to_string(),
        }
    }
}

/// Reads `name` and parses it, falling back to `default` (with a warning) when the
/// value does not parse.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring invalid {name}='{raw}': {e}");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_seconds(name: &str, default: Duration) -> Duration {
    let seconds = env_or(name, default.as_secs_f64());
    Duration::try_from_secs_f64(seconds).unwrap_or_else(|e| {
        warn!("Ignoring invalid {name}={seconds}: {e}");
        default
    })
}

impl ShipperConfig {
    /// Config shipping to `backend_url` with every other option at its default.
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: Some(backend_url.into()),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ShipperError::InvalidConfig`] when the resulting configuration fails
    /// [`ShipperConfig::validate`].
    pub fn from_env() -> Result<Self, ShipperError> {
        let defaults = Self::default();

        let backend_url = env::var(ENV_BACKEND_URL)
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let session_id = env::var(ENV_SESSION_ID)
            .ok()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(defaults.session_id);
        let https_proxy = env::var(ENV_PROXY_HTTPS)
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();
        let log_level = env::var(ENV_LOG_LEVEL)
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            backend_url,
            max_messages_per_post: env_or(ENV_MAX_MESSAGES_PER_POST, defaults.max_messages_per_post),
            min_interval_between_posts: env_seconds(
                ENV_MIN_INTERVAL_BETWEEN_POSTS,
                defaults.min_interval_between_posts,
            ),
            log_severity_level: env_or(ENV_LOG_SEVERITY_LEVEL, defaults.log_severity_level),
            include_callstacks: env_or(ENV_INCLUDE_CALLSTACKS, defaults.include_callstacks),
            max_retries: env_or(ENV_MAX_RETRIES, defaults.max_retries),
            session_id,
            max_pending_records: env_or(ENV_MAX_PENDING_RECORDS, defaults.max_pending_records),
            request_timeout: env_seconds(ENV_REQUEST_TIMEOUT, defaults.request_timeout),
            tick_interval: defaults.tick_interval,
            shutdown_timeout: defaults.shutdown_timeout,
            https_proxy,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ShipperError::InvalidConfig`] describing the first invalid option.
    pub fn validate(&self) -> Result<(), ShipperError> {
        if self.max_messages_per_post == 0 {
            return Err(ShipperError::InvalidConfig(
                "max_messages_per_post must be at least 1".to_string(),
            ));
        }
        if self.session_id.trim().is_empty() {
            return Err(ShipperError::InvalidConfig(
                "session_id must not be empty".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ShipperError::InvalidConfig(
                "tick_interval must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ShipperError::InvalidConfig(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(url) = &self.backend_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ShipperError::InvalidConfig(format!(
                    "backend_url must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ShipperError::MissingBackendUrl`] if no backend is configured.
    pub fn backend_url(&self) -> Result<&str, ShipperError> {
        self.backend_url
            .as_deref()
            .ok_or(ShipperError::MissingBackendUrl)
    }
}
