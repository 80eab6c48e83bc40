// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::RetryStrategy;
use crate::errors::ConfigError;

/// Reports API applications polled when `GWS_APPLICATIONS` is not set.
pub const DEFAULT_APPLICATIONS: [&str; 21] = [
    "access_transparency",
    "admin",
    "calendar",
    "chat",
    "drive",
    "gcp",
    "gplus",
    "groups",
    "groups_enterprise",
    "jamboard",
    "login",
    "meet",
    "mobile",
    "rules",
    "saml",
    "token",
    "user_accounts",
    "context_aware_access",
    "chrome",
    "data_studio",
    "keep",
];

const DEFAULT_CREDENTIALS_FILE: &str = "keyfile.json";
const DEFAULT_API_URL: &str = "https://admin.googleapis.com";
const DEFAULT_USER_KEY: &str = "all";
const DEFAULT_POLL_PERIOD_SECS: u64 = 60;
const MAX_POLL_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BASE_MS: u64 = 500;
const DEFAULT_RETRY_MAX_MS: u64 = 60_000;
const DEFAULT_SECURITY_PROTOCOL: &str = "SSL";
const DEFAULT_SSL_CA_LOCATION: &str = "kafka-ca.pem";
const DEFAULT_SSL_CERTIFICATE_LOCATION: &str = "producer-gws-audit.pem";
const DEFAULT_SSL_KEY_LOCATION: &str = "producer-gws-audit.pem";
const DEFAULT_QUEUE_MAX_MESSAGES: u32 = 100_000;

/// The window ends this many polling periods in the past.
pub const WINDOW_LAG_PERIODS: u32 = 5;
/// The first window starts this many polling periods in the past.
pub const INITIAL_LOOKBACK_PERIODS: u32 = 6;

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub credentials_file: PathBuf,
    /// Delegated user the service account impersonates
    pub subject: String,
    pub sources: Vec<String>,
    pub period: Duration,
    pub api_url: String,
    pub user_key: String,
    /// Pacing of retries after a failed feed query
    pub retry_strategy: RetryStrategy,
    /// Capacity of the record channel shared by pollers and the forwarder
    pub channel_capacity: usize,
    pub request_timeout: Duration,
    pub proxy_url: Option<String>,
}

impl PollConfig {
    pub fn window_lag(&self) -> Duration {
        self.period * WINDOW_LAG_PERIODS
    }

    pub fn initial_lookback(&self) -> Duration {
        self.period * INITIAL_LOOKBACK_PERIODS
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub servers: String,
    pub topic: String,
    pub security_protocol: String,
    pub ssl_ca_location: String,
    pub ssl_certificate_location: String,
    pub ssl_key_location: String,
    /// Depth of the producer's local queue before submissions report queue-full
    pub queue_max_messages: u32,
    pub queue_full_backoff: Duration,
    pub produce_error_backoff: Duration,
    pub delivery_error_backoff: Duration,
    /// Upper bound on draining in-flight messages at shutdown
    pub flush_timeout: Duration,
}

impl BrokerConfig {
    /// Key/value pairs handed to the broker client.
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = vec![
            ("metadata.broker.list", self.servers.clone()),
            ("security.protocol", self.security_protocol.clone()),
            (
                "queue.buffering.max.messages",
                self.queue_max_messages.to_string(),
            ),
        ];
        if self.security_protocol.to_uppercase().ends_with("SSL") {
            props.push(("ssl.ca.location", self.ssl_ca_location.clone()));
            props.push((
                "ssl.certificate.location",
                self.ssl_certificate_location.clone(),
            ));
            props.push(("ssl.key.location", self.ssl_key_location.clone()));
        }
        props
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging settings. Read on their own, before the rest of the configuration, so that
/// configuration errors can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_env() -> LogConfig {
        let format = match env::var("LOG_FORMAT").map(|val| val.to_lowercase()) {
            Ok(val) if val == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        LogConfig {
            level: env::var("LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or_else(|_| "info".to_string()),
            format,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub poll: PollConfig,
    pub broker: BrokerConfig,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let sources = match env::var("GWS_APPLICATIONS") {
            Ok(val) => parse_sources(&val),
            Err(_) => DEFAULT_APPLICATIONS.iter().map(|s| s.to_string()).collect(),
        };

        let poll = PollConfig {
            credentials_file: PathBuf::from(
                env::var("GWS_CREDENTIALS_FILE")
                    .unwrap_or_else(|_| DEFAULT_CREDENTIALS_FILE.to_string()),
            ),
            subject: required("SUBJECT")?,
            sources,
            period: Duration::from_secs(parse_or("GWS_POLL_PERIOD_SECS", DEFAULT_POLL_PERIOD_SECS)?),
            api_url: env::var("GWS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            user_key: env::var("GWS_USER_KEY").unwrap_or_else(|_| DEFAULT_USER_KEY.to_string()),
            retry_strategy: retry_strategy()?,
            channel_capacity: 1,
            request_timeout: Duration::from_secs(30),
            proxy_url: env::var("GWS_PROXY_HTTPS")
                .or_else(|_| env::var("HTTPS_PROXY"))
                .ok(),
        };

        let broker = BrokerConfig {
            servers: required("KAFKA_SERVERS")?,
            topic: required("KAFKA_TOPIC")?,
            security_protocol: env::var("KAFKA_SECURITY_PROTOCOL")
                .unwrap_or_else(|_| DEFAULT_SECURITY_PROTOCOL.to_string()),
            ssl_ca_location: env::var("KAFKA_SSL_CA_LOCATION")
                .unwrap_or_else(|_| DEFAULT_SSL_CA_LOCATION.to_string()),
            ssl_certificate_location: env::var("KAFKA_SSL_CERTIFICATE_LOCATION")
                .unwrap_or_else(|_| DEFAULT_SSL_CERTIFICATE_LOCATION.to_string()),
            ssl_key_location: env::var("KAFKA_SSL_KEY_LOCATION")
                .unwrap_or_else(|_| DEFAULT_SSL_KEY_LOCATION.to_string()),
            queue_max_messages: parse_or("KAFKA_QUEUE_MAX_MESSAGES", DEFAULT_QUEUE_MAX_MESSAGES)?,
            queue_full_backoff: Duration::from_secs(5),
            produce_error_backoff: Duration::from_secs(1),
            delivery_error_backoff: Duration::from_secs(1),
            flush_timeout: Duration::from_secs(10),
        };

        let config = Config { poll, broker };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.sources.is_empty() {
            return Err(ConfigError::Invalid {
                key: "GWS_APPLICATIONS",
                reason: "at least one application is required".to_string(),
            });
        }
        if self.poll.period.is_zero() {
            return Err(ConfigError::Invalid {
                key: "GWS_POLL_PERIOD_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll.period > MAX_POLL_PERIOD {
            return Err(ConfigError::Invalid {
                key: "GWS_POLL_PERIOD_SECS",
                reason: format!("must be at most {}", MAX_POLL_PERIOD.as_secs()),
            });
        }
        if self.poll.retry_strategy.max_attempts() == 0 {
            return Err(ConfigError::Invalid {
                key: "GWS_RETRY_MAX_ATTEMPTS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.broker.queue_max_messages == 0 {
            return Err(ConfigError::Invalid {
                key: "KAFKA_QUEUE_MAX_MESSAGES",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Splits a comma-separated application list, dropping blanks and duplicates.
pub fn parse_sources(val: &str) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for source in val.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }
    sources
}

/// `GWS_RETRY_BASE_MS=0` retries without waiting; any other base backs off exponentially.
fn retry_strategy() -> Result<RetryStrategy, ConfigError> {
    let max_attempts = parse_or("GWS_RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS)?;
    let base_ms = parse_or("GWS_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS)?;
    if base_ms == 0 {
        return Ok(RetryStrategy::Immediate(max_attempts));
    }
    Ok(RetryStrategy::ExponentialBackoff {
        max_attempts,
        base_ms,
        max_ms: parse_or("GWS_RETRY_MAX_MS", DEFAULT_RETRY_MAX_MS)?,
    })
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(val) => val.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
