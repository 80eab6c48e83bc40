// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Errors produced while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failures acquiring a bearer token for the audit feed. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("Unable to read service account key {path}: {source}")]
    ReadKey {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to create authenticator: {0}")]
    Authenticator(#[source] std::io::Error),

    #[error("Unable to fetch access token: {0}")]
    Token(String),
}

/// A single failed query against the audit feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Feed returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Outcome of a rejected broker submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProduceError {
    /// The local producer queue is saturated. The caller should pause and resubmit.
    #[error("Local producer queue is full")]
    QueueFull,

    #[error("Failed to produce message: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No sources configured")]
    NoSources,

    #[error("Unable to create producer: {0}")]
    Producer(String),

    #[error("Shutdown timeout of {0:?} exceeded")]
    ShutdownTimeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::Missing("KAFKA_TOPIC");
        assert_eq!(
            error.to_string(),
            "KAFKA_TOPIC environment variable is not set"
        );

        let error = ConfigError::Invalid {
            key: "GWS_POLL_PERIOD_SECS",
            reason: "must be greater than zero".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid value for GWS_POLL_PERIOD_SECS: must be greater than zero"
        );
    }

    #[test]
    fn test_produce_error_display() {
        assert_eq!(
            ProduceError::QueueFull.to_string(),
            "Local producer queue is full"
        );
        assert_eq!(
            ProduceError::Other("broker down".into()).to_string(),
            "Failed to produce message: broker down"
        );
    }

    #[test]
    fn test_feed_error_wraps_credentials() {
        let error: FeedError = CredentialsError::Token("expired".into()).into();
        assert_eq!(error.to_string(), "Unable to fetch access token: expired");
    }
}
