// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Outbound transport for encoded batches.
//!
//! A transport performs exactly one request per call and reports what happened.
//! It never retries: retry policy lives in the dispatcher.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::constants::CONTENT_TYPE_JSON;
use crate::errors::ShipperError;
use crate::http::build_client;

/// Result of one transmission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The backend answered with a status in `[200, 300)`.
    Success { status: u16, body: String },
    /// The backend answered with any other status.
    RemoteRejection { status: u16, body: String },
    /// The exchange could not be completed (connect, TLS, timeout, ...).
    NetworkFailure(String),
}

impl Outcome {
    /// Classifies a completed HTTP exchange by its status code.
    #[must_use]
    pub fn from_response(status: u16, body: String) -> Self {
        if (200..300).contains(&status) {
            Outcome::Success { status, body }
        } else {
            Outcome::RemoteRejection { status, body }
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { status, .. } => write!(f, "{status}"),
            Outcome::RemoteRejection { status, body } => write!(f, "{status} {body}"),
            Outcome::NetworkFailure(error) => write!(f, "{error}"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs `body` to `url` and reports the outcome.
    async fn send(&self, body: Vec<u8>, url: &str) -> Outcome;
}

/// HTTP transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`ShipperError::HttpClient`] if the client cannot be built, e.g. for a
    /// malformed proxy URL.
    pub fn new(proxy_url: Option<&str>, timeout: Duration) -> Result<Self, ShipperError> {
        Ok(Self {
            client: build_client(proxy_url, timeout)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Vec<u8>, url: &str) -> Outcome {
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(body)
            .send()
            .await;

        match resp {
            Ok(resp) => {
                let status = resp.status().as_u16();
                // The body is only needed for diagnostics; an unreadable one is not a failure.
                let body = resp.text().await.unwrap_or_default();
                debug!("Log batch POST answered with {status}");
                Outcome::from_response(status, body)
            }
            Err(e) => Outcome::NetworkFailure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_outcome_classification() {
        assert!(Outcome::from_response(200, String::new()).is_success());
        assert!(Outcome::from_response(204, String::new()).is_success());
        assert!(Outcome::from_response(299, String::new()).is_success());
        assert_eq!(
            Outcome::from_response(300, "moved".to_string()),
            Outcome::RemoteRejection {
                status: 300,
                body: "moved".to_string()
            }
        );
        assert!(!Outcome::from_response(199, String::new()).is_success());
        assert!(!Outcome::from_response(500, String::new()).is_success());
    }

    #[test]
    fn test_outcome_display() {
        let outcome = Outcome::RemoteRejection {
            status: 400,
            body: r#"{"error":"missing entries"}"#.to_string(),
        };
        assert_eq!(outcome.to_string(), r#"400 {"error":"missing entries"}"#);
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/appendToLog")
            .match_header("Content-Type", "application/json")
            .match_body(r#"{"logName":"s","entries":[]}"#)
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let transport = HttpTransport::new(None, Duration::from_secs(5)).unwrap();
        let url = format!("{}/appendToLog", server.url());
        let outcome = transport
            .send(br#"{"logName":"s","entries":[]}"#.to_vec(), &url)
            .await;

        assert_eq!(
            outcome,
            Outcome::Success {
                status: 200,
                body: "ok".to_string()
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_remote_rejection() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/appendToLog")
            .with_status(500)
            .with_body(r#"{"error":"backend down"}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(None, Duration::from_secs(5)).unwrap();
        let url = format!("{}/appendToLog", server.url());
        let outcome = transport.send(b"{}".to_vec(), &url).await;

        assert_eq!(
            outcome,
            Outcome::RemoteRejection {
                status: 500,
                body: r#"{"error":"backend down"}"#.to_string()
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_network_failure() {
        let transport = HttpTransport::new(None, Duration::from_secs(1)).unwrap();
        // Nothing listens on port 9 of localhost.
        let outcome = transport
            .send(b"{}".to_vec(), "http://127.0.0.1:9/appendToLog")
            .await;
        assert!(matches!(outcome, Outcome::NetworkFailure(_)));
    }
}
