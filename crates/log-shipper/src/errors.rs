// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced by the log shipper.
///
/// Shipping failures themselves are not errors from the caller's point of view:
/// they are retried and eventually dropped by the dispatcher. What remains here
/// are configuration problems and contract violations.
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error("No backend URL configured, log shipping is inactive")]
    MissingBackendUrl,

    #[error("Unsupported severity value: {0}")]
    UnsupportedSeverity(i32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
