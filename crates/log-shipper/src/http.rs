// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;

use crate::errors::ShipperError;

/// Builds the reqwest client used to ship batches.
///
/// Uses rustls TLS. Every request inherits `timeout`, so a hung backend resolves
/// as a network failure instead of blocking the dispatcher forever.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, ShipperError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout);
    if let Some(proxy) = proxy_url {
        let proxy =
            reqwest::Proxy::https(proxy).map_err(|e| ShipperError::HttpClient(e.to_string()))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| ShipperError::HttpClient(e.to_string()))
}
