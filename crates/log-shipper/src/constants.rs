// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Default limits and intervals for the shipping pipeline.

use std::time::Duration;

/// Maximum number of records included in one POST.
///
/// Bounds the size of each request body. Records beyond this stay pending and
/// go out with a later attempt.
pub const DEFAULT_MAX_MESSAGES_PER_POST: usize = 10;

/// Minimum time between the start of one POST and the start of the next.
pub const DEFAULT_MIN_INTERVAL_BETWEEN_POSTS: Duration = Duration::from_secs(1);

/// Number of times a failed batch is put back at the front of the buffer
/// before it is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Ceiling on pending records. Oldest records are evicted beyond it.
///
/// At roughly 1KB per record this is ~50MB of buffered logs.
pub const DEFAULT_MAX_PENDING_RECORDS: usize = 50_000;

/// Per-request timeout. A request that exceeds it counts as a network failure.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the dispatch loop runs a step.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on the final drain performed at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
