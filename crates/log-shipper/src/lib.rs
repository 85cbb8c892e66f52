// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client-side log shipping.
//!
//! Application code emits [`entry::LogEvent`]s through a [`service::LogShipper`]
//! handle (directly, or through the [`layer::ShipperLayer`] tracing layer). Events
//! that pass the severity filter are buffered in memory and a single dispatch loop
//! ([`service::ShipperService`]) ships them to a remote HTTP endpoint in batches.
//!
//! ```text
//!   producers ──emit──> PendingBuffer ──extract──> InFlightSet ──POST──> backend
//!                            ^                          │
//!                            └──── requeue on failure ──┘
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod entry;
pub mod errors;
pub mod http;
pub mod in_flight;
pub mod layer;
pub mod rate_limiter;
pub mod service;
pub mod severity;
pub mod transport;
