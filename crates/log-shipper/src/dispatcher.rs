// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Dispatch state machine.
//!
//! ```text
//!            begin()                        complete(outcome)
//!   Idle ─────────────> Sending ───────────────────────────────> Idle
//!    │  busy / rate-limited / empty: no-op     │ success: drop in-flight, reset retries
//!    └──────────────────────────────────────── │ failure: requeue front (retries left)
//!                                              │          or drop and reset retries
//! ```
//!
//! The dispatcher is driven by exactly one task, so `begin` and `complete` are
//! never called concurrently and its own flags need no lock. Only the pending
//! buffer is shared with producers.
//!
//! [`Dispatcher::begin`] returns immediately with the encoded payload; the caller
//! performs the request and hands the [`Outcome`] back through
//! [`Dispatcher::complete`].

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::buffer::PendingBuffer;
use crate::config::ShipperConfig;
use crate::entry::{encode_records, LogRecord};
use crate::in_flight::InFlightSet;
use crate::rate_limiter::RateLimiter;
use crate::transport::Outcome;

/// Snapshot of the dispatcher's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchState {
    pub in_progress: bool,
    pub previous_attempt: Option<Instant>,
    pub retry_counter: u32,
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub url: String,
    pub body: Vec<u8>,
    /// Number of records in the body.
    pub records: usize,
}

/// What one scheduler tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// No backend configured.
    Inactive,
    /// A transmission is already outstanding.
    Busy,
    /// The minimum interval since the previous attempt has not elapsed.
    RateLimited,
    /// Nothing pending. The rate-limit window is left untouched.
    Empty,
    /// A transmission started; send the payload and report back.
    Send(Payload),
    /// The extracted records could not be encoded and were dropped.
    EncodeFailed { dropped: usize },
}

/// How a completed transmission was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Delivered { records: usize },
    /// Put back at the front of the buffer; `attempt` is the new retry counter.
    Requeued { records: usize, attempt: u32 },
    /// Retries exhausted, records discarded.
    Dropped { records: usize },
    /// No transmission was outstanding.
    Ignored,
}

#[derive(Debug)]
pub struct Dispatcher {
    backend_url: Option<String>,
    session_id: String,
    max_messages_per_post: usize,
    max_retries: u32,
    buffer: Arc<PendingBuffer>,
    in_flight: InFlightSet,
    rate_limiter: RateLimiter,
    in_progress: bool,
    retry_counter: u32,
}

impl Dispatcher {
    /// Creates a dispatcher draining `buffer`.
    ///
    /// Without a backend URL the dispatcher is permanently inactive.
    #[must_use]
    pub fn new(config: &ShipperConfig, buffer: Arc<PendingBuffer>) -> Self {
        let backend_url = match config.backend_url() {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                error!("{e}");
                None
            }
        };
        Self {
            backend_url,
            session_id: config.session_id.clone(),
            max_messages_per_post: config.max_messages_per_post.max(1),
            max_retries: config.max_retries,
            buffer,
            in_flight: InFlightSet::new(),
            rate_limiter: RateLimiter::new(config.min_interval_between_posts),
            in_progress: false,
            retry_counter: 0,
        }
    }

    /// Runs one scheduler tick.
    pub fn begin(&mut self, now: Instant) -> Step {
        let Some(url) = self.backend_url.as_deref() else {
            return Step::Inactive;
        };
        if self.in_progress {
            return Step::Busy;
        }
        if !self.rate_limiter.is_ready(now) {
            return Step::RateLimited;
        }

        let records = self
            .buffer
            .extract_up_to(self.max_messages_per_post, &mut self.in_flight);
        if records == 0 {
            return Step::Empty;
        }

        self.in_progress = true;
        self.rate_limiter.record_attempt(now);

        match encode_records(&self.session_id, self.in_flight.records()) {
            Ok(body) => {
                debug!("Posting {records} log records");
                Step::Send(Payload {
                    url: url.to_string(),
                    body,
                    records,
                })
            }
            Err(e) => {
                // Retrying cannot make these encodable.
                error!("Dropping {records} log records: {e}");
                self.in_flight.clear();
                self.in_progress = false;
                Step::EncodeFailed { dropped: records }
            }
        }
    }

    /// Resolves the outstanding transmission.
    pub fn complete(&mut self, outcome: &Outcome) -> Resolution {
        if !self.in_progress {
            debug!("Ignoring transmission outcome, no transmission outstanding: {outcome}");
            return Resolution::Ignored;
        }

        let records = self.in_flight.take();
        let count = records.len();

        let resolution = match outcome {
            Outcome::Success { status, .. } => {
                debug!("Posted {count} log records: {status}");
                self.retry_counter = 0;
                Resolution::Delivered { records: count }
            }
            // Unable to establish a connection and perform the request
            Outcome::NetworkFailure(e) => {
                warn!("Log post failed. Error: {e}");
                self.retry_or_drop(records)
            }
            // Request performed, but the backend answered with an error status
            Outcome::RemoteRejection { status, body } => {
                warn!("Log post failed. Error: {status} {body}");
                self.retry_or_drop(records)
            }
        };

        self.in_progress = false;
        resolution
    }

    /// Requeues a failed batch while retries remain, drops it otherwise.
    fn retry_or_drop(&mut self, records: Vec<LogRecord>) -> Resolution {
        let count = records.len();
        if self.retry_counter < self.max_retries {
            self.retry_counter += 1;
            self.buffer.requeue_front(records);
            Resolution::Requeued {
                records: count,
                attempt: self.retry_counter,
            }
        } else {
            error!(
                "Dropping {count} log records after {} retries",
                self.max_retries
            );
            self.retry_counter = 0;
            Resolution::Dropped { records: count }
        }
    }

    #[must_use]
    pub fn state(&self) -> DispatchState {
        DispatchState {
            in_progress: self.in_progress,
            previous_attempt: self.rate_limiter.previous_attempt(),
            retry_counter: self.retry_counter,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.backend_url.is_some()
    }

    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    #[must_use]
    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn buffer(&self) -> &Arc<PendingBuffer> {
        &self.buffer
    }

    /// Time until the rate limiter allows the next attempt.
    #[must_use]
    pub fn rate_limit_remaining(&self, now: Instant) -> std::time::Duration {
        self.rate_limiter.remaining(now)
    }
}
