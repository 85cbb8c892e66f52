// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer handle and dispatch loop.
//!
//! ```text
//!    ┌──────────────┐
//!    │  LogShipper  │ (Clone, any thread)
//!    └──────┬───────┘
//!           │ filter + enqueue
//!           v
//!    ┌──────────────┐        spawn         ┌────────────┐
//!    │ShipperService│ ───────────────────> │ Transport  │
//!    │  (one task)  │ <─────────────────── │  send()    │
//!    └──────────────┘   outcome channel    └────────────┘
//! ```
//!
//! `ShipperService::run` owns the [`Dispatcher`]. Every tick it runs one dispatch
//! step. Transmissions run on their own task so a tick never waits on the
//! network; their outcomes come back over a channel and are resolved by the
//! same task, so dispatch steps never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buffer::PendingBuffer;
use crate::config::ShipperConfig;
use crate::dispatcher::{Dispatcher, Payload, Step};
use crate::entry::{LogEvent, LogRecord};
use crate::errors::ShipperError;
use crate::severity::{admit, attach_callstack, IncludeCallstackMode, LogSeverityLevel};
use crate::transport::{HttpTransport, Outcome, Transport};

/// Anything that accepts log events.
///
/// Components take a `LogSink` instead of reaching for a global logger.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Producer side of the shipper. Cheap to clone.
#[derive(Clone, Debug)]
pub struct LogShipper {
    buffer: Arc<PendingBuffer>,
    session_id: Arc<str>,
    log_severity_level: LogSeverityLevel,
    include_callstacks: IncludeCallstackMode,
    active: bool,
}

impl LogShipper {
    /// Creates the producer handle and the service that ships its records over
    /// HTTP.
    ///
    /// Spawn [`ShipperService::run`] to start shipping. Without a backend URL the
    /// pair is inactive: events are discarded and the service only waits for
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`ShipperError::InvalidConfig`] if `config` fails
    /// [`ShipperConfig::validate`], or [`ShipperError::HttpClient`] if the HTTP
    /// client cannot be built.
    pub fn new(config: ShipperConfig) -> Result<(Self, ShipperService), ShipperError> {
        config.validate()?;
        let transport = HttpTransport::new(config.https_proxy.as_deref(), config.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Same as [`LogShipper::new`] with a caller-provided transport.
    ///
    /// # Errors
    ///
    /// Returns [`ShipperError::InvalidConfig`] if `config` fails
    /// [`ShipperConfig::validate`].
    pub fn with_transport(
        config: ShipperConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<(Self, ShipperService), ShipperError> {
        config.validate()?;
        let buffer = Arc::new(PendingBuffer::new(config.max_pending_records));
        let dispatcher = Dispatcher::new(&config, Arc::clone(&buffer));
        let (tx, rx) = mpsc::unbounded_channel();

        let shipper = Self {
            buffer,
            session_id: Arc::from(config.session_id.as_str()),
            log_severity_level: config.log_severity_level,
            include_callstacks: config.include_callstacks,
            active: dispatcher.is_active(),
        };
        let service = ShipperService {
            dispatcher,
            transport,
            tick_interval: config.tick_interval,
            request_timeout: config.request_timeout,
            shutdown_timeout: config.shutdown_timeout,
            tx,
            rx,
        };
        Ok((shipper, service))
    }

    /// Filters `event` and, if admitted, queues it for shipping.
    pub fn emit(&self, event: LogEvent) {
        if !self.active || !admit(event.severity, self.log_severity_level) {
            return;
        }
        let include_callstack = attach_callstack(event.severity, self.include_callstacks);
        self.buffer
            .enqueue(LogRecord::from_event(&self.session_id, event, include_callstack));
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Records waiting to be shipped, excluding the batch in flight.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Records dropped so far because the buffer was full.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.buffer.evicted()
    }
}

impl LogSink for LogShipper {
    fn emit(&self, event: LogEvent) {
        LogShipper::emit(self, event);
    }
}

/// Dispatch loop. Owns the dispatcher and the outcome channel.
pub struct ShipperService {
    dispatcher: Dispatcher,
    transport: Arc<dyn Transport>,
    tick_interval: Duration,
    request_timeout: Duration,
    shutdown_timeout: Duration,
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
}

impl ShipperService {
    /// Runs until `cancel` fires, then drains what it can within the shutdown
    /// timeout.
    pub async fn run(mut self, cancel: CancellationToken) {
        if !self.dispatcher.is_active() {
            cancel.cancelled().await;
            return;
        }

        debug!("Log shipper started");
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(outcome) = self.rx.recv() => {
                    self.dispatcher.complete(&outcome);
                }
                _ = ticker.tick() => self.step(),
            }
        }

        self.drain().await;
    }

    /// Runs one dispatch step and starts the transmission if there is one.
    fn step(&mut self) {
        if let Step::Send(payload) = self.dispatcher.begin(Instant::now()) {
            self.spawn_send(payload);
        }
    }

    fn spawn_send(&self, payload: Payload) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        let request_timeout = self.request_timeout;

        tokio::spawn(async move {
            let Payload { url, body, .. } = payload;
            let outcome = match timeout(request_timeout, transport.send(body, &url)).await {
                Ok(outcome) => outcome,
                Err(_) => Outcome::NetworkFailure(format!(
                    "request timed out after {}ms",
                    request_timeout.as_millis()
                )),
            };
            // The receiver only goes away once the service has stopped.
            let _ = tx.send(outcome);
        });
    }

    /// Keeps dispatching until nothing is pending or the shutdown timeout passes.
    async fn drain(&mut self) {
        let deadline = Instant::now() + self.shutdown_timeout;

        let drained = timeout_at(deadline, async {
            loop {
                if self.dispatcher.in_progress() {
                    match self.rx.recv().await {
                        Some(outcome) => {
                            self.dispatcher.complete(&outcome);
                        }
                        None => return,
                    }
                    continue;
                }
                if self.dispatcher.pending_len() == 0 {
                    return;
                }
                self.step();
                if !self.dispatcher.in_progress() {
                    sleep(self.dispatcher.rate_limit_remaining(Instant::now())).await;
                }
            }
        })
        .await;

        let left = self.dispatcher.pending_len() + self.dispatcher.in_flight_len();
        match drained {
            Ok(()) => info!("Log shipper stopped"),
            Err(_) => warn!(
                "Log shipper stopped after {}ms, dropping {left} unsent log records",
                self.shutdown_timeout.as_millis()
            ),
        }
    }
}
