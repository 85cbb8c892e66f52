// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration.
//!
//! [`ShipperLayer`] turns every `tracing` event into a [`LogEvent`] and hands it
//! to a [`LogSink`]. Install it next to the usual fmt layer:
//!
//! ```rust,ignore
//! let (shipper, service) = LogShipper::new(ShipperConfig::from_env()?)?;
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(ShipperLayer::new(shipper))
//!     .init();
//! ```
//!
//! Events from the shipper itself and from its HTTP stack are skipped, otherwise
//! every failed POST would be shipped by the next POST.

use std::fmt::{self, Write};

use tracing_core::field::{Field, Visit};
use tracing_core::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::entry::{LogEvent, StackFrame};
use crate::service::LogSink;
use crate::severity::Severity;

const IGNORED_TARGETS: [&str; 5] = ["log_shipper", "reqwest", "hyper", "h2", "rustls"];

pub struct ShipperLayer<K> {
    sink: K,
}

impl<K: LogSink> ShipperLayer<K> {
    pub fn new(sink: K) -> Self {
        Self { sink }
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target
            .strip_prefix(ignored)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

fn severity(level: &Level) -> Severity {
    match *level {
        Level::ERROR => Severity::Error,
        Level::WARN => Severity::Warning,
        _ => Severity::Message,
    }
}

fn frame(metadata: &Metadata<'_>, function: String) -> StackFrame {
    StackFrame::new(
        metadata.file().unwrap_or("<unknown>"),
        metadata.line().unwrap_or(0),
        function,
    )
}

impl<S, K> Layer<S> for ShipperLayer<K>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    K: LogSink + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_ignored(metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut callstack = vec![frame(
            metadata,
            metadata.module_path().unwrap_or(metadata.target()).to_string(),
        )];
        if let Some(scope) = ctx.event_scope(event) {
            callstack.extend(scope.map(|span| {
                let span_metadata = span.metadata();
                frame(
                    span_metadata,
                    format!("{}::{}", span_metadata.target(), span_metadata.name()),
                )
            }));
        }

        self.sink.emit(
            LogEvent::new(severity(metadata.level()), visitor.finish()).with_callstack(callstack),
        );
    }
}

/// Collects the `message` field and renders the others as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn separator(&mut self) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.separator();
            let _ = write!(self.fields, "{}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.separator();
            let _ = write!(self.fields, "{}={:?}", field.name(), value);
        }
    }
}
