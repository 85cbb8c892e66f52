// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log events, their wire records, and batch encoding.
//!
//! Producers emit [`LogEvent`]s. Admitted events are converted once into
//! immutable [`LogRecord`]s, which are what the buffer holds and what goes on the
//! wire. A [`Batch`] of records is encoded as:
//!
//! ```json
//! { "logName": "<session>", "entries": [
//!   { "sessionId": "<session>", "message": "...", "severity": 500,
//!     "sourceLocation": { "file": "...", "line": "42", "function": "..." },
//!     "callStack": [ { "file": "...", "line": "42", "function": "..." } ] } ] }
//! ```
//!
//! Absent optionals are written as `null`, never omitted.

use serde::{Deserialize, Serialize};

use crate::errors::ShipperError;
use crate::severity::Severity;

/// One frame of the emitting code's call stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }

    /// Frame for a method, rendered as `DeclaringType.method(parameters)`.
    pub fn method(
        file: impl Into<String>,
        line: u32,
        declaring_type: &str,
        method: &str,
        parameters: &str,
    ) -> Self {
        Self::new(file, line, format!("{declaring_type}.{method}({parameters})"))
    }
}

/// A log event as emitted by application code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    pub message: String,
    pub severity: Severity,
    /// Innermost frame first.
    pub callstack: Vec<StackFrame>,
}

impl LogEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            callstack: Vec::new(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(Severity::Message, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    #[must_use]
    pub fn with_callstack(mut self, callstack: Vec<StackFrame>) -> Self {
        self.callstack = callstack;
        self
    }
}

/// Wire form of a stack frame. The line number travels as a string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: String,
    pub function: String,
}

impl From<&StackFrame> for SourceLocation {
    fn from(frame: &StackFrame) -> Self {
        Self {
            file: frame.file.clone(),
            line: frame.line.to_string(),
            function: frame.function.clone(),
        }
    }
}

/// A buffered, immutable log record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub session_id: String,
    pub message: String,
    pub severity: Severity,
    pub source_location: Option<SourceLocation>,
    pub call_stack: Option<Vec<SourceLocation>>,
}

impl LogRecord {
    /// Builds the record for an admitted event.
    ///
    /// The first frame, if any, becomes the source location. The complete stack is
    /// kept only when `include_callstack` is set.
    #[must_use]
    pub fn from_event(session_id: &str, event: LogEvent, include_callstack: bool) -> Self {
        let source_location = event.callstack.first().map(SourceLocation::from);
        let call_stack = include_callstack
            .then(|| event.callstack.iter().map(SourceLocation::from).collect());
        Self {
            session_id: session_id.to_string(),
            message: event.message,
            severity: event.severity,
            source_location,
            call_stack,
        }
    }
}

/// An ordered group of records sent in one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub log_name: String,
    pub entries: Vec<LogRecord>,
}

impl Batch {
    pub fn new(log_name: impl Into<String>, entries: Vec<LogRecord>) -> Self {
        Self {
            log_name: log_name.into(),
            entries,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRef<'a> {
    log_name: &'a str,
    entries: &'a [LogRecord],
}

/// Serializes a batch into the request body.
///
/// Output is deterministic for a given batch.
///
/// # Errors
///
/// Returns [`ShipperError::Encode`] if serialization fails.
pub fn encode(batch: &Batch) -> Result<Vec<u8>, ShipperError> {
    encode_records(&batch.log_name, &batch.entries)
}

/// Same as [`encode`], for records that are not owned by a [`Batch`].
///
/// # Errors
///
/// Returns [`ShipperError::Encode`] if serialization fails.
pub fn encode_records(log_name: &str, entries: &[LogRecord]) -> Result<Vec<u8>, ShipperError> {
    Ok(serde_json::to_vec(&BatchRef { log_name, entries })?)
}
