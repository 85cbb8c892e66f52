// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Severity filtering.
//!
//! Two independent thresholds gate every emitted event:
//! - [`LogSeverityLevel`] decides whether the event is admitted into the buffer at all.
//! - [`IncludeCallstackMode`] decides whether its full call stack is serialized.
//!
//! Both are ordered floors over `Message < Warning < Error`, so each check is a
//! single comparison against [`Severity`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ShipperError;

/// Severity of a log event, carrying the numeric code the backend expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Message,
    Warning,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Severity::Message => 200,
            Severity::Warning => 400,
            Severity::Error => 500,
        }
    }

    /// Maps a wire code back to a severity.
    ///
    /// # Errors
    ///
    /// Returns [`ShipperError::UnsupportedSeverity`] for any code other than 200, 400 or 500.
    pub fn from_code(code: i32) -> Result<Self, ShipperError> {
        match code {
            200 => Ok(Severity::Message),
            400 => Ok(Severity::Warning),
            500 => Ok(Severity::Error),
            other => Err(ShipperError::UnsupportedSeverity(other)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Message => write!(f, "message"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = i32::deserialize(deserializer)?;
        Severity::from_code(code).map_err(serde::de::Error::custom)
    }
}

/// Which events are admitted into the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogSeverityLevel {
    #[default]
    AllMessages,
    WarningsAndErrorsOnly,
    ErrorsOnly,
    None,
}

impl LogSeverityLevel {
    /// Lowest severity admitted, `None` when nothing is.
    #[must_use]
    pub const fn floor(self) -> Option<Severity> {
        match self {
            LogSeverityLevel::AllMessages => Some(Severity::Message),
            LogSeverityLevel::WarningsAndErrorsOnly => Some(Severity::Warning),
            LogSeverityLevel::ErrorsOnly => Some(Severity::Error),
            LogSeverityLevel::None => None,
        }
    }
}

/// Which events carry their full call stack.
///
/// The first frame is always sent as the source location; this only controls
/// the complete stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IncludeCallstackMode {
    Always,
    WarningsAndErrorsOnly,
    #[default]
    ErrorsOnly,
    Never,
}

impl IncludeCallstackMode {
    #[must_use]
    pub const fn floor(self) -> Option<Severity> {
        match self {
            IncludeCallstackMode::Always => Some(Severity::Message),
            IncludeCallstackMode::WarningsAndErrorsOnly => Some(Severity::Warning),
            IncludeCallstackMode::ErrorsOnly => Some(Severity::Error),
            IncludeCallstackMode::Never => None,
        }
    }
}

fn at_or_above(severity: Severity, floor: Option<Severity>) -> bool {
    floor.is_some_and(|floor| severity >= floor)
}

/// Returns whether an event of `severity` may enter the buffer.
#[must_use]
pub fn admit(severity: Severity, level: LogSeverityLevel) -> bool {
    at_or_above(severity, level.floor())
}

/// Returns whether an event of `severity` carries its full call stack.
#[must_use]
pub fn attach_callstack(severity: Severity, mode: IncludeCallstackMode) -> bool {
    at_or_above(severity, mode.floor())
}

// "WarningsAndErrorsOnly", "warnings_and_errors_only" and "warnings-and-errors-only"
// all normalize to the same key.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for LogSeverityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "allmessages" | "all" => Ok(LogSeverityLevel::AllMessages),
            "warningsanderrorsonly" => Ok(LogSeverityLevel::WarningsAndErrorsOnly),
            "errorsonly" => Ok(LogSeverityLevel::ErrorsOnly),
            "none" => Ok(LogSeverityLevel::None),
            _ => Err(format!(
                "Invalid log severity level: '{s}'. Valid levels are: all_messages, warnings_and_errors_only, errors_only, none",
            )),
        }
    }
}

impl FromStr for IncludeCallstackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "always" => Ok(IncludeCallstackMode::Always),
            "warningsanderrorsonly" => Ok(IncludeCallstackMode::WarningsAndErrorsOnly),
            "errorsonly" => Ok(IncludeCallstackMode::ErrorsOnly),
            "never" => Ok(IncludeCallstackMode::Never),
            _ => Err(format!(
                "Invalid callstack mode: '{s}'. Valid modes are: always, warnings_and_errors_only, errors_only, never",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL: [Severity; 3] = [Severity::Message, Severity::Warning, Severity::Error];

    #[test]
    fn test_severity_codes() {
        assert_eq!(Severity::Message.code(), 200);
        assert_eq!(Severity::Warning.code(), 400);
        assert_eq!(Severity::Error.code(), 500);
        for severity in ALL {
            assert_eq!(Severity::from_code(severity.code()).unwrap(), severity);
        }
    }

    #[test]
    fn test_unsupported_severity() {
        assert!(matches!(
            Severity::from_code(300),
            Err(ShipperError::UnsupportedSeverity(300))
        ));
        assert!(serde_json::from_value::<Severity>(json!(100)).is_err());
    }

    #[test]
    fn test_admit_all_messages() {
        for severity in ALL {
            assert!(admit(severity, LogSeverityLevel::AllMessages));
        }
    }

    #[test]
    fn test_admit_warnings_and_errors_only() {
        assert!(!admit(Severity::Message, LogSeverityLevel::WarningsAndErrorsOnly));
        assert!(admit(Severity::Warning, LogSeverityLevel::WarningsAndErrorsOnly));
        assert!(admit(Severity::Error, LogSeverityLevel::WarningsAndErrorsOnly));
    }

    #[test]
    fn test_admit_errors_only() {
        assert!(!admit(Severity::Message, LogSeverityLevel::ErrorsOnly));
        assert!(!admit(Severity::Warning, LogSeverityLevel::ErrorsOnly));
        assert!(admit(Severity::Error, LogSeverityLevel::ErrorsOnly));
    }

    #[test]
    fn test_admit_none_rejects_everything() {
        for severity in ALL {
            assert!(!admit(severity, LogSeverityLevel::None));
        }
    }

    #[test]
    fn test_attach_callstack_modes() {
        for severity in ALL {
            assert!(attach_callstack(severity, IncludeCallstackMode::Always));
            assert!(!attach_callstack(severity, IncludeCallstackMode::Never));
        }
        assert!(!attach_callstack(
            Severity::Message,
            IncludeCallstackMode::WarningsAndErrorsOnly
        ));
        assert!(attach_callstack(
            Severity::Warning,
            IncludeCallstackMode::WarningsAndErrorsOnly
        ));
        assert!(!attach_callstack(
            Severity::Warning,
            IncludeCallstackMode::ErrorsOnly
        ));
        assert!(attach_callstack(Severity::Error, IncludeCallstackMode::ErrorsOnly));
    }

    #[test]
    fn test_thresholds_are_independent() {
        // Admitted without stack, and the other way around.
        assert!(admit(Severity::Message, LogSeverityLevel::AllMessages));
        assert!(!attach_callstack(Severity::Message, IncludeCallstackMode::Never));
        assert!(!admit(Severity::Warning, LogSeverityLevel::ErrorsOnly));
        assert!(attach_callstack(Severity::Warning, IncludeCallstackMode::Always));
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(
            "AllMessages".parse::<LogSeverityLevel>().unwrap(),
            LogSeverityLevel::AllMessages
        );
        assert_eq!(
            "warnings_and_errors_only".parse::<LogSeverityLevel>().unwrap(),
            LogSeverityLevel::WarningsAndErrorsOnly
        );
        assert_eq!(
            "errors-only".parse::<LogSeverityLevel>().unwrap(),
            LogSeverityLevel::ErrorsOnly
        );
        assert_eq!(
            "NONE".parse::<LogSeverityLevel>().unwrap(),
            LogSeverityLevel::None
        );
        assert!("verbose".parse::<LogSeverityLevel>().is_err());
    }

    #[test]
    fn test_parse_callstack_modes() {
        assert_eq!(
            "always".parse::<IncludeCallstackMode>().unwrap(),
            IncludeCallstackMode::Always
        );
        assert_eq!(
            "WarningsAndErrorsOnly".parse::<IncludeCallstackMode>().unwrap(),
            IncludeCallstackMode::WarningsAndErrorsOnly
        );
        assert_eq!(
            "Never".parse::<IncludeCallstackMode>().unwrap(),
            IncludeCallstackMode::Never
        );
        assert!("sometimes".parse::<IncludeCallstackMode>().is_err());
    }
}
