// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::entry::LogRecord;

/// Records extracted for the transmission currently outstanding.
///
/// Empty whenever no transmission is outstanding. Non-empty means exactly one
/// request is in flight and these records are exclusively owned by it until it
/// resolves.
#[derive(Debug, Default)]
pub struct InFlightSet {
    records: Vec<LogRecord>,
}

impl InFlightSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub(crate) fn fill(&mut self, records: impl IntoIterator<Item = LogRecord>) {
        self.records.extend(records);
    }

    /// Moves every record out, leaving the set empty.
    pub fn take(&mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
