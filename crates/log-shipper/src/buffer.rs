// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pending buffer shared between producers and the dispatch loop.
//!
//! The buffer is the single point of mutual exclusion in the pipeline. Producers
//! take the lock only long enough to append; the dispatcher takes it only long
//! enough to extract a batch or put a failed one back. It is never held across
//! a network call.
//!
//! # Memory bound
//!
//! When `max_records` is non-zero the buffer evicts its oldest records once that
//! many are pending, so an unreachable backend cannot grow memory without bound.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::constants;
use crate::entry::LogRecord;
use crate::in_flight::InFlightSet;

#[derive(Debug)]
pub struct PendingBuffer {
    records: Mutex<VecDeque<LogRecord>>,
    max_records: usize,
    evicted: AtomicU64,
}

impl Default for PendingBuffer {
    fn default() -> Self {
        Self::new(constants::DEFAULT_MAX_PENDING_RECORDS)
    }
}

impl PendingBuffer {
    /// Creates a buffer holding at most `max_records` records. `0` disables the cap.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            max_records,
            evicted: AtomicU64::new(0),
        }
    }

    // A producer that panicked mid-append cannot leave a VecDeque half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<LogRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_overflow(&self, records: &mut VecDeque<LogRecord>) -> usize {
        if self.max_records == 0 || records.len() <= self.max_records {
            return 0;
        }
        let overflow = records.len() - self.max_records;
        records.drain(..overflow);
        self.evicted.fetch_add(overflow as u64, Ordering::Relaxed);
        overflow
    }

    /// Appends a record. Never fails; may evict the oldest pending record.
    pub fn enqueue(&self, record: LogRecord) {
        let evicted = {
            let mut records = self.lock();
            records.push_back(record);
            self.evict_overflow(&mut records)
        };
        if evicted > 0 {
            warn!(
                "Pending log buffer full ({} records), dropped {} oldest record(s)",
                self.max_records, evicted
            );
        }
    }

    /// Moves the first `min(len, max)` records, in order, into `in_flight`.
    ///
    /// Returns the number of records moved.
    ///
    /// # Panics
    ///
    /// Panics if `in_flight` is not empty. Only one transmission may be outstanding,
    /// and the dispatcher clears the set before the next extraction.
    pub fn extract_up_to(&self, max: usize, in_flight: &mut InFlightSet) -> usize {
        assert!(
            in_flight.is_empty(),
            "extraction attempted while {} records are still in flight",
            in_flight.len()
        );
        let mut records = self.lock();
        let count = records.len().min(max);
        in_flight.fill(records.drain(..count));
        count
    }

    /// Puts `batch` back ahead of every pending record, keeping its internal order.
    pub fn requeue_front(&self, batch: Vec<LogRecord>) {
        let evicted = {
            let mut records = self.lock();
            for record in batch.into_iter().rev() {
                records.push_front(record);
            }
            self.evict_overflow(&mut records)
        };
        if evicted > 0 {
            warn!(
                "Pending log buffer full ({} records) after requeue, dropped {} oldest record(s)",
                self.max_records, evicted
            );
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total records evicted by the memory bound since creation.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Copy of the pending records, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogEvent;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn record(message: &str) -> LogRecord {
        LogRecord::from_event("s", LogEvent::message(message), false)
    }

    fn messages(records: &[LogRecord]) -> Vec<String> {
        records.iter().map(|r| r.message.clone()).collect()
    }

    #[test]
    fn test_enqueue_keeps_order() {
        let buffer = PendingBuffer::new(0);
        buffer.enqueue(record("a"));
        buffer.enqueue(record("b"));
        assert_eq!(buffer.len(), 2);
        assert_eq!(messages(&buffer.snapshot()), vec!["a", "b"]);
    }

    #[test]
    fn test_extract_up_to_fifo() {
        let buffer = PendingBuffer::new(0);
        for i in 1..=25 {
            buffer.enqueue(record(&i.to_string()));
        }
        let mut in_flight = InFlightSet::new();

        assert_eq!(buffer.extract_up_to(10, &mut in_flight), 10);
        assert_eq!(messages(in_flight.records())[0], "1");
        assert_eq!(messages(in_flight.records())[9], "10");
        in_flight.clear();

        assert_eq!(buffer.extract_up_to(10, &mut in_flight), 10);
        assert_eq!(messages(in_flight.records())[0], "11");
        in_flight.clear();

        assert_eq!(buffer.len(), 5);
        assert_eq!(messages(&buffer.snapshot())[0], "21");
    }

    #[test]
    fn test_extract_fewer_than_max() {
        let buffer = PendingBuffer::new(0);
        buffer.enqueue(record("only"));
        let mut in_flight = InFlightSet::new();
        assert_eq!(buffer.extract_up_to(10, &mut in_flight), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_extract_from_empty() {
        let buffer = PendingBuffer::new(0);
        let mut in_flight = InFlightSet::new();
        assert_eq!(buffer.extract_up_to(10, &mut in_flight), 0);
        assert!(in_flight.is_empty());
    }

    #[test]
    #[should_panic(expected = "still in flight")]
    fn test_extract_with_non_empty_in_flight_panics() {
        let buffer = PendingBuffer::new(0);
        buffer.enqueue(record("a"));
        buffer.enqueue(record("b"));
        let mut in_flight = InFlightSet::new();
        buffer.extract_up_to(1, &mut in_flight);
        buffer.extract_up_to(1, &mut in_flight);
    }

    #[test]
    fn test_requeue_front_restores_order() {
        let buffer = PendingBuffer::new(0);
        for m in ["a", "b", "c"] {
            buffer.enqueue(record(m));
        }
        let mut in_flight = InFlightSet::new();
        buffer.extract_up_to(2, &mut in_flight);
        buffer.enqueue(record("d"));

        buffer.requeue_front(in_flight.take());
        assert_eq!(messages(&buffer.snapshot()), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let buffer = PendingBuffer::new(3);
        for m in ["a", "b", "c", "d", "e"] {
            buffer.enqueue(record(m));
        }
        assert_eq!(messages(&buffer.snapshot()), vec!["c", "d", "e"]);
        assert_eq!(buffer.evicted(), 2);
    }

    #[test]
    fn test_cap_applies_to_requeue() {
        let buffer = PendingBuffer::new(2);
        buffer.enqueue(record("c"));
        buffer.enqueue(record("d"));
        buffer.requeue_front(vec![record("a"), record("b")]);
        assert_eq!(messages(&buffer.snapshot()), vec!["c", "d"]);
        assert_eq!(buffer.evicted(), 2);
    }

    #[test]
    fn test_concurrent_producers() {
        let buffer = Arc::new(PendingBuffer::new(0));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..250 {
                        buffer.enqueue(record(&format!("{t}-{i}")));
                    }
                })
            })
            .collect();

        let mut in_flight = InFlightSet::new();
        let mut drained = 0;
        for _ in 0..50 {
            drained += buffer.extract_up_to(10, &mut in_flight);
            in_flight.clear();
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(drained + buffer.len(), 1000);

        // Each producer's records stay in emission order.
        let remaining = buffer.snapshot();
        for t in 0..4 {
            let prefix = format!("{t}-");
            let seq: Vec<u32> = remaining
                .iter()
                .filter_map(|r| r.message.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert!(seq.windows(2).all(|w| w[0] < w[1]));
        }
    }

    proptest! {
        // Interleaving enqueues, extractions and requeues never loses, duplicates or
        // reorders records.
        #[test]
        fn prop_extract_and_requeue_preserve_order(ops in proptest::collection::vec((0u8..3, 1usize..5), 1..60)) {
            let buffer = PendingBuffer::new(0);
            let mut in_flight = InFlightSet::new();
            let mut next = 0u32;
            let mut delivered: Vec<String> = Vec::new();

            for (op, n) in ops {
                match op {
                    0 => {
                        for _ in 0..n {
                            buffer.enqueue(record(&next.to_string()));
                            next += 1;
                        }
                    }
                    1 => {
                        if in_flight.is_empty() {
                            let taken = buffer.extract_up_to(n, &mut in_flight);
                            prop_assert!(taken <= n);
                        } else {
                            delivered.extend(messages(&in_flight.take()));
                        }
                    }
                    _ => {
                        if !in_flight.is_empty() {
                            buffer.requeue_front(in_flight.take());
                        }
                    }
                }
            }

            let mut all = delivered;
            all.extend(messages(in_flight.records()));
            all.extend(messages(&buffer.snapshot()));
            let expected: Vec<String> = (0..next).map(|i| i.to_string()).collect();
            prop_assert_eq!(all, expected);
        }
    }
}
