//! Run-wide shared state between worker threads
//!
//! Each logical resource has its own lock: the aggregate store and the
//! occurrence counter never block each other.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::analysis::MatchOutcome;

/// Image id -> outcomes, in merge order
pub type ResultMap = BTreeMap<String, Vec<MatchOutcome>>;

/// Append-only store of job outcomes keyed by image id
#[derive(Debug, Default)]
pub struct AggregateStore {
    results: Mutex<ResultMap>,
    merges: AtomicUsize,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one job's outcomes under its image id.
    ///
    /// Existing outcomes for the same id are kept; the new ones are added
    /// after them.
    pub fn merge(&self, image_id: &str, outcomes: Vec<MatchOutcome>) {
        {
            let mut results = self.results.lock();
            results
                .entry(image_id.to_string())
                .or_default()
                .extend(outcomes);
        }
        self.merges.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of merges performed (one per job that ran)
    pub fn merge_count(&self) -> usize {
        self.merges.load(Ordering::Acquire)
    }

    /// Total number of outcomes stored
    pub fn outcome_count(&self) -> usize {
        self.results.lock().values().map(Vec::len).sum()
    }

    /// Take the collected results. Call only after the worker pool has
    /// been joined.
    pub fn into_results(self) -> ResultMap {
        self.results.into_inner()
    }

    /// Copy of the collected results
    pub fn snapshot(&self) -> ResultMap {
        self.results.lock().clone()
    }
}

/// Global count of identical recognized strings
#[derive(Debug, Default)]
pub struct OccurrenceCounter {
    counts: Mutex<HashMap<String, usize>>,
}

impl OccurrenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more sighting of `text` and return the updated total.
    /// Empty text is not counted and yields 0.
    pub fn record(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let mut counts = self.counts.lock();
        let count = counts.entry(text.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}
