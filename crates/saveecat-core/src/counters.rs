//! Run progress counters, stored as JSONB on the run row.

use serde::{Deserialize, Serialize};

/// Progress counters for one run. `found` counts every item pulled from the
/// extractor; `uploaded` counts items persisted by this run; `skipped`
/// counts known items; `errors` counts per-item failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub found: i64,
    pub uploaded: i64,
    pub skipped: i64,
    pub errors: i64,
}

impl RunCounters {
    pub fn record_found(&mut self) {
        self.found += 1;
    }

    pub fn record_uploaded(&mut self) {
        self.uploaded += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Replaces the in-memory upload tally with the persisted truth at run
    /// completion. Concurrent runs over overlapping listings make the
    /// in-memory count drift; the store is authoritative.
    ///
    /// After reconciling, `uploaded` equals `persisted` and `skipped` is
    /// recomputed as `found - uploaded`, floored at zero.
    pub fn reconcile(&mut self, persisted: i64) {
        self.uploaded = persisted;
        self.skipped = (self.found - self.uploaded).max(0);
    }
}
