use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Branch histories are bounded; the oldest outcome is evicted beyond this many entries.
pub const BRANCH_HISTORY_LIMIT: usize = 32;

/// Wall-clock execution record for one procedure. All times in nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRecord {
    pub count: u64,
    pub total_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub last_ns: u64,
}

impl ExecRecord {
    pub fn record(&mut self, elapsed: Duration) {
        let ns = elapsed.as_nanos() as u64;
        if self.count == 0 {
            self.min_ns = ns;
            self.max_ns = ns;
        } else {
            self.min_ns = self.min_ns.min(ns);
            self.max_ns = self.max_ns.max(ns);
        }
        self.count += 1;
        self.total_ns = self.total_ns.saturating_add(ns);
        self.last_ns = ns;
    }

    pub fn mean_ns(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.count as f64
        }
    }
}

/// Taken/not-taken counts plus a bounded outcome history for one branch site.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub taken: u64,
    pub not_taken: u64,
    pub history: VecDeque<bool>,
}

impl BranchRecord {
    pub fn record(&mut self, taken: bool) {
        if taken {
            self.taken += 1;
        } else {
            self.not_taken += 1;
        }
        if self.history.len() == BRANCH_HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(taken);
    }

    pub fn total(&self) -> u64 {
        self.taken + self.not_taken
    }

    /// max(taken ratio, not-taken ratio); in [0.5, 1.0] once any outcome is recorded.
    pub fn predictability(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let ratio = self.taken as f64 / total as f64;
        ratio.max(1.0 - ratio)
    }
}

/// Iteration statistics for one loop site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopRecord {
    pub entries: u64,
    pub total_iterations: u64,
}

impl LoopRecord {
    pub fn record(&mut self, iterations: u64) {
        self.entries += 1;
        self.total_iterations = self.total_iterations.saturating_add(iterations);
    }

    pub fn mean_iterations(&self) -> f64 {
        if self.entries == 0 {
            0.0
        } else {
            self.total_iterations as f64 / self.entries as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_history_is_bounded() {
        let mut rec = BranchRecord::default();
        for _ in 0..BRANCH_HISTORY_LIMIT + 8 {
            rec.record(true);
        }
        assert_eq!(rec.history.len(), BRANCH_HISTORY_LIMIT);
        assert_eq!(rec.taken, (BRANCH_HISTORY_LIMIT + 8) as u64);
        assert_eq!(rec.predictability(), 1.0);
    }

    #[test]
    fn predictability_stays_in_range_after_mixed_outcomes() {
        let mut rec = BranchRecord::default();
        rec.record(true);
        rec.record(false);
        rec.record(true);
        let p = rec.predictability();
        assert!((0.5..=1.0).contains(&p));
    }

    #[test]
    fn exec_record_tracks_min_and_max() {
        let mut rec = ExecRecord::default();
        rec.record(Duration::from_nanos(50));
        rec.record(Duration::from_nanos(10));
        rec.record(Duration::from_nanos(90));
        assert_eq!(rec.count, 3);
        assert_eq!(rec.min_ns, 10);
        assert_eq!(rec.max_ns, 90);
        assert_eq!(rec.last_ns, 90);
        assert_eq!(rec.total_ns, 150);
    }
}
