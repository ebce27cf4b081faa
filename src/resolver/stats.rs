//! Pass- and batch-scoped outcome counters.
//!
//! The counters are plain values threaded through the driver loop, reset at
//! the start of every pass, so each pass is independently observable and
//! nothing leaks across passes.

use crate::resolver::outcome::LookupOutcome;

/// Outcome counts for one dispatched batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchTally {
    pub size: usize,
    pub hits: usize,
    pub misses: usize,
    pub timeouts: usize,
    pub connection_errors: usize,
    pub implausible_coordinates: usize,
    pub implausible_ranges: usize,
}

impl BatchTally {
    pub fn record(&mut self, outcome: &LookupOutcome) {
        self.size += 1;
        match outcome {
            LookupOutcome::Hit { .. } => self.hits += 1,
            LookupOutcome::Miss => self.misses += 1,
            LookupOutcome::Timeout => self.timeouts += 1,
            LookupOutcome::ConnectionError => self.connection_errors += 1,
            LookupOutcome::ImplausibleCoordinate { .. } => self.implausible_coordinates += 1,
            LookupOutcome::ImplausibleRange { .. } => self.implausible_ranges += 1,
        }
    }
}

/// Cumulative counters for one pass over the store or the pending set.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    pub hits: u64,
    pub misses: u64,
    pub timeouts: u64,
    pub connection_errors: u64,
    pub implausible_coordinates: u64,
    pub implausible_ranges: u64,
    /// Seconds spent sleeping between batches this pass.
    pub throttle_secs: u64,
}

impl PassStats {
    pub fn absorb(&mut self, tally: &BatchTally) {
        self.hits += tally.hits as u64;
        self.misses += tally.misses as u64;
        self.timeouts += tally.timeouts as u64;
        self.connection_errors += tally.connection_errors as u64;
        self.implausible_coordinates += tally.implausible_coordinates as u64;
        self.implausible_ranges += tally.implausible_ranges as u64;
    }

    /// Records visited so far this pass, resolved or not.
    pub fn visited(&self) -> u64 {
        self.hits
            + self.misses
            + self.timeouts
            + self.connection_errors
            + self.implausible_coordinates
            + self.implausible_ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_each_variant() {
        let mut tally = BatchTally::default();
        tally.record(&LookupOutcome::Hit {
            lat: 1.0,
            lon: 2.0,
            range_m: 3,
        });
        tally.record(&LookupOutcome::Miss);
        tally.record(&LookupOutcome::Miss);
        tally.record(&LookupOutcome::Timeout);
        tally.record(&LookupOutcome::ConnectionError);
        tally.record(&LookupOutcome::ImplausibleCoordinate {
            lat: 99.0,
            lon: 0.0,
            range_m: 0,
        });

        assert_eq!(tally.size, 6);
        assert_eq!(tally.hits, 1);
        assert_eq!(tally.misses, 2);
        assert_eq!(tally.timeouts, 1);
        assert_eq!(tally.connection_errors, 1);
        assert_eq!(tally.implausible_coordinates, 1);
        assert_eq!(tally.implausible_ranges, 0);
    }

    #[test]
    fn stats_absorb_batches() {
        let mut tally = BatchTally::default();
        tally.record(&LookupOutcome::Miss);
        tally.record(&LookupOutcome::Timeout);

        let mut stats = PassStats::default();
        stats.absorb(&tally);
        stats.absorb(&tally);

        assert_eq!(stats.misses, 2);
        assert_eq!(stats.timeouts, 2);
        assert_eq!(stats.visited(), 4);
    }
}
