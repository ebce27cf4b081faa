//! Adaptive inter-batch throttling.
//!
//! There is no explicit request-rate limiter anywhere in the engine; the
//! sole backpressure mechanism is the delay this controller derives from
//! per-batch failure density. A saturated delay in direct mode is the
//! signature of an upstream ban and flips the pass into proxy mode.

use crate::resolver::stats::BatchTally;
use std::time::Duration;

/// Direct-mode delay, in seconds, at which the pass switches to proxies.
const PROXY_SWITCH_THRESHOLD_SECS: u64 = 30;

#[derive(Debug)]
pub struct BackoffController {
    delay_secs: u64,
    switch_threshold_secs: u64,
}

impl Default for BackoffController {
    fn default() -> Self {
        Self::new(PROXY_SWITCH_THRESHOLD_SECS)
    }
}

impl BackoffController {
    pub fn new(switch_threshold_secs: u64) -> Self {
        Self {
            delay_secs: 0,
            switch_threshold_secs,
        }
    }

    /// Current inter-batch delay.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn delay_secs(&self) -> u64 {
        self.delay_secs
    }

    /// Folds one batch's outcome counts into the delay and reports whether
    /// the pass must switch to proxy mode now.
    ///
    /// The delay grows by one second when the batch shows total connectivity
    /// failure or a full-ban signature (direct mode), or when at least half
    /// the egress identities failed at the transport level (proxy mode);
    /// otherwise it shrinks by one second, floored at zero. In direct mode a
    /// delay reaching the threshold resets to zero and signals the switch --
    /// at the threshold exactly, not before.
    pub fn observe(&mut self, tally: &BatchTally, proxy_mode: bool) -> bool {
        if tally.size == 0 {
            return false;
        }

        let transport_failures = tally.timeouts + tally.connection_errors;
        let qualifying = if proxy_mode {
            tally.connection_errors * 2 >= tally.size
        } else {
            transport_failures == tally.size || tally.misses == tally.size
        };

        if qualifying {
            self.delay_secs += 1;
        } else {
            self.delay_secs = self.delay_secs.saturating_sub(1);
        }

        if !proxy_mode && self.delay_secs >= self.switch_threshold_secs {
            self.delay_secs = 0;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_failure(size: usize) -> BatchTally {
        BatchTally {
            size,
            timeouts: size / 2,
            connection_errors: size - size / 2,
            ..BatchTally::default()
        }
    }

    fn all_misses(size: usize) -> BatchTally {
        BatchTally {
            size,
            misses: size,
            ..BatchTally::default()
        }
    }

    fn healthy(size: usize) -> BatchTally {
        BatchTally {
            size,
            hits: size,
            ..BatchTally::default()
        }
    }

    #[test]
    fn thirty_failing_batches_drive_the_switch_exactly_at_threshold() {
        let mut backoff = BackoffController::default();

        for batch in 1..=29 {
            let switched = backoff.observe(&total_failure(8), false);
            assert!(!switched, "must not switch after batch {batch}");
            assert_eq!(backoff.delay_secs(), batch);
        }

        assert!(backoff.observe(&total_failure(8), false));
        assert_eq!(backoff.delay_secs(), 0, "switch resets the delay");
    }

    #[test]
    fn full_miss_batches_count_as_ban_signature_in_direct_mode() {
        let mut backoff = BackoffController::default();
        assert!(!backoff.observe(&all_misses(16), false));
        assert_eq!(backoff.delay_secs(), 1);
    }

    #[test]
    fn partial_failure_decrements_toward_zero() {
        let mut backoff = BackoffController::default();
        backoff.observe(&total_failure(8), false);
        backoff.observe(&total_failure(8), false);
        assert_eq!(backoff.delay_secs(), 2);

        let mut mixed = all_misses(8);
        mixed.misses = 7;
        mixed.hits = 1;
        backoff.observe(&mixed, false);
        assert_eq!(backoff.delay_secs(), 1);

        backoff.observe(&healthy(8), false);
        backoff.observe(&healthy(8), false);
        assert_eq!(backoff.delay_secs(), 0, "delay floors at zero");
    }

    #[test]
    fn proxy_mode_reacts_to_half_banned_identities() {
        let mut backoff = BackoffController::default();
        let tally = BatchTally {
            size: 8,
            connection_errors: 4,
            misses: 4,
            ..BatchTally::default()
        };
        assert!(!backoff.observe(&tally, true));
        assert_eq!(backoff.delay_secs(), 1);

        let below_half = BatchTally {
            size: 8,
            connection_errors: 3,
            misses: 5,
            ..BatchTally::default()
        };
        backoff.observe(&below_half, true);
        assert_eq!(backoff.delay_secs(), 0);
    }

    #[test]
    fn proxy_mode_never_switches() {
        let mut backoff = BackoffController::new(2);
        for _ in 0..10 {
            assert!(!backoff.observe(
                &BatchTally {
                    size: 4,
                    connection_errors: 4,
                    ..BatchTally::default()
                },
                true,
            ));
        }
        assert_eq!(backoff.delay_secs(), 10);
    }

    #[test]
    fn full_miss_batches_do_not_qualify_in_proxy_mode() {
        let mut backoff = BackoffController::default();
        backoff.observe(&total_failure(8), true);
        assert_eq!(backoff.delay_secs(), 1);
        backoff.observe(&all_misses(8), true);
        assert_eq!(backoff.delay_secs(), 0);
    }

    #[test]
    fn empty_batch_is_ignored() {
        let mut backoff = BackoffController::default();
        assert!(!backoff.observe(&BatchTally::default(), false));
        assert_eq!(backoff.delay_secs(), 0);
    }
}
