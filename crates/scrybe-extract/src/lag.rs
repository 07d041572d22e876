//! Throughput guard / lag estimator (§4.6 "Throughput guard").

use scrybe_config::RetentionConfig;

/// `projected_lag_hours = pending / max(throughput_per_s, ε) / 3600`.
/// `ε` bounds the estimate away from a division blowup when throughput
/// has not yet been observed.
const EPSILON_THROUGHPUT_PER_S: f64 = 0.001;

pub fn projected_lag_hours(pending: u64, throughput_per_s: f64) -> f64 {
    let throughput = throughput_per_s.max(EPSILON_THROUGHPUT_PER_S);
    pending as f64 / throughput / 3600.0
}

/// `true` when the projected lag crosses the configured warn ratio of
/// the retention horizon (§4.6 "when `projected_lag_hours >
/// retention_horizon_hours * lag_warn_ratio` ... requests an increase
/// of its parallelism cap").
pub fn lag_is_warning(pending: u64, throughput_per_s: f64, retention: &RetentionConfig) -> bool {
    projected_lag_hours(pending, throughput_per_s) > retention.horizon_hours as f64 * retention.lag_warn_ratio
}

/// Parallelism cap that grows under lag pressure but never past the
/// hard ceiling (§4.6 "Hard ceilings are never exceeded").
pub struct ParallelismCap {
    current: usize,
    ceiling: usize,
}

impl ParallelismCap {
    pub fn new(initial: usize, ceiling: usize) -> Self {
        Self { current: initial.min(ceiling).max(1), ceiling }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Request an increase; clamps at the hard ceiling and is a no-op
    /// once already there.
    pub fn request_increase(&mut self) -> usize {
        if self.current < self.ceiling {
            self.current += 1;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retention() -> RetentionConfig {
        RetentionConfig { horizon_hours: 144, lag_warn_ratio: 0.8, max_parallelism_ceiling: 8 }
    }

    #[test]
    fn low_pending_is_not_a_warning() {
        assert!(!lag_is_warning(10, 5.0, &retention()));
    }

    #[test]
    fn high_pending_low_throughput_is_a_warning() {
        // pending=1_000_000 at 1/s => ~277h, well past 144*0.8=115.2h.
        assert!(lag_is_warning(1_000_000, 1.0, &retention()));
    }

    #[test]
    fn zero_throughput_does_not_divide_by_zero() {
        let lag = projected_lag_hours(100, 0.0);
        assert!(lag.is_finite());
        assert!(lag > 0.0);
    }

    #[test]
    fn parallelism_cap_never_exceeds_ceiling() {
        let mut cap = ParallelismCap::new(1, 3);
        for _ in 0..10 {
            cap.request_increase();
        }
        assert_eq!(cap.current(), 3);
    }
}
