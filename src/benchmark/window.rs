//! Sampling window aggregation
//!
//! Frame durations are accumulated since the last flush. Every window interval
//! of wall-clock time one [`AggregatedRecord`] is emitted and the accumulators
//! reset. Incomplete windows are never emitted.

use serde::{Deserialize, Serialize};

use super::stager::Stage;

/// Aggregated statistics for one sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    /// Seconds since the start of the measured run
    pub elapsed_secs: f64,
    /// 1-based stage number
    pub stage: u32,
    pub workload_size: u64,
    /// `frames / total frame time`
    pub avg_fps: f64,
    /// Reciprocal of the slowest frame in the window
    pub min_fps: f64,
}

#[derive(Debug, Clone)]
pub struct SamplingWindowAggregator {
    interval_secs: f64,
    last_flush_secs: f64,
    sample_count: u64,
    total_secs: f64,
    worst_secs: f64,
}

impl SamplingWindowAggregator {
    /// `started_at_secs` is the wall-clock reading the first window is measured from.
    pub fn new(interval_secs: f64, started_at_secs: f64) -> Self {
        Self {
            interval_secs,
            last_flush_secs: started_at_secs,
            sample_count: 0,
            total_secs: 0.0,
            worst_secs: 0.0,
        }
    }

    /// Add one frame duration in seconds. Non-finite or non-positive durations
    /// carry no rate information and are ignored.
    pub fn observe(&mut self, frame_secs: f64) {
        if !frame_secs.is_finite() || frame_secs <= 0.0 {
            return;
        }
        self.sample_count += 1;
        self.total_secs += frame_secs;
        self.worst_secs = self.worst_secs.max(frame_secs);
    }

    /// Emit a record when at least one interval has passed since the last flush.
    ///
    /// A due window without samples is not emitted; accumulation continues
    /// until a frame arrives.
    pub fn flush_if_due(
        &mut self,
        now_secs: f64,
        elapsed_secs: f64,
        stage: Stage,
    ) -> Option<AggregatedRecord> {
        if now_secs - self.last_flush_secs < self.interval_secs {
            return None;
        }
        if self.sample_count == 0 {
            return None;
        }

        let record = AggregatedRecord {
            elapsed_secs,
            stage: u32::try_from(stage.index + 1).unwrap_or(u32::MAX),
            workload_size: stage.workload_size,
            avg_fps: self.sample_count as f64 / self.total_secs,
            min_fps: 1.0 / self.worst_secs,
        };

        self.reset(now_secs);
        Some(record)
    }

    /// Drop the partially accumulated window.
    pub fn discard(&mut self, now_secs: f64) {
        self.reset(now_secs);
    }

    pub fn pending_samples(&self) -> u64 {
        self.sample_count
    }

    fn reset(&mut self, now_secs: f64) {
        self.last_flush_secs = now_secs;
        self.sample_count = 0;
        self.total_secs = 0.0;
        self.worst_secs = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    const STAGE: Stage = Stage {
        index: 2,
        workload_size: 32_000,
    };

    #[test]
    fn no_record_before_any_observation() {
        let mut window = SamplingWindowAggregator::new(0.5, 0.0);
        assert!(window.flush_if_due(0.0, 0.0, STAGE).is_none());
        assert!(window.flush_if_due(0.6, 0.6, STAGE).is_none());
        assert!(window.flush_if_due(5.0, 5.0, STAGE).is_none());
    }

    #[test]
    fn no_partial_flush_before_interval() {
        let mut window = SamplingWindowAggregator::new(0.5, 0.0);
        window.observe(0.01);
        assert!(window.flush_if_due(0.49, 0.49, STAGE).is_none());
        assert_eq!(window.pending_samples(), 1);
    }

    #[test]
    fn record_uses_total_time_and_worst_frame() {
        let mut window = SamplingWindowAggregator::new(0.5, 1.0);
        for frame in [0.010, 0.020, 0.010, 0.040] {
            window.observe(frame);
        }
        let record = window.flush_if_due(1.5, 0.5, STAGE).unwrap();

        assert_eq!(record.stage, 3);
        assert_eq!(record.workload_size, 32_000);
        assert_eq!(record.elapsed_secs, 0.5);
        assert!((record.avg_fps - 4.0 / 0.080).abs() < 1e-9);
        assert!((record.min_fps - 25.0).abs() < 1e-9);
        assert_eq!(window.pending_samples(), 0);
    }

    #[test]
    fn stalled_window_extends_until_a_sample_arrives() {
        let mut window = SamplingWindowAggregator::new(0.5, 0.0);
        assert!(window.flush_if_due(0.7, 0.7, STAGE).is_none());

        window.observe(0.9);
        let record = window.flush_if_due(0.9, 0.9, STAGE).unwrap();
        assert!((record.avg_fps - 1.0 / 0.9).abs() < 1e-9);

        // Next window is measured from the flush, not the first origin.
        window.observe(0.01);
        assert!(window.flush_if_due(1.3, 1.3, STAGE).is_none());
        assert!(window.flush_if_due(1.5, 1.5, STAGE).is_some());
    }

    #[test]
    fn discard_drops_pending_samples() {
        let mut window = SamplingWindowAggregator::new(0.5, 0.0);
        window.observe(0.01);
        window.observe(0.02);
        window.discard(0.3);
        assert_eq!(window.pending_samples(), 0);
        assert!(window.flush_if_due(0.9, 0.9, STAGE).is_none());
    }

    #[test]
    fn invalid_durations_are_ignored() {
        let mut window = SamplingWindowAggregator::new(0.5, 0.0);
        window.observe(0.0);
        window.observe(-1.0);
        window.observe(f64::NAN);
        window.observe(f64::INFINITY);
        assert_eq!(window.pending_samples(), 0);
    }

    #[quickcheck]
    fn avg_and_min_follow_sum_of_durations(raw: Vec<u16>) -> TestResult {
        if raw.is_empty() {
            return TestResult::discard();
        }
        // 0.1 ms .. ~6.6 s frames
        let durations: Vec<f64> = raw.iter().map(|v| (*v as f64 + 1.0) * 1e-4).collect();

        let mut window = SamplingWindowAggregator::new(0.5, 0.0);
        for d in &durations {
            window.observe(*d);
        }
        let record = match window.flush_if_due(0.5, 0.5, STAGE) {
            Some(record) => record,
            None => return TestResult::failed(),
        };

        let sum: f64 = durations.iter().sum();
        let worst = durations.iter().cloned().fold(f64::MIN, f64::max);
        let expected_avg = durations.len() as f64 / sum;
        let expected_min = 1.0 / worst;

        TestResult::from_bool(
            (record.avg_fps - expected_avg).abs() <= 1e-9 * expected_avg
                && record.min_fps == expected_min,
        )
    }
}
