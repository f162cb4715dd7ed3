//! Workload staging
//!
//! A test is split into fixed-length stages; each stage holds one workload size
//! from the schedule. Once the schedule is exhausted the last stage persists for
//! the remainder of the test.

/// Active stage for a point in test time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// 0-based position in the schedule
    pub index: usize,
    pub workload_size: u64,
}

#[derive(Debug, Clone)]
pub struct WorkloadStager {
    schedule: Vec<u64>,
    stage_duration_secs: f64,
}

impl WorkloadStager {
    /// `schedule` must be non-empty and `stage_duration_secs` positive; both are
    /// checked by `TestConfig::validate`.
    pub fn new(schedule: Vec<u64>, stage_duration_secs: f64) -> Self {
        debug_assert!(!schedule.is_empty());
        debug_assert!(stage_duration_secs > 0.0);
        Self {
            schedule,
            stage_duration_secs,
        }
    }

    pub fn current_stage(&self, elapsed_secs: f64) -> Stage {
        let last = self.schedule.len().saturating_sub(1);
        let raw = (elapsed_secs.max(0.0) / self.stage_duration_secs).floor();
        // Float-to-int casts saturate, so very long runs clamp instead of wrapping.
        let index = (raw as usize).min(last);
        Stage {
            index,
            workload_size: self.schedule.get(index).copied().unwrap_or_default(),
        }
    }

    pub fn first_stage(&self) -> Stage {
        self.current_stage(0.0)
    }
}

/// Remembers the last observed stage so callers regenerate exactly once per
/// transition.
#[derive(Debug, Default)]
pub struct StageTracker {
    current: Option<usize>,
}

impl StageTracker {
    /// Returns `true` the first time a new stage index is seen.
    pub fn observe(&mut self, stage: Stage) -> bool {
        if self.current == Some(stage.index) {
            return false;
        }
        self.current = Some(stage.index);
        true
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<usize> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_boundaries_map_to_expected_indices() {
        let stager = WorkloadStager::new(vec![100, 200, 300], 10.0);
        let indices: Vec<usize> = [0.0, 9.999, 10.0, 25.0, 35.0]
            .iter()
            .map(|t| stager.current_stage(*t).index)
            .collect();
        assert_eq!(indices, vec![0, 0, 1, 2, 2]);
        assert_eq!(stager.current_stage(25.0).workload_size, 300);
    }

    #[test]
    fn stage_is_monotonic_and_saturates() {
        let stager = WorkloadStager::new(vec![1, 2, 3, 4], 0.75);
        let mut previous = 0;
        for step in 0..2_000 {
            let elapsed = step as f64 * 0.01;
            let stage = stager.current_stage(elapsed);
            assert!(stage.index >= previous);
            if elapsed >= 0.75 * 4.0 {
                assert_eq!(stage.index, 3);
                assert_eq!(stage.workload_size, 4);
            }
            previous = stage.index;
        }
        assert_eq!(stager.current_stage(f64::MAX).index, 3);
    }

    #[test]
    fn negative_elapsed_is_first_stage() {
        let stager = WorkloadStager::new(vec![5, 6], 1.0);
        assert_eq!(
            stager.current_stage(-3.0),
            Stage {
                index: 0,
                workload_size: 5
            }
        );
    }

    #[test]
    fn tracker_reports_each_transition_once() {
        let stager = WorkloadStager::new(vec![10, 20], 1.0);
        let mut tracker = StageTracker::default();

        assert!(tracker.observe(stager.current_stage(0.0)));
        assert!(!tracker.observe(stager.current_stage(0.5)));
        assert!(tracker.observe(stager.current_stage(1.0)));
        assert!(!tracker.observe(stager.current_stage(7.0)));
        assert_eq!(tracker.current(), Some(1));
    }
}
