use crate::ScheduleError;

/// Evaluations without improvement before training is considered converged.
pub const DEFAULT_PATIENCE: u32 = 5;

/// Compares a new metric against the best seen so far.
///
/// Returns the new best value and whether `current` improved on it.
#[inline]
pub fn update(previous_best: f64, current: f64, lower_is_better: bool) -> (f64, bool) {
    let improved = if lower_is_better {
        current < previous_best
    } else {
        current > previous_best
    };

    if improved {
        (current, true)
    } else {
        (previous_best, false)
    }
}

#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    best: f64,
    not_improved: u32,
    patience: u32,
    lower_is_better: bool,
}

impl ConvergenceMonitor {
    pub fn new(initial_best: f64, patience: u32, lower_is_better: bool) -> Result<Self, ScheduleError> {
        if patience == 0 {
            return Err(ScheduleError::Patience);
        }

        Ok(Self {
            best: initial_best,
            not_improved: 0,
            patience,
            lower_is_better,
        })
    }

    // Returns if the metric improved on the best so far
    pub fn observe(&mut self, metric: f64) -> bool {
        let (best, improved) = update(self.best, metric, self.lower_is_better);
        self.best = best;

        if improved {
            self.not_improved = 0;
        } else {
            self.not_improved += 1;
        }
        improved
    }

    pub fn should_stop(&self) -> bool {
        self.not_improved >= self.patience
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn not_improved(&self) -> u32 {
        self.not_improved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_lower_is_better() {
        assert_eq!(update(0.5, 0.4, true), (0.4, true));
        assert_eq!(update(0.5, 0.5, true), (0.5, false));
        assert_eq!(update(0.5, 0.6, true), (0.5, false));
    }

    #[test]
    fn test_update_higher_is_better() {
        assert_eq!(update(0.5, 0.6, false), (0.6, true));
        assert_eq!(update(0.5, 0.5, false), (0.5, false));
        assert_eq!(update(0.5, 0.4, false), (0.5, false));
    }

    #[test]
    fn test_update_always_improves_on_lower_value() {
        for i in 1..100 {
            let previous = i as f64 / 100.0;
            let current = previous - 0.005;
            let (best, improved) = update(previous, current, true);
            assert!(improved);
            assert_eq!(best, current);
        }
    }

    #[test]
    fn test_stops_after_patience_and_not_before() {
        let mut monitor = ConvergenceMonitor::new(1.0, DEFAULT_PATIENCE, true).unwrap();
        for count in 1..DEFAULT_PATIENCE {
            assert!(!monitor.observe(1.0));
            assert_eq!(monitor.not_improved(), count);
            assert!(!monitor.should_stop());
        }
        assert!(!monitor.observe(1.0));
        assert_eq!(monitor.not_improved(), DEFAULT_PATIENCE);
        assert!(monitor.should_stop());
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut monitor = ConvergenceMonitor::new(1.0, DEFAULT_PATIENCE, true).unwrap();
        for _ in 0..4 {
            monitor.observe(1.0);
        }
        assert_eq!(monitor.not_improved(), 4);

        assert!(monitor.observe(0.8));
        assert_eq!(monitor.not_improved(), 0);
        assert_eq!(monitor.best(), 0.8);

        // A worse value than the best does not count as improvement
        assert!(!monitor.observe(0.9));
        assert_eq!(monitor.best(), 0.8);
        assert_eq!(monitor.not_improved(), 1);
    }

    #[test]
    fn test_zero_patience_rejected() {
        assert!(matches!(
            ConvergenceMonitor::new(1.0, 0, true),
            Err(ScheduleError::Patience)
        ));
    }
}
