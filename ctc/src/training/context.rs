use schedule::ConvergenceMonitor;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Training,
    Evaluating,
    Converged,
    MaxStepsReached,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Converged | Phase::MaxStepsReached)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Training => write!(f, "training"),
            Phase::Evaluating => write!(f, "evaluating"),
            Phase::Converged => write!(f, "converged"),
            Phase::MaxStepsReached => write!(f, "max steps reached"),
        }
    }
}

/// Mutable state of one training run, passed to every step.
pub struct TrainingContext {
    /// Completed training steps.
    pub step: u64,
    pub learning_rate: f64,
    /// Last evaluated error rate, fed back into the learning rate schedule.
    pub last_metric: f64,
    /// Loss of the most recent training step.
    pub last_loss: f32,
    pub monitor: ConvergenceMonitor,
    pub phase: Phase,
    started: Instant,
    interval_started: Instant,
}

impl TrainingContext {
    pub fn new(learning_rate: f64, initial_metric: f64, monitor: ConvergenceMonitor) -> Self {
        let now = Instant::now();
        Self {
            step: 0,
            learning_rate,
            last_metric: initial_metric,
            last_loss: f32::NAN,
            monitor,
            phase: Phase::Training,
            started: now,
            interval_started: now,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time since the previous call, or since the run started.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now - self.interval_started;
        self.interval_started = now;
        lap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(!Phase::Training.is_terminal());
        assert!(!Phase::Evaluating.is_terminal());
        assert!(Phase::Converged.is_terminal());
        assert!(Phase::MaxStepsReached.is_terminal());
    }

    #[test]
    fn test_new_context() {
        let monitor = ConvergenceMonitor::new(1.0, 5, true).unwrap();
        let mut context = TrainingContext::new(1e-3, 1.0, monitor);

        assert_eq!(context.step, 0);
        assert_eq!(context.phase, Phase::Training);
        assert!(context.lap() <= context.elapsed());
    }
}
