use crate::ScheduleError;

/// Produces the learning rate for the next training step.
///
/// `metric` is the most recently evaluated error metric. Step based policies
/// ignore it; it is part of the signature so metric driven policies can share
/// the same call site.
pub trait LearningRateSchedule {
    fn initial_rate(&self) -> f64;

    /// Direction of the metric passed to `decay`.
    fn lower_is_better(&self) -> bool;

    fn decay(&self, current_rate: f64, step: u64, metric: f64) -> f64;
}

/// Geometric decay every `decay_steps` once `decay_start_step` has passed.
///
/// With a start of 10 and 20 decay steps the rate is multiplied by
/// `decay_rate` at steps 30, 50, 70 and so on. The start step itself is not a
/// decay point.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDecay {
    initial_rate: f64,
    decay_start_step: u64,
    decay_steps: u64,
    decay_rate: f64,
    lower_is_better: bool,
}

impl StepDecay {
    pub fn new(
        initial_rate: f64,
        decay_start_step: u64,
        decay_steps: u64,
        decay_rate: f64,
        lower_is_better: bool,
    ) -> Result<Self, ScheduleError> {
        if !initial_rate.is_finite() || initial_rate <= 0.0 {
            return Err(ScheduleError::InitialRate(initial_rate));
        }
        if !decay_rate.is_finite() || decay_rate <= 0.0 || decay_rate > 1.0 {
            return Err(ScheduleError::DecayRate(decay_rate));
        }
        if decay_steps == 0 {
            return Err(ScheduleError::DecaySteps);
        }

        Ok(Self {
            initial_rate,
            decay_start_step,
            decay_steps,
            decay_rate,
            lower_is_better,
        })
    }

    #[inline]
    fn is_decay_step(&self, step: u64) -> bool {
        step > self.decay_start_step && (step - self.decay_start_step) % self.decay_steps == 0
    }

    /// Rate reached at `step` when `decay` has been applied on every step from 0.
    pub fn rate_at(&self, step: u64) -> f64 {
        if step <= self.decay_start_step {
            return self.initial_rate;
        }
        let decays = (step - self.decay_start_step) / self.decay_steps;
        self.initial_rate * self.decay_rate.powi(decays.min(i32::MAX as u64) as i32)
    }
}

impl LearningRateSchedule for StepDecay {
    fn initial_rate(&self) -> f64 {
        self.initial_rate
    }

    fn lower_is_better(&self) -> bool {
        self.lower_is_better
    }

    #[inline]
    fn decay(&self, current_rate: f64, step: u64, _metric: f64) -> f64 {
        if self.is_decay_step(step) {
            current_rate * self.decay_rate
        } else {
            current_rate
        }
    }
}
