use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    InitialRate(f64),
    DecayRate(f64),
    DecaySteps,
    Patience,
    EvalInterval,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::InitialRate(rate) => {
                write!(f, "Initial learning rate must be positive, got {}", rate)
            }
            ScheduleError::DecayRate(rate) => {
                write!(f, "Decay rate must be in (0, 1], got {}", rate)
            }
            ScheduleError::DecaySteps => write!(f, "Decay steps must be at least 1"),
            ScheduleError::Patience => write!(f, "Patience must be at least 1"),
            ScheduleError::EvalInterval => write!(f, "Evaluation interval must be at least 1"),
        }
    }
}

impl Error for ScheduleError {}
