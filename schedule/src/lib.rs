mod controller;
mod error;
pub mod monitor;

pub use controller::{LearningRateSchedule, StepDecay};
pub use error::ScheduleError;
pub use monitor::{ConvergenceMonitor, DEFAULT_PATIENCE};
