mod context;
mod report;
mod trainer;

pub use context::{Phase, TrainingContext};
pub use report::{finish_lines, EvalReport, LogObserver, TrainingObserver, Transcript};
pub use trainer::{log_parameters, Trainer, TrainerConfig, TrainingSummary};
