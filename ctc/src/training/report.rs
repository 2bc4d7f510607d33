use std::fmt;
use std::time::Duration;

use super::Phase;

/// Progress line written after every evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub step: u64,
    pub loss: f32,
    pub ler: f64,
    pub duration: Duration,
    pub learning_rate: f64,
    pub improved: bool,
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Step {}: loss = {:.3} / ler = {:.4} ({:.3} sec) / lr = {:.5}",
            self.step,
            self.loss,
            self.ler,
            self.duration.as_secs_f64(),
            self.learning_rate
        )
    }
}

/// Reference and hypothesis of the first utterance, rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub reference: String,
    pub hypothesis: String,
}

pub trait TrainingObserver {
    fn on_step(&mut self, _step: u64, _loss: f32, _learning_rate: f64) {}

    fn on_evaluation(&mut self, report: &EvalReport, transcript: &Transcript);

    fn on_finish(&mut self, phase: Phase, elapsed: Duration);
}

/// Writes progress through the `log` facade.
#[derive(Default)]
pub struct LogObserver;

impl TrainingObserver for LogObserver {
    fn on_evaluation(&mut self, report: &EvalReport, transcript: &Transcript) {
        log::info!("{}", report);
        log::info!("True: {}", transcript.reference);
        log::info!("Pred: {}", transcript.hypothesis);
    }

    fn on_finish(&mut self, phase: Phase, elapsed: Duration) {
        for line in finish_lines(phase, elapsed) {
            log::info!("{}", line);
        }
    }
}

/// Closing lines of a run: the convergence notice, if any, then the total time.
pub fn finish_lines(phase: Phase, elapsed: Duration) -> Vec<String> {
    let mut lines = Vec::with_capacity(2);
    if phase == Phase::Converged {
        lines.push("Model is converged.".to_string());
    }
    lines.push(format!("Total time: {:.3} sec", elapsed.as_secs_f64()));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_format() {
        let report = EvalReport {
            step: 30,
            loss: 12.3456,
            ler: 0.5,
            duration: Duration::from_millis(1500),
            learning_rate: 9.9e-4,
            improved: true,
        };
        assert_eq!(
            report.to_string(),
            "Step 30: loss = 12.346 / ler = 0.5000 (1.500 sec) / lr = 0.00099"
        );
    }

    #[test]
    fn test_finish_lines() {
        let elapsed = Duration::from_millis(12_345);
        assert_eq!(
            finish_lines(Phase::Converged, elapsed),
            vec!["Model is converged.", "Total time: 12.345 sec"]
        );
        assert_eq!(
            finish_lines(Phase::MaxStepsReached, elapsed),
            vec!["Total time: 12.345 sec"]
        );
    }
}
