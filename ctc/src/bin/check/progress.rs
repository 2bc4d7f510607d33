use ctc::training::{finish_lines, EvalReport, Phase, TrainingObserver, Transcript};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar over the step budget. Evaluations are printed above the bar.
pub struct TrainingProgressBar {
    bar: ProgressBar,
}

impl TrainingProgressBar {
    pub fn new(max_steps: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(max_steps);
        bar.set_style(ProgressStyle::default_bar().template(
            "{spinner:.cyan} {pos}/{len} [{wide_bar:.cyan/blue}] {eta_precise} | {msg}",
        )?);
        Ok(Self { bar })
    }
}

impl TrainingObserver for TrainingProgressBar {
    fn on_step(&mut self, step: u64, loss: f32, learning_rate: f64) {
        self.bar
            .set_message(format!("loss: {:.3}, lr: {:.5}", loss, learning_rate));
        self.bar.set_position(step);
    }

    fn on_evaluation(&mut self, report: &EvalReport, transcript: &Transcript) {
        self.bar.println(report.to_string());
        self.bar.println(format!("True: {}", transcript.reference));
        self.bar.println(format!("Pred: {}", transcript.hypothesis));
    }

    fn on_finish(&mut self, phase: Phase, elapsed: Duration) {
        self.bar.finish_and_clear();
        for line in finish_lines(phase, elapsed) {
            log::info!("{}", line);
        }
    }
}
