use candle_core::Result;
use schedule::{ConvergenceMonitor, LearningRateSchedule, ScheduleError, DEFAULT_PATIENCE};
use std::time::Duration;

use super::{EvalReport, Phase, TrainingContext, TrainingObserver, Transcript};
use crate::data::{Batch, BatchSource};
use crate::labels::LabelRenderer;
use crate::model::AcousticModel;

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub max_steps: u64,
    /// Evaluate after every `eval_interval` completed steps.
    pub eval_interval: u64,
    /// Evaluations without improvement before stopping.
    pub patience: u32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_steps: 400,
            eval_interval: 10,
            patience: DEFAULT_PATIENCE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// Terminal phase the run ended in.
    pub phase: Phase,
    pub steps: u64,
    pub best_ler: f64,
    pub learning_rate: f64,
    pub elapsed: Duration,
    pub reports: Vec<EvalReport>,
}

pub struct Trainer<S: LearningRateSchedule> {
    config: TrainerConfig,
    schedule: S,
    monitor: ConvergenceMonitor,
}

impl<S: LearningRateSchedule> Trainer<S> {
    pub fn new(config: TrainerConfig, schedule: S) -> std::result::Result<Self, ScheduleError> {
        if config.eval_interval == 0 {
            return Err(ScheduleError::EvalInterval);
        }

        let monitor = ConvergenceMonitor::new(
            worst_metric(schedule.lower_is_better()),
            config.patience,
            schedule.lower_is_better(),
        )?;

        Ok(Self {
            config,
            schedule,
            monitor,
        })
    }

    pub fn run(
        &self,
        model: &mut dyn AcousticModel,
        data: &mut dyn BatchSource,
        renderer: &LabelRenderer,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingSummary> {
        let mut ctx = TrainingContext::new(
            self.schedule.initial_rate(),
            self.monitor.best(),
            self.monitor.clone(),
        );
        let mut reports = Vec::new();
        let mut batch: Option<Batch> = None;

        if self.config.max_steps == 0 {
            ctx.phase = Phase::MaxStepsReached;
        }

        while !ctx.phase.is_terminal() {
            let phase = ctx.phase;
            ctx.phase = match phase {
                Phase::Training => {
                    let current = batch.insert(data.next_batch()?);
                    self.train_step(&mut ctx, model, current)?;
                    observer.on_step(ctx.step, ctx.last_loss, ctx.learning_rate);
                    self.after_training(&ctx)
                }
                Phase::Evaluating => {
                    let Some(current) = batch.as_ref() else {
                        candle_core::bail!("Evaluation requested before any training step");
                    };
                    let (report, transcript) = self.evaluate(&mut ctx, model, current, renderer)?;
                    observer.on_evaluation(&report, &transcript);
                    reports.push(report);
                    self.after_evaluation(&ctx)
                }
                terminal => terminal,
            };
        }

        let elapsed = ctx.elapsed();
        observer.on_finish(ctx.phase, elapsed);

        Ok(TrainingSummary {
            phase: ctx.phase,
            steps: ctx.step,
            best_ler: ctx.monitor.best(),
            learning_rate: ctx.learning_rate,
            elapsed,
            reports,
        })
    }

    fn train_step(
        &self,
        ctx: &mut TrainingContext,
        model: &mut dyn AcousticModel,
        batch: &Batch,
    ) -> Result<()> {
        ctx.learning_rate = self
            .schedule
            .decay(ctx.learning_rate, ctx.step, ctx.last_metric);
        ctx.last_loss = model.train_step(batch, ctx.learning_rate)?;
        ctx.step += 1;
        Ok(())
    }

    fn after_training(&self, ctx: &TrainingContext) -> Phase {
        if ctx.step % self.config.eval_interval == 0 {
            Phase::Evaluating
        } else if ctx.step >= self.config.max_steps {
            Phase::MaxStepsReached
        } else {
            Phase::Training
        }
    }

    fn evaluate(
        &self,
        ctx: &mut TrainingContext,
        model: &dyn AcousticModel,
        batch: &Batch,
        renderer: &LabelRenderer,
    ) -> Result<(EvalReport, Transcript)> {
        let ler = model.compute_error_rate(batch)?;
        let duration = ctx.lap();

        let hypotheses = model.decode(batch)?;
        let transcript = Transcript {
            reference: batch
                .labels
                .first()
                .map(|labels| renderer.render(labels))
                .unwrap_or_default(),
            hypothesis: hypotheses
                .first()
                .map(|labels| renderer.render(labels))
                .unwrap_or_default(),
        };

        let improved = ctx.monitor.observe(ler);
        ctx.last_metric = ler;

        let report = EvalReport {
            step: ctx.step,
            loss: ctx.last_loss,
            ler,
            duration,
            learning_rate: ctx.learning_rate,
            improved,
        };
        Ok((report, transcript))
    }

    fn after_evaluation(&self, ctx: &TrainingContext) -> Phase {
        if ctx.monitor.should_stop() {
            Phase::Converged
        } else if ctx.step >= self.config.max_steps {
            Phase::MaxStepsReached
        } else {
            Phase::Training
        }
    }
}

fn worst_metric(lower_is_better: bool) -> f64 {
    if lower_is_better {
        1.0
    } else {
        0.0
    }
}

/// Logs every parameter with its size and the total. Returns the total.
pub fn log_parameters(model: &dyn AcousticModel) -> Result<usize> {
    let parameters = model.parameters()?;
    for (name, count) in &parameters {
        log::info!("{} {}", name, count);
    }

    let total: usize = parameters.iter().map(|(_, count)| count).sum();
    log::info!(
        "Total {} variables, {:.6} M parameters",
        parameters.len(),
        total as f64 / 1_000_000.0
    );
    Ok(total)
}
