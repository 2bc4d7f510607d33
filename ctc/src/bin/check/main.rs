mod args;
mod progress;

use args::Args;
use candle_core::Device;
use clap::Parser;
use ctc::data::{BatchSource, CorpusConfig, FixedBatch, SyntheticCorpus};
use ctc::device::get_device;
use ctc::labels::{LabelRenderer, LabelType, PhoneMap};
use ctc::model::{self, ModelConfig, ModelType};
use ctc::training::{
    log_parameters, LogObserver, Trainer, TrainerConfig, TrainingObserver, TrainingSummary,
};
use log::LevelFilter;
use progress::TrainingProgressBar;
use schedule::StepDecay;
use simplelog::{Config, SimpleLogger};
use std::{error::Error, time::Instant};

fn main() -> Result<(), Box<dyn Error>> {
    let args = init()?;
    let device = get_device()?;

    let phones = match &args.phone_map {
        Some(path) => {
            log::info!("Loading phone map from {}", path.display());
            PhoneMap::load(path)?
        }
        None => PhoneMap::default(),
    };

    let start = Instant::now();
    for model_type in args.model_types() {
        for label_type in args.label_types() {
            log::info!("----- {}, {} -----", model_type, label_type);
            let summary = check(&args, model_type, label_type, &phones, &device)?;
            log::info!(
                "{} finished: {} after {} steps, best ler = {:.4}",
                model_type,
                summary.phase,
                summary.steps,
                summary.best_ler
            );
        }
    }

    log::info!("Done in {:.3} sec", start.elapsed().as_secs_f64());
    Ok(())
}

fn check(
    args: &Args,
    model_type: ModelType,
    label_type: LabelType,
    phones: &PhoneMap,
    device: &Device,
) -> Result<TrainingSummary, Box<dyn Error>> {
    let mut corpus = SyntheticCorpus::new(
        CorpusConfig {
            label_type,
            batch_size: args.batch_size,
            input_size: args.input_size,
            seed: args.seed,
            ..CorpusConfig::default()
        },
        device,
    )?;

    let mut fixed;
    let data: &mut dyn BatchSource = if args.resample {
        &mut corpus
    } else {
        fixed = FixedBatch(corpus.generate()?);
        &mut fixed
    };

    let config = ModelConfig {
        input_size: args.input_size,
        num_unit: args.num_unit,
        num_layer: args.num_layer,
        bottleneck_dim: args.bottleneck_dim,
        num_classes: label_type.num_classes(),
        parameter_init: args.parameter_init,
        clip_grad: args.clip_grad,
        keep_prob_input: args.keep_prob_input,
        keep_prob_hidden: args.keep_prob_hidden,
        weight_decay: args.weight_decay,
    };
    let mut network = model::load(model_type, &config, device)?;
    log_parameters(network.as_ref())?;

    let schedule = StepDecay::new(
        args.learning_rate,
        args.decay_start_step,
        args.decay_steps,
        args.decay_rate,
        true,
    )?;
    let trainer = Trainer::new(
        TrainerConfig {
            max_steps: args.max_steps,
            eval_interval: args.eval_interval,
            patience: args.patience,
        },
        schedule,
    )?;

    let renderer = LabelRenderer::new(label_type, phones.clone());
    let mut observer: Box<dyn TrainingObserver> = if args.no_progress {
        Box::new(LogObserver)
    } else {
        Box::new(TrainingProgressBar::new(args.max_steps)?)
    };

    let summary = trainer.run(network.as_mut(), data, &renderer, observer.as_mut())?;
    Ok(summary)
}

fn init() -> Result<Args, Box<dyn Error>> {
    let args = Args::parse();
    SimpleLogger::init(LevelFilter::Info, Config::default())?;

    Ok(args)
}
