use clap::Parser;
use ctc::labels::LabelType;
use ctc::model::ModelType;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "CTC Check")]
#[command(version = "1.0.0")]
pub struct Args {
    /// Model types to train, comma separated. Defaults to every model.
    #[arg(long, value_delimiter = ',')]
    pub models: Vec<ModelType>,

    /// Label types to train on, comma separated. Defaults to every label type.
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<LabelType>,

    /// Utterances per batch.
    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    /// Feature dimension of every frame.
    #[arg(long, default_value_t = 123)]
    pub input_size: usize,

    /// Hidden units per recurrent direction.
    #[arg(long, default_value_t = 256)]
    pub num_unit: usize,

    /// Number of recurrent layers.
    #[arg(long, default_value_t = 2)]
    pub num_layer: usize,

    /// Width of the projection before the output layer, 0 to disable.
    #[arg(long, default_value_t = 0)]
    pub bottleneck_dim: usize,

    /// Weights are initialised uniformly in [-init, init].
    #[arg(long, default_value_t = 0.1)]
    pub parameter_init: f64,

    /// Global gradient norm limit.
    #[arg(long, default_value_t = 5.0)]
    pub clip_grad: f64,

    /// Keep probability of input dropout.
    #[arg(long, default_value_t = 1.0)]
    pub keep_prob_input: f32,

    /// Keep probability of dropout between recurrent layers.
    #[arg(long, default_value_t = 1.0)]
    pub keep_prob_hidden: f32,

    /// AdamW weight decay.
    #[arg(long, default_value_t = 1e-6)]
    pub weight_decay: f64,

    /// Initial learning rate.
    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Step after which the learning rate starts decaying.
    #[arg(long, default_value_t = 10)]
    pub decay_start_step: u64,

    /// Steps between two decays.
    #[arg(long, default_value_t = 20)]
    pub decay_steps: u64,

    /// Multiplier applied at every decay.
    #[arg(long, default_value_t = 0.99)]
    pub decay_rate: f64,

    /// Maximum number of training steps per run.
    #[arg(long, default_value_t = 400)]
    pub max_steps: u64,

    /// Steps between evaluations.
    #[arg(long, default_value_t = 10)]
    pub eval_interval: u64,

    /// Evaluations without improvement before stopping.
    #[arg(long, default_value_t = 5)]
    pub patience: u32,

    /// Seed of the synthetic corpus.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Draw a fresh batch every step instead of reusing one.
    #[arg(long)]
    pub resample: bool,

    /// Phone mapping file with one `phone index` pair per line.
    #[arg(long)]
    pub phone_map: Option<PathBuf>,

    /// Print evaluations as log lines instead of a progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

impl Args {
    pub fn model_types(&self) -> Vec<ModelType> {
        if self.models.is_empty() {
            ModelType::ALL.to_vec()
        } else {
            self.models.clone()
        }
    }

    pub fn label_types(&self) -> Vec<LabelType> {
        if self.labels.is_empty() {
            LabelType::ALL.to_vec()
        } else {
            self.labels.clone()
        }
    }
}
