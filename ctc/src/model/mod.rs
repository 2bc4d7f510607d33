mod encoder;
mod network;

pub use encoder::{reverse_padded, CellType, RecurrentEncoder};
pub use network::CtcNetwork;

use candle_core::{Device, Result};
use std::fmt;
use std::str::FromStr;

use crate::data::{Batch, DEFAULT_INPUT_SIZE};
use crate::metrics::label_error_rate;

/// Acoustic model interface driven by the trainer.
pub trait AcousticModel {
    fn name(&self) -> String;

    /// Mean CTC loss over the batch, evaluation mode.
    fn compute_loss(&self, batch: &Batch) -> Result<f32>;

    /// One optimizer update at the given learning rate. Returns the training loss.
    fn train_step(&mut self, batch: &Batch, learning_rate: f64) -> Result<f32>;

    /// Decoded label sequence per utterance, evaluation mode.
    fn decode(&self, batch: &Batch) -> Result<Vec<Vec<u32>>>;

    fn compute_error_rate(&self, batch: &Batch) -> Result<f64> {
        let hypotheses = self.decode(batch)?;
        Ok(label_error_rate(&hypotheses, &batch.labels))
    }

    /// Trainable parameter names with their element counts, sorted by name.
    fn parameters(&self) -> Result<Vec<(String, usize)>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Lstm,
    Blstm,
    Gru,
    Bgru,
}

impl ModelType {
    pub const ALL: [ModelType; 4] = [
        ModelType::Blstm,
        ModelType::Lstm,
        ModelType::Bgru,
        ModelType::Gru,
    ];

    pub fn cell(&self) -> CellType {
        match self {
            ModelType::Lstm | ModelType::Blstm => CellType::Lstm,
            ModelType::Gru | ModelType::Bgru => CellType::Gru,
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        matches!(self, ModelType::Blstm | ModelType::Bgru)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelType::Lstm => "lstm_ctc",
            ModelType::Blstm => "blstm_ctc",
            ModelType::Gru => "gru_ctc",
            ModelType::Bgru => "bgru_ctc",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.strip_suffix("_ctc").unwrap_or(s) {
            "lstm" => Ok(ModelType::Lstm),
            "blstm" => Ok(ModelType::Blstm),
            "gru" => Ok(ModelType::Gru),
            "bgru" => Ok(ModelType::Bgru),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub input_size: usize,
    pub num_unit: usize,
    pub num_layer: usize,
    /// Linear layer between encoder and output, 0 disables it.
    pub bottleneck_dim: usize,
    /// Output classes without the blank.
    pub num_classes: usize,
    /// Weights are drawn uniformly from `[-parameter_init, parameter_init]`.
    pub parameter_init: f64,
    /// Maximum global gradient norm.
    pub clip_grad: f64,
    pub keep_prob_input: f32,
    pub keep_prob_hidden: f32,
    pub weight_decay: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            num_unit: 256,
            num_layer: 2,
            bottleneck_dim: 0,
            num_classes: 61,
            parameter_init: 0.1,
            clip_grad: 5.0,
            keep_prob_input: 1.0,
            keep_prob_hidden: 1.0,
            weight_decay: 1e-6,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.num_unit == 0 || self.num_layer == 0 {
            candle_core::bail!("Input size, units and layers must be positive");
        }
        if self.num_classes == 0 {
            candle_core::bail!("At least one output class is required");
        }
        if self.parameter_init <= 0.0 || self.clip_grad <= 0.0 {
            candle_core::bail!("Parameter init and gradient clip must be positive");
        }
        for keep_prob in [self.keep_prob_input, self.keep_prob_hidden] {
            if keep_prob <= 0.0 || keep_prob > 1.0 {
                candle_core::bail!("Keep probability must be in (0, 1], got {}", keep_prob);
            }
        }
        if self.weight_decay < 0.0 {
            candle_core::bail!("Weight decay must not be negative");
        }
        Ok(())
    }
}

/// Builds the model for `model_type`.
pub fn load(
    model_type: ModelType,
    config: &ModelConfig,
    device: &Device,
) -> Result<Box<dyn AcousticModel>> {
    Ok(Box::new(CtcNetwork::new(model_type, config, device)?))
}
