use candle_core::backprop::GradStore;
use candle_core::{DType, Device, Result, Tensor, Var, D};
use candle_nn::{AdamW, Init, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};

use super::{AcousticModel, ModelConfig, ModelType, RecurrentEncoder};
use crate::data::Batch;
use crate::decoding::greedy_decode;
use crate::loss::ctc_loss;

/// Recurrent encoder, optional bottleneck and a frame-wise projection onto
/// the output classes plus blank, trained with CTC.
pub struct CtcNetwork {
    model_type: ModelType,
    config: ModelConfig,
    encoder: RecurrentEncoder,
    bottleneck: Option<Linear>,
    output: Linear,
    blank: u32,
    varmap: VarMap,
    vars: Vec<Var>,
    optimizer: AdamW,
}

impl CtcNetwork {
    pub fn new(model_type: ModelType, config: &ModelConfig, device: &Device) -> Result<Self> {
        config.validate()?;

        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let encoder = RecurrentEncoder::new(model_type, config, vs.pp("encoder"))?;

        let mut dim = encoder.output_dim();
        let bottleneck = if config.bottleneck_dim > 0 {
            let layer = uniform_linear(
                dim,
                config.bottleneck_dim,
                config.parameter_init,
                vs.pp("bottleneck"),
            )?;
            dim = config.bottleneck_dim;
            Some(layer)
        } else {
            None
        };

        // Blank is the last class
        let output = uniform_linear(
            dim,
            config.num_classes + 1,
            config.parameter_init,
            vs.pp("output"),
        )?;

        let vars = varmap.all_vars();
        let optimizer = AdamW::new(
            vars.clone(),
            ParamsAdamW {
                weight_decay: config.weight_decay,
                ..Default::default()
            },
        )?;

        Ok(Self {
            model_type,
            config: config.clone(),
            encoder,
            bottleneck,
            output,
            blank: config.num_classes as u32,
            varmap,
            vars,
            optimizer,
        })
    }

    /// Unnormalized class scores, `(batch, frames, num_classes + 1)`.
    pub fn logits(&self, batch: &Batch, train: bool) -> Result<Tensor> {
        let mut xs = batch.inputs.clone();
        if train && self.config.keep_prob_input < 1.0 {
            xs = candle_nn::ops::dropout(&xs, 1.0 - self.config.keep_prob_input)?;
        }

        let mut xs = self.encoder.forward(&xs, &batch.input_lengths, train)?;
        if let Some(bottleneck) = &self.bottleneck {
            xs = bottleneck.forward(&xs)?;
        }
        self.output.forward(&xs)
    }

    fn loss(&self, batch: &Batch, train: bool) -> Result<Tensor> {
        let logits = self.logits(batch, train)?;
        let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
        ctc_loss(&log_probs, &batch.labels, &batch.input_lengths, self.blank)
    }
}

impl AcousticModel for CtcNetwork {
    fn name(&self) -> String {
        self.model_type.to_string()
    }

    fn compute_loss(&self, batch: &Batch) -> Result<f32> {
        self.loss(batch, false)?.to_scalar::<f32>()
    }

    fn train_step(&mut self, batch: &Batch, learning_rate: f64) -> Result<f32> {
        self.optimizer.set_learning_rate(learning_rate);

        let loss = self.loss(batch, true)?;
        let mut grads = loss.backward()?;

        let norm = clip_grad_norm(&self.vars, &mut grads, self.config.clip_grad)?;
        log::debug!("Gradient norm: {:.4}", norm);

        self.optimizer.step(&grads)?;
        loss.to_scalar::<f32>()
    }

    fn decode(&self, batch: &Batch) -> Result<Vec<Vec<u32>>> {
        let logits = self.logits(batch, false)?;
        greedy_decode(&logits, &batch.input_lengths, self.blank)
    }

    fn parameters(&self) -> Result<Vec<(String, usize)>> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| candle_core::Error::Msg("Parameter store lock poisoned".to_string()))?;

        let mut parameters: Vec<(String, usize)> = data
            .iter()
            .map(|(name, var)| (name.clone(), var.elem_count()))
            .collect();
        parameters.sort();

        Ok(parameters)
    }
}

fn uniform_linear(in_dim: usize, out_dim: usize, init: f64, vb: VarBuilder) -> Result<Linear> {
    let weight = vb.get_with_hints(
        (out_dim, in_dim),
        "weight",
        Init::Uniform { lo: -init, up: init },
    )?;
    let bias = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}

/// Rescales gradients so their global L2 norm is at most `max_norm`.
///
/// Returns the norm before clipping.
pub fn clip_grad_norm(vars: &[Var], grads: &mut GradStore, max_norm: f64) -> Result<f64> {
    let mut squared_sum = 0f64;
    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            squared_sum += grad.sqr()?.sum_all()?.to_dtype(DType::F64)?.to_scalar::<f64>()?;
        }
    }

    let norm = squared_sum.sqrt();
    if norm > max_norm {
        let scale = max_norm / (norm + 1e-6);
        for var in vars {
            if let Some(grad) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), (grad * scale)?);
            }
        }
    }

    Ok(norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CorpusConfig, SyntheticCorpus};
    use crate::labels::LabelType;

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            input_size: 6,
            num_unit: 8,
            num_layer: 1,
            num_classes: LabelType::Character.num_classes(),
            ..ModelConfig::default()
        }
    }

    fn tiny_batch() -> Result<Batch> {
        let config = CorpusConfig {
            label_type: LabelType::Character,
            batch_size: 2,
            input_size: 6,
            min_labels: 2,
            max_labels: 3,
            noise: 0.1,
            ..CorpusConfig::default()
        };
        SyntheticCorpus::new(config, &Device::Cpu)?.generate()
    }

    #[test]
    fn test_logits_shape() -> Result<()> {
        let batch = tiny_batch()?;
        let (_, frames, _) = batch.inputs.dims3()?;

        for model_type in ModelType::ALL {
            let network = CtcNetwork::new(model_type, &tiny_config(), &Device::Cpu)?;
            let logits = network.logits(&batch, false)?;
            assert_eq!(logits.dims3()?, (2, frames, 27));
        }
        Ok(())
    }

    #[test]
    fn test_bottleneck_parameters() -> Result<()> {
        let config = ModelConfig {
            bottleneck_dim: 5,
            ..tiny_config()
        };
        let network = CtcNetwork::new(ModelType::Gru, &config, &Device::Cpu)?;
        let parameters = network.parameters()?;

        let lookup = |name: &str| {
            parameters
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, count)| *count)
        };
        assert_eq!(lookup("bottleneck.weight"), Some(8 * 5));
        assert_eq!(lookup("output.weight"), Some(5 * 27));
        assert_eq!(lookup("output.bias"), Some(27));

        let names: Vec<_> = parameters.iter().map(|(n, _)| n.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        Ok(())
    }

    #[test]
    fn test_decode_lengths_match_batch() -> Result<()> {
        let batch = tiny_batch()?;
        let network = CtcNetwork::new(ModelType::Blstm, &tiny_config(), &Device::Cpu)?;

        let decoded = network.decode(&batch)?;
        assert_eq!(decoded.len(), 2);
        for (hypothesis, &len) in decoded.iter().zip(&batch.input_lengths) {
            assert!(hypothesis.len() <= len);
            assert!(hypothesis.iter().all(|&label| label < 26));
        }

        let ler = network.compute_error_rate(&batch)?;
        assert!(ler >= 0.0);
        Ok(())
    }

    #[test]
    fn test_training_reduces_loss() -> Result<()> {
        let batch = tiny_batch()?;
        let mut network = CtcNetwork::new(ModelType::Lstm, &tiny_config(), &Device::Cpu)?;

        let initial = network.compute_loss(&batch)?;
        for _ in 0..40 {
            network.train_step(&batch, 1e-2)?;
        }
        let trained = network.compute_loss(&batch)?;

        assert!(trained.is_finite());
        assert!(trained < initial, "{} !< {}", trained, initial);
        Ok(())
    }

    #[test]
    fn test_clip_grad_norm() -> Result<()> {
        let var = Var::new(&[3f32, 4.0], &Device::Cpu)?;
        let loss = var.as_tensor().sum_all()?;
        let mut grads = loss.backward()?;

        // Gradient of a sum is all ones, norm sqrt(2)
        let norm = clip_grad_norm(&[var.clone()], &mut grads, 0.5)?;
        assert!((norm - 2f64.sqrt()).abs() < 1e-6);

        let clipped = grads.get(var.as_tensor()).unwrap();
        let clipped_norm = clipped.sqr()?.sum_all()?.sqrt()?.to_scalar::<f32>()?;
        assert!((clipped_norm - 0.5).abs() < 1e-4);
        Ok(())
    }
}
