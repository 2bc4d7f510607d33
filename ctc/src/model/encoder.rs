use candle_core::{IndexOp, Result, Tensor, D};
use candle_nn::rnn::{gru, lstm, GRUConfig, LSTMConfig, GRU, LSTM, RNN};
use candle_nn::{Init, VarBuilder};

use super::{ModelConfig, ModelType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Lstm,
    Gru,
}

enum Cell {
    Lstm(LSTM),
    Gru(GRU),
}

impl Cell {
    fn new(
        cell_type: CellType,
        in_dim: usize,
        hidden_dim: usize,
        parameter_init: f64,
        vb: VarBuilder,
    ) -> Result<Self> {
        let weight_init = Init::Uniform {
            lo: -parameter_init,
            up: parameter_init,
        };
        let bias_init = Some(Init::Const(0.0));

        match cell_type {
            CellType::Lstm => {
                let config = LSTMConfig {
                    w_ih_init: weight_init,
                    w_hh_init: weight_init,
                    b_ih_init: bias_init,
                    b_hh_init: bias_init,
                    ..Default::default()
                };
                Ok(Cell::Lstm(lstm(in_dim, hidden_dim, config, vb)?))
            }
            CellType::Gru => {
                let config = GRUConfig {
                    w_ih_init: weight_init,
                    w_hh_init: weight_init,
                    b_ih_init: bias_init,
                    b_hh_init: bias_init,
                    ..Default::default()
                };
                Ok(Cell::Gru(gru(in_dim, hidden_dim, config, vb)?))
            }
        }
    }

    /// `(batch, frames, in_dim)` to `(batch, frames, hidden_dim)`.
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Cell::Lstm(cell) => {
                let states = cell.seq(xs)?;
                cell.states_to_tensor(&states)
            }
            Cell::Gru(cell) => {
                let states = cell.seq(xs)?;
                cell.states_to_tensor(&states)
            }
        }
    }
}

struct Layer {
    forward: Cell,
    backward: Option<Cell>,
}

/// Stack of unidirectional or bidirectional recurrent layers.
///
/// Bidirectional layers concatenate forward and backward outputs, so the
/// next layer sees `2 * num_unit` features.
pub struct RecurrentEncoder {
    layers: Vec<Layer>,
    output_dim: usize,
    keep_prob_hidden: f32,
}

impl RecurrentEncoder {
    pub fn new(model_type: ModelType, config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let directions = if model_type.is_bidirectional() { 2 } else { 1 };
        let cell_type = model_type.cell();

        let mut layers = Vec::with_capacity(config.num_layer);
        let mut in_dim = config.input_size;

        for i in 0..config.num_layer {
            let layer_vb = vb.pp(format!("layer{}", i));
            let forward = Cell::new(
                cell_type,
                in_dim,
                config.num_unit,
                config.parameter_init,
                layer_vb.pp("fw"),
            )?;
            let backward = if model_type.is_bidirectional() {
                Some(Cell::new(
                    cell_type,
                    in_dim,
                    config.num_unit,
                    config.parameter_init,
                    layer_vb.pp("bw"),
                )?)
            } else {
                None
            };

            layers.push(Layer { forward, backward });
            in_dim = config.num_unit * directions;
        }

        Ok(Self {
            layers,
            output_dim: in_dim,
            keep_prob_hidden: config.keep_prob_hidden,
        })
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Encodes a padded batch. Dropout between layers only applies when `train` is set.
    pub fn forward(&self, xs: &Tensor, input_lengths: &[usize], train: bool) -> Result<Tensor> {
        let mut xs = xs.clone();

        for layer in &self.layers {
            let forward = layer.forward.forward(&xs)?;

            xs = match &layer.backward {
                Some(cell) => {
                    let reversed = reverse_padded(&xs, input_lengths)?;
                    let backward = reverse_padded(&cell.forward(&reversed)?, input_lengths)?;
                    Tensor::cat(&[&forward, &backward], D::Minus1)?
                }
                None => forward,
            };

            if train && self.keep_prob_hidden < 1.0 {
                xs = candle_nn::ops::dropout(&xs, 1.0 - self.keep_prob_hidden)?;
            }
        }

        Ok(xs)
    }
}

/// Reverses the first `input_lengths[b]` frames of every utterance and leaves
/// the padding where it is.
pub fn reverse_padded(xs: &Tensor, input_lengths: &[usize]) -> Result<Tensor> {
    let (batch_size, frames, _) = xs.dims3()?;
    if input_lengths.len() != batch_size {
        candle_core::bail!(
            "Reversing {} utterances with {} lengths",
            batch_size,
            input_lengths.len()
        );
    }

    let rows = input_lengths
        .iter()
        .enumerate()
        .map(|(b, &len)| {
            let len = len.min(frames);
            let index: Vec<u32> = (0..frames)
                .map(|t| if t < len { (len - 1 - t) as u32 } else { t as u32 })
                .collect();
            let index = Tensor::new(index.as_slice(), xs.device())?;
            xs.i(b)?.index_select(&index, 0)
        })
        .collect::<Result<Vec<_>>>()?;

    Tensor::stack(&rows, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            input_size: 3,
            num_unit: 4,
            num_layer: 2,
            num_classes: 5,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_reverse_padded() -> Result<()> {
        let xs = Tensor::new(
            &[[[1f32], [2.0], [3.0], [0.0]], [[4.0], [5.0], [6.0], [7.0]]],
            &Device::Cpu,
        )?;
        let reversed = reverse_padded(&xs, &[3, 4])?;

        assert_eq!(
            reversed.squeeze(2)?.to_vec2::<f32>()?,
            vec![vec![3.0, 2.0, 1.0, 0.0], vec![7.0, 6.0, 5.0, 4.0]]
        );

        // Reversing twice restores the input
        let restored = reverse_padded(&reversed, &[3, 4])?;
        assert_eq!(restored.to_vec3::<f32>()?, xs.to_vec3::<f32>()?);
        Ok(())
    }

    #[test]
    fn test_output_dims() -> Result<()> {
        let xs = Tensor::randn(0f32, 1.0, (2, 6, 3), &Device::Cpu)?;

        for model_type in ModelType::ALL {
            let varmap = VarMap::new();
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
            let encoder = RecurrentEncoder::new(model_type, &tiny_config(), vb)?;

            let expected = if model_type.is_bidirectional() { 8 } else { 4 };
            assert_eq!(encoder.output_dim(), expected);

            let encoded = encoder.forward(&xs, &[6, 4], false)?;
            assert_eq!(encoded.dims3()?, (2, 6, expected));
        }
        Ok(())
    }

    #[test]
    fn test_forward_direction_ignores_padding() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = RecurrentEncoder::new(ModelType::Blstm, &tiny_config(), vb)?;

        let valid = Tensor::randn(0f32, 1.0, (1, 4, 3), &Device::Cpu)?;
        let padding = Tensor::randn(0f32, 1.0, (1, 2, 3), &Device::Cpu)?;
        let padded = Tensor::cat(&[&valid, &padding], 1)?;

        let short = encoder.forward(&valid, &[4], false)?;
        let long = encoder.forward(&padded, &[4], false)?.narrow(1, 0, 4)?;

        let diff = (short - long)?.abs()?.max_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-5);
        Ok(())
    }
}
