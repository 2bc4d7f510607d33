use candle_core::{Device, Result, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::labels::LabelType;

/// Frames of 40 filterbank channels plus energy, with deltas and delta-deltas.
pub const DEFAULT_INPUT_SIZE: usize = 123;

/// One padded minibatch of utterances.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `(batch, max_frames, input_size)`, zero padded past each utterance's length.
    pub inputs: Tensor,
    pub labels: Vec<Vec<u32>>,
    pub input_lengths: Vec<usize>,
}

impl Batch {
    pub fn new(inputs: Tensor, labels: Vec<Vec<u32>>, input_lengths: Vec<usize>) -> Result<Self> {
        let (batch_size, max_frames, _) = inputs.dims3()?;
        if labels.len() != batch_size || input_lengths.len() != batch_size {
            candle_core::bail!(
                "Batch of {} inputs has {} label sequences and {} lengths",
                batch_size,
                labels.len(),
                input_lengths.len()
            );
        }
        if let Some(&len) = input_lengths.iter().find(|&&len| len > max_frames) {
            candle_core::bail!("Input length {} exceeds {} frames", len, max_frames);
        }

        Ok(Self {
            inputs,
            labels,
            input_lengths,
        })
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }
}

/// Supplies a batch for every training step.
pub trait BatchSource {
    fn next_batch(&mut self) -> Result<Batch>;
}

/// Replays the same batch forever.
pub struct FixedBatch(pub Batch);

impl BatchSource for FixedBatch {
    fn next_batch(&mut self) -> Result<Batch> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
pub struct CorpusConfig {
    pub label_type: LabelType,
    pub batch_size: usize,
    pub input_size: usize,
    pub min_labels: usize,
    pub max_labels: usize,
    pub min_frames_per_label: usize,
    pub max_frames_per_label: usize,
    pub noise: f32,
    pub seed: u64,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            label_type: LabelType::Phone,
            batch_size: 4,
            input_size: DEFAULT_INPUT_SIZE,
            min_labels: 5,
            max_labels: 15,
            min_frames_per_label: 2,
            max_frames_per_label: 5,
            noise: 0.3,
            seed: 42,
        }
    }
}

/// Seeded generator of learnable fake speech.
///
/// Every class owns a prototype frame. An utterance is a random label
/// sequence where each label spans a few noisy copies of its prototype.
pub struct SyntheticCorpus {
    config: CorpusConfig,
    prototypes: Vec<Vec<f32>>,
    rng: StdRng,
    device: Device,
}

impl SyntheticCorpus {
    pub fn new(config: CorpusConfig, device: &Device) -> Result<Self> {
        if config.batch_size == 0 || config.input_size == 0 {
            candle_core::bail!("Batch size and input size must be positive");
        }
        if config.min_labels == 0 || config.min_labels > config.max_labels {
            candle_core::bail!(
                "Invalid label count range {}..={}",
                config.min_labels,
                config.max_labels
            );
        }
        if config.min_frames_per_label == 0
            || config.min_frames_per_label > config.max_frames_per_label
        {
            candle_core::bail!(
                "Invalid frames per label range {}..={}",
                config.min_frames_per_label,
                config.max_frames_per_label
            );
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let prototypes = (0..config.label_type.num_classes())
            .map(|_| {
                (0..config.input_size)
                    .map(|_| rng.gen_range(-1.0f32..1.0))
                    .collect()
            })
            .collect();

        Ok(Self {
            config,
            prototypes,
            rng,
            device: device.clone(),
        })
    }

    fn utterance(&mut self) -> (Vec<f32>, Vec<u32>) {
        let num_classes = self.config.label_type.num_classes() as u32;
        let num_labels = self
            .rng
            .gen_range(self.config.min_labels..=self.config.max_labels);

        let labels: Vec<u32> = (0..num_labels)
            .map(|_| self.rng.gen_range(0..num_classes))
            .collect();

        let mut frames = Vec::new();
        for &label in &labels {
            let repeat = self.rng.gen_range(
                self.config.min_frames_per_label..=self.config.max_frames_per_label,
            );
            for _ in 0..repeat {
                for &value in &self.prototypes[label as usize] {
                    let noise = if self.config.noise > 0.0 {
                        self.rng.gen_range(-self.config.noise..self.config.noise)
                    } else {
                        0.0
                    };
                    frames.push(value + noise);
                }
            }
        }

        (frames, labels)
    }

    pub fn generate(&mut self) -> Result<Batch> {
        let input_size = self.config.input_size;

        let utterances: Vec<_> = (0..self.config.batch_size)
            .map(|_| self.utterance())
            .collect();

        let input_lengths: Vec<usize> = utterances
            .iter()
            .map(|(frames, _)| frames.len() / input_size)
            .collect();
        let max_frames = input_lengths.iter().copied().max().unwrap_or(0);

        let mut padded = vec![0f32; self.config.batch_size * max_frames * input_size];
        let mut labels = Vec::with_capacity(self.config.batch_size);

        for (i, (frames, utterance_labels)) in utterances.into_iter().enumerate() {
            let offset = i * max_frames * input_size;
            padded[offset..offset + frames.len()].copy_from_slice(&frames);
            labels.push(utterance_labels);
        }

        let inputs = Tensor::from_vec(
            padded,
            (self.config.batch_size, max_frames, input_size),
            &self.device,
        )?;

        Batch::new(inputs, labels, input_lengths)
    }
}

impl BatchSource for SyntheticCorpus {
    fn next_batch(&mut self) -> Result<Batch> {
        self.generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(label_type: LabelType, seed: u64) -> SyntheticCorpus {
        let config = CorpusConfig {
            label_type,
            input_size: 8,
            seed,
            ..CorpusConfig::default()
        };
        SyntheticCorpus::new(config, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_batch_shapes() -> Result<()> {
        let batch = corpus(LabelType::Phone, 1).generate()?;
        let (batch_size, max_frames, input_size) = batch.inputs.dims3()?;

        assert_eq!(batch_size, 4);
        assert_eq!(input_size, 8);
        assert_eq!(batch.size(), 4);
        assert_eq!(max_frames, *batch.input_lengths.iter().max().unwrap());

        for (labels, &len) in batch.labels.iter().zip(&batch.input_lengths) {
            assert!((5..=15).contains(&labels.len()));
            assert!(len >= labels.len() * 2 && len <= labels.len() * 5);
            assert!(labels.iter().all(|&l| l < 61));
        }
        Ok(())
    }

    #[test]
    fn test_padding_is_zero() -> Result<()> {
        let batch = corpus(LabelType::Character, 3).generate()?;
        let values = batch.inputs.to_vec3::<f32>()?;

        for (utterance, &len) in values.iter().zip(&batch.input_lengths) {
            for frame in &utterance[len..] {
                assert!(frame.iter().all(|&v| v == 0.0));
            }
        }
        Ok(())
    }

    #[test]
    fn test_same_seed_same_batch() -> Result<()> {
        let a = corpus(LabelType::Character, 7).generate()?;
        let b = corpus(LabelType::Character, 7).generate()?;

        assert_eq!(a.labels, b.labels);
        assert_eq!(a.input_lengths, b.input_lengths);
        assert_eq!(a.inputs.to_vec3::<f32>()?, b.inputs.to_vec3::<f32>()?);
        Ok(())
    }

    #[test]
    fn test_fixed_batch_replays() -> Result<()> {
        let batch = corpus(LabelType::Phone, 5).generate()?;
        let mut source = FixedBatch(batch.clone());

        assert_eq!(source.next_batch()?.labels, batch.labels);
        assert_eq!(source.next_batch()?.labels, batch.labels);
        Ok(())
    }

    #[test]
    fn test_batch_validation() -> Result<()> {
        let inputs = Tensor::zeros((2, 3, 4), candle_core::DType::F32, &Device::Cpu)?;
        assert!(Batch::new(inputs.clone(), vec![vec![0]], vec![3, 3]).is_err());
        assert!(Batch::new(inputs.clone(), vec![vec![0], vec![1]], vec![3, 4]).is_err());
        assert!(Batch::new(inputs, vec![vec![0], vec![1]], vec![3, 2]).is_ok());
        Ok(())
    }

    #[test]
    fn test_invalid_corpus_config() {
        let config = CorpusConfig {
            min_labels: 4,
            max_labels: 2,
            ..CorpusConfig::default()
        };
        assert!(SyntheticCorpus::new(config, &Device::Cpu).is_err());
    }
}
