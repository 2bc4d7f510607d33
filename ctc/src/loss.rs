use candle_core::{DType, Device, IndexOp, Result, Tensor};

// Finite stand-in for log(0) so log_sum_exp never sees `-inf - -inf`
const LOG_ZERO: f32 = -1e5;

/// Mean CTC negative log-likelihood over a batch.
///
/// `log_probs` is `(batch, frames, classes)` after log-softmax, `blank` is the
/// index of the blank class. Only the first `input_lengths[b]` frames of each
/// utterance take part.
pub fn ctc_loss(
    log_probs: &Tensor,
    labels: &[Vec<u32>],
    input_lengths: &[usize],
    blank: u32,
) -> Result<Tensor> {
    let (batch_size, max_frames, num_classes) = log_probs.dims3()?;
    if labels.len() != batch_size {
        candle_core::bail!("CTC loss got {} utterances but {} labels", batch_size, labels.len());
    }
    if input_lengths.len() != batch_size {
        candle_core::bail!(
            "CTC loss got {} utterances but {} input lengths",
            batch_size,
            input_lengths.len()
        );
    }
    if blank as usize >= num_classes {
        candle_core::bail!("Blank index {} must be below {} classes", blank, num_classes);
    }

    let mut losses = Vec::with_capacity(batch_size);
    for (b, (target, &frames)) in labels.iter().zip(input_lengths).enumerate() {
        if frames == 0 || frames > max_frames {
            candle_core::bail!("Utterance {} has invalid length {}", b, frames);
        }
        if let Some(&label) = target
            .iter()
            .find(|&&label| label == blank || label as usize >= num_classes)
        {
            candle_core::bail!("Utterance {} has invalid label {}", b, label);
        }
        let required = required_frames(target);
        if frames < required {
            candle_core::bail!(
                "Utterance {} has {} frames but its {} labels need at least {}",
                b,
                frames,
                target.len(),
                required
            );
        }
        let utterance = log_probs.i(b)?.narrow(0, 0, frames)?;
        losses.push(utterance_nll(&utterance, target, blank)?);
    }

    Tensor::stack(&losses, 0)?.mean_all()
}

/// Shortest input that admits a CTC path: one frame per label plus a blank
/// between every pair of equal neighbours.
fn required_frames(target: &[u32]) -> usize {
    target.len() + target.windows(2).filter(|pair| pair[0] == pair[1]).count()
}

/// Labels with a blank before, between and after them: `a b` becomes `_ a _ b _`.
fn extend_with_blanks(target: &[u32], blank: u32) -> Vec<u32> {
    let mut extended = Vec::with_capacity(target.len() * 2 + 1);
    extended.push(blank);
    for &label in target {
        extended.push(label);
        extended.push(blank);
    }
    extended
}

/// Additive mask, 0 where the forward variable may skip from `s - 2` to `s`.
fn skip_mask(extended: &[u32], blank: u32) -> Vec<f32> {
    (0..extended.len())
        .map(|s| {
            if s >= 2 && extended[s] != blank && extended[s] != extended[s - 2] {
                0.0
            } else {
                LOG_ZERO
            }
        })
        .collect()
}

/// Numerically stable log-sum-exp along `dim`, removing that dimension.
fn log_sum_exp(xs: &Tensor, dim: usize) -> Result<Tensor> {
    let max = xs.max_keepdim(dim)?;
    let sum = xs.broadcast_sub(&max)?.exp()?.sum_keepdim(dim)?;
    (sum.log()? + max)?.squeeze(dim)
}

/// Prepends `count` log-zero entries and drops as many from the end.
fn shift_right(alpha: &Tensor, count: usize, device: &Device) -> Result<Tensor> {
    let len = alpha.dim(0)?;
    if count >= len {
        return Tensor::full(LOG_ZERO, len, device);
    }
    let padding = Tensor::full(LOG_ZERO, count, device)?;
    Tensor::cat(&[&padding, &alpha.narrow(0, 0, len - count)?], 0)
}

fn utterance_nll(log_probs: &Tensor, target: &[u32], blank: u32) -> Result<Tensor> {
    let device = log_probs.device();
    let frames = log_probs.dim(0)?;

    let extended = extend_with_blanks(target, blank);
    let states = extended.len();

    let index = Tensor::new(extended.as_slice(), device)?;
    let emissions = log_probs.index_select(&index, 1)?.to_dtype(DType::F32)?;
    let skip = Tensor::new(skip_mask(&extended, blank).as_slice(), device)?;

    // Paths may start on the leading blank or on the first label
    let start: Vec<f32> = (0..states)
        .map(|s| if s < 2 { 0.0 } else { LOG_ZERO })
        .collect();
    let mut alpha = (Tensor::new(start.as_slice(), device)? + emissions.i(0)?)?;

    for t in 1..frames {
        let stay = alpha.clone();
        let advance = shift_right(&alpha, 1, device)?;
        let skip_label = (shift_right(&alpha, 2, device)? + &skip)?;

        let paths = Tensor::stack(&[&stay, &advance, &skip_label], 0)?;
        alpha = (log_sum_exp(&paths, 0)? + emissions.i(t)?)?;
    }

    // Valid paths end on the last label or the trailing blank
    let end = alpha.narrow(0, states.saturating_sub(2), states.min(2))?;
    log_sum_exp(&end, 0)?.neg()
}
