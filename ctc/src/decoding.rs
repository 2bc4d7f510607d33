use candle_core::{Result, Tensor, D};

/// Best path decoding.
///
/// Takes the most likely class per frame, merges repeats and drops blanks:
/// `a a _ b b _ b` becomes `a b b`. Only the first `input_lengths[b]` frames of
/// each utterance are read.
pub fn greedy_decode(logits: &Tensor, input_lengths: &[usize], blank: u32) -> Result<Vec<Vec<u32>>> {
    let best = logits.argmax(D::Minus1)?.to_vec2::<u32>()?;
    if best.len() != input_lengths.len() {
        candle_core::bail!(
            "Decoding {} utterances with {} lengths",
            best.len(),
            input_lengths.len()
        );
    }

    Ok(best
        .iter()
        .zip(input_lengths)
        .map(|(frames, &len)| collapse(&frames[..len.min(frames.len())], blank))
        .collect())
}

/// Merges repeated frame labels and removes blanks.
pub fn collapse(frames: &[u32], blank: u32) -> Vec<u32> {
    let mut labels = Vec::new();
    let mut previous = blank;

    for &label in frames {
        if label != blank && label != previous {
            labels.push(label);
        }
        previous = label;
    }
    labels
}
