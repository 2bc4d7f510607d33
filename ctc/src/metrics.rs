/// Levenshtein distance between two label sequences.
pub fn edit_distance(hypothesis: &[u32], reference: &[u32]) -> usize {
    if hypothesis.is_empty() {
        return reference.len();
    }

    let mut previous: Vec<usize> = (0..=hypothesis.len()).collect();
    let mut current = vec![0; hypothesis.len() + 1];

    for (i, &r) in reference.iter().enumerate() {
        current[0] = i + 1;
        for (j, &h) in hypothesis.iter().enumerate() {
            let substitution = previous[j] + usize::from(h != r);
            let insertion = current[j] + 1;
            let deletion = previous[j + 1] + 1;
            current[j + 1] = substitution.min(insertion).min(deletion);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[hypothesis.len()]
}

/// Edit distance normalized by the reference length.
///
/// An empty reference scores 0 against an empty hypothesis and 1 otherwise.
pub fn normalized_edit_distance(hypothesis: &[u32], reference: &[u32]) -> f64 {
    if reference.is_empty() {
        return if hypothesis.is_empty() { 0.0 } else { 1.0 };
    }
    edit_distance(hypothesis, reference) as f64 / reference.len() as f64
}

/// Mean normalized edit distance over a batch.
pub fn label_error_rate(hypotheses: &[Vec<u32>], references: &[Vec<u32>]) -> f64 {
    if references.is_empty() {
        return 0.0;
    }

    let total: f64 = hypotheses
        .iter()
        .zip(references)
        .map(|(hypothesis, reference)| normalized_edit_distance(hypothesis, reference))
        .sum();

    // Missing hypotheses count as empty
    let missing = references
        .iter()
        .skip(hypotheses.len())
        .filter(|reference| !reference.is_empty())
        .count();

    (total + missing as f64) / references.len() as f64
}
