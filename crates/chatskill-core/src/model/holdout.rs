//! Deterministic stratified train/eval split.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chatskill_types::model::TrainingExample;

/// Largest share of a group that may be held out.
const MAX_RATIO: f64 = 0.5;

/// Split `examples` into `(train, eval)`.
///
/// Examples are grouped by intent label (slot-only examples share one
/// group). From each group the last `floor(len * ratio)` examples are held
/// out. If that leaves the eval set empty, the last example of the largest
/// group (the earliest such group on ties) is held out instead, provided the
/// group has at least two examples, so no label leaves training entirely.
/// Both halves keep the input order.
pub fn stratified_split(
    examples: &[TrainingExample],
    ratio: f64,
) -> (Vec<TrainingExample>, Vec<TrainingExample>) {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, MAX_RATIO)
    } else {
        0.0
    };

    let mut groups: BTreeMap<Option<&str>, Vec<usize>> = BTreeMap::new();
    for (position, example) in examples.iter().enumerate() {
        groups
            .entry(example.intent.as_deref())
            .or_default()
            .push(position);
    }

    let mut held_out = vec![false; examples.len()];
    for positions in groups.values() {
        let take = (positions.len() as f64 * ratio).floor() as usize;
        for &position in positions.iter().rev().take(take) {
            held_out[position] = true;
        }
    }
    if ratio > 0.0
        && !held_out.iter().any(|h| *h)
        && let Some(largest) = groups
            .values()
            .filter(|positions| positions.len() >= 2)
            .min_by_key(|positions| (Reverse(positions.len()), positions[0]))
        && let Some(&last) = largest.last()
    {
        held_out[last] = true;
    }

    let mut train = Vec::new();
    let mut eval = Vec::new();
    for (example, is_eval) in examples.iter().zip(held_out) {
        if is_eval {
            eval.push(example.clone());
        } else {
            train.push(example.clone());
        }
    }
    (train, eval)
}
