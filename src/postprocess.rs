use std::cmp::Reverse;

use ndarray::Array1;
use ordered_float::OrderedFloat;
use serde::Serialize;

/// One ranked class of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_id: String,
    /// Display form of the label, see [`format_label`].
    pub name: String,
    /// Probability in `[0, 1]`.
    pub confidence: f32,
}

/// Up to K predictions, highest confidence first.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PredictionResult {
    pub predictions: Vec<Prediction>,
}

impl PredictionResult {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn top(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.predictions.iter()
    }
}

/// Applies softmax to a 1D array (slice) and returns a new Array1<f32>.
pub fn softmax(slice: &Array1<f32>) -> Array1<f32> {
    let max_val = slice.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_vals: Array1<f32> = slice.mapv(|x| (x - max_val).exp());
    let sum_exp: f32 = exp_vals.sum();
    exp_vals.mapv(|v| v / sum_exp)
}

/// Indices and scores of the `k` largest scores, descending. Ties keep index order.
pub fn top_k(scores: &Array1<f32>, k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by_key(|&(index, score)| (Reverse(OrderedFloat(score)), index));
    ranked.truncate(k);
    ranked
}

/// Replaces underscores with spaces and title-cases every word.
///
/// A letter is upper-cased when it follows a non-letter and lower-cased otherwise,
/// so `black-and-tan_coonhound` becomes `Black-And-Tan Coonhound`.
pub fn format_label(raw: &str) -> String {
    let mut formatted = String::with_capacity(raw.len());
    let mut after_letter = false;
    for ch in raw.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if after_letter {
                formatted.extend(ch.to_lowercase());
            } else {
                formatted.extend(ch.to_uppercase());
            }
            after_letter = true;
        } else {
            formatted.push(ch);
            after_letter = false;
        }
    }
    formatted
}
