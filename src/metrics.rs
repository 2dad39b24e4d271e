use crate::model::Prediction;

/// Accuracy in [0, 1] as a percentage with two decimals, e.g. `0.8734` -> `87.34%`.
///
/// Exact halves round away from zero (`3.125` -> `3.13`), not to even.
pub fn format_accuracy(accuracy: f64) -> String {
    format!("{:.2}%", round_half_up_2(accuracy * 100.0))
}

/// `{:.2}` already rounds the exact binary value correctly; only exact ties
/// (odd multiples of 1/8 at the third decimal) need a nudge.
fn round_half_up_2(value: f64) -> f64 {
    let eighths = value * 8.0;
    let is_tie = eighths.is_finite() && eighths.fract() == 0.0 && eighths % 2.0 != 0.0;
    if !is_tie {
        return value;
    }
    let cents = (value.abs() * 100.0 + 0.5).floor();
    cents.copysign(value) / 100.0
}

/// Count (correct, total) over the returned test-set predictions.
pub fn prediction_hits(predictions: &[Prediction]) -> (usize, usize) {
    let hits = predictions.iter().filter(|p| p.is_hit()).count();
    (hits, predictions.len())
}

pub fn format_bytes(len: u64) -> String {
    const KIB: f64 = 1024.0;
    let len_f = len as f64;
    if len_f < KIB {
        format!("{len} B")
    } else if len_f < KIB * KIB {
        format!("{:.1} KiB", len_f / KIB)
    } else {
        format!("{:.1} MiB", len_f / (KIB * KIB))
    }
}
