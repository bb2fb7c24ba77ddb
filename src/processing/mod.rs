pub mod buffer;
pub mod edges;
pub mod filters;
pub mod park;
pub mod sequence;
pub mod signal_processor;
pub mod spectrum;
pub mod speed;
pub mod vectors;

use std::cmp::Ordering;

/// Median with the two middle values averaged for even lengths; 0.0 when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sign as -1.0, 0.0 or 1.0 (zero maps to zero, unlike `f64::signum`).
pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
