//! Residual outlier detectors.
//!
//! Both detectors compare each raw sample against its local moving average
//! and flag it when the residual leaves `± sigma * dispersion`. They differ
//! only in the dispersion estimate:
//!
//! * [`stationary_outliers`] (dark data): one standard deviation of the
//!   residual over the whole series.
//! * [`rolling_outliers`] (light data): a trailing rolling standard
//!   deviation of the residual, with exploded windows clamped to the median.
//!
//! Each runs twice. The second pass masks everything the first pass flagged,
//! re-derives average and dispersion from what is left, and tests the
//! original samples again.

use log::debug;

use super::stats;
use super::window::{is_edge, moving_average};
use crate::data::model::Sample;

/// Flags of both passes of a residual detector.
#[derive(Debug, Clone, PartialEq)]
pub struct PassFlags {
    pub pass1: Vec<bool>,
    pub pass2: Vec<bool>,
}

/// Which dispersion estimate a detector uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispersion {
    /// Single standard deviation over the whole series.
    Stationary,
    /// Per-index rolling standard deviation.
    Rolling,
}

/// Raw minus moving average, missing where the raw sample is missing.
fn residual(raw: &[Sample], avg: &[f64]) -> Vec<Sample> {
    raw.iter()
        .zip(avg)
        .map(|(r, a)| r.map(|v| v - a))
        .collect()
}

/// Per-index dispersion of the residual for the chosen estimate.
fn dispersion(kind: Dispersion, residual: &[Sample], window_size: usize) -> Vec<Option<f64>> {
    match kind {
        Dispersion::Stationary => {
            let std = stats::std_dev(residual);
            if !std.is_some_and(|s| s > 0.0) {
                debug!("degenerate residual spread {std:?}, no statistical outliers");
            }
            vec![std; residual.len()]
        }
        Dispersion::Rolling => rolling_dispersion(residual, window_size),
    }
}

/// Rolling standard deviation of a residual with exploded windows clamped.
pub fn rolling_dispersion(residual: &[Sample], window_size: usize) -> Vec<Option<f64>> {
    let mut rolling = stats::rolling_std(residual, window_size);
    if let Some(med) = stats::clamp_exploded(&mut rolling) {
        debug!("rolling spread median {med:.6}");
    }
    rolling
}

/// Average and dispersion derived from `basis`, the series the statistics
/// are estimated on.
pub fn local_statistics(
    kind: Dispersion,
    basis: &[Sample],
    window_size: usize,
) -> (Vec<f64>, Vec<Option<f64>>) {
    let avg = moving_average(basis, window_size);
    let res = residual(basis, &avg);
    let spread = dispersion(kind, &res, window_size);
    (avg, spread)
}

/// Apply the flagging rule to `raw` against precomputed statistics.
fn flag(raw: &[Sample], avg: &[f64], spread: &[Option<f64>], window_size: usize, sigma: f64) -> Vec<bool> {
    let n = raw.len();
    (0..n)
        .map(|i| {
            if is_edge(i, n, window_size) {
                return true;
            }
            let Some(value) = raw[i] else {
                // A missing sample cannot be assessed.
                return false;
            };
            match spread[i] {
                Some(s) if s > 0.0 => {
                    value > avg[i] + sigma * s || value < avg[i] - sigma * s
                }
                _ => false,
            }
        })
        .collect()
}

/// Two-pass residual test of one waveband.
pub fn residual_outliers(kind: Dispersion, raw: &[Sample], window_size: usize, sigma: f64) -> PassFlags {
    let (avg, spread) = local_statistics(kind, raw, window_size);
    let pass1 = flag(raw, &avg, &spread, window_size, sigma);

    let masked: Vec<Sample> = raw
        .iter()
        .zip(&pass1)
        .map(|(v, bad)| if *bad { None } else { *v })
        .collect();
    let (avg, spread) = local_statistics(kind, &masked, window_size);
    let pass2 = flag(raw, &avg, &spread, window_size, sigma);

    PassFlags { pass1, pass2 }
}

/// Outlier test for shuttered (dark) data with stationary noise.
pub fn stationary_outliers(raw: &[Sample], window_size: usize, sigma: f64) -> PassFlags {
    residual_outliers(Dispersion::Stationary, raw, window_size, sigma)
}

/// Outlier test for exposed (light) data with drifting conditions.
pub fn rolling_outliers(raw: &[Sample], window_size: usize, sigma: f64) -> PassFlags {
    residual_outliers(Dispersion::Rolling, raw, window_size, sigma)
}
