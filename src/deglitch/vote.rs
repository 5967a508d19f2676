use log::debug;
use rayon::prelude::*;

use super::detect::{rolling_outliers, stationary_outliers, PassFlags};
use super::threshold::threshold_outliers;
use crate::config::{DeglitchConfig, EngineSettings};
use crate::data::model::{BandColumn, Sample, ShutterState, TimeSeries};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Per-band detector output kept for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct BandDiagnostics {
    pub wavelength: f64,
    pub raw: Vec<Sample>,
    pub pass1: Vec<bool>,
    pub pass2: Vec<bool>,
    pub pass3: Vec<bool>,
}

/// The reduced vote of every band of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    /// Global bad index: `true` marks a record for removal.
    pub bad: Vec<bool>,
    /// Number of bands inside the spectral range.
    pub voting_bands: usize,
    /// Sampled per-band results, every `diagnostic_stride`-th voting band.
    pub diagnostics: Vec<BandDiagnostics>,
}

impl Vote {
    pub fn flagged(&self) -> usize {
        self.bad.iter().filter(|b| **b).count()
    }

    /// Fraction of records flagged, `0.0` for an empty series.
    pub fn flagged_fraction(&self) -> f64 {
        if self.bad.is_empty() {
            0.0
        } else {
            self.flagged() as f64 / self.bad.len() as f64
        }
    }
}

/// Result of voting one series.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    Voted(Vote),
    /// Too few records for the window; nothing was voted.
    InsufficientData { records: usize, window_size: usize },
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Smallest record count that can never be deglitched, per shutter state.
fn absolute_minimum(shutter: ShutterState) -> usize {
    match shutter {
        ShutterState::Dark => 2,
        ShutterState::Light => 5,
    }
}

/// Whether a series of `records` can be voted with `window_size`.
pub fn has_sufficient_data(shutter: ShutterState, records: usize, window_size: usize) -> bool {
    records > absolute_minimum(shutter) && records >= window_size
}

/// Detector flags of one band OR-ed into a single contribution.
pub fn band_contribution(
    band: &BandColumn,
    shutter: ShutterState,
    config: &DeglitchConfig,
    threshold_enabled: bool,
) -> (Vec<bool>, PassFlags, Vec<bool>) {
    let raw = &band.values;
    let flags = match shutter {
        ShutterState::Dark => stationary_outliers(raw, config.window_size, config.sigma),
        ShutterState::Light => rolling_outliers(raw, config.window_size, config.sigma),
    };
    let pass3 = threshold_outliers(band.wavelength, raw, config, threshold_enabled);

    let combined = flags
        .pass1
        .iter()
        .zip(&flags.pass2)
        .zip(&pass3)
        .map(|((a, b), c)| *a || *b || *c)
        .collect();
    (combined, flags, pass3)
}

/// Run every detector on every voting band and reduce to one bad index.
///
/// Bands are voted in parallel. The reduction is a plain OR, so the
/// result does not depend on band order.
pub fn vote_series(
    series: &TimeSeries,
    shutter: ShutterState,
    config: &DeglitchConfig,
    settings: &EngineSettings,
) -> VoteOutcome {
    let n = series.len();
    if !has_sufficient_data(shutter, n, config.window_size) {
        return VoteOutcome::InsufficientData {
            records: n,
            window_size: config.window_size,
        };
    }

    let range = settings.spectral_range;
    let stride = settings.diagnostic_stride.max(1);
    let voting: Vec<&BandColumn> = series
        .bands
        .iter()
        .filter(|b| range.contains(b.wavelength))
        .collect();

    let results: Vec<(Vec<bool>, Option<BandDiagnostics>)> = voting
        .par_iter()
        .enumerate()
        .map(|(k, band)| {
            let (combined, flags, pass3) =
                band_contribution(band, shutter, config, settings.threshold_enabled);
            let diagnostics = (k % stride == 0).then(|| BandDiagnostics {
                wavelength: band.wavelength,
                raw: band.values.clone(),
                pass1: flags.pass1,
                pass2: flags.pass2,
                pass3,
            });
            (combined, diagnostics)
        })
        .collect();

    let mut bad = vec![false; n];
    let mut diagnostics = Vec::new();
    for (combined, diag) in results {
        for (acc, flag) in bad.iter_mut().zip(combined) {
            *acc |= flag;
        }
        diagnostics.extend(diag);
    }

    let vote = Vote {
        bad,
        voting_bands: voting.len(),
        diagnostics,
    };
    debug!(
        "{shutter}: {} voting bands, {}/{} records flagged",
        vote.voting_bands,
        vote.flagged(),
        n
    );
    VoteOutcome::Voted(vote)
}
