use crate::config::DeglitchConfig;
use crate::data::model::Sample;

/// Wavelength tolerance (nm) for matching the reference band.
pub const BAND_TOLERANCE: f64 = 1e-6;

/// Flag samples outside the configured absolute bounds.
///
/// Only active on the configured reference band and only when `enabled`;
/// everywhere else the result is all-false. A bound of `0.0` is a real
/// bound. Missing samples are never flagged.
pub fn threshold_outliers(
    wavelength: f64,
    raw: &[Sample],
    config: &DeglitchConfig,
    enabled: bool,
) -> Vec<bool> {
    let on_reference = config
        .reference_band
        .is_some_and(|r| (r - wavelength).abs() <= BAND_TOLERANCE);
    if !enabled || !on_reference {
        return vec![false; raw.len()];
    }

    raw.iter()
        .map(|sample| match sample {
            Some(v) => {
                config.min_value.is_some_and(|min| *v < min)
                    || config.max_value.is_some_and(|max| *v > max)
            }
            None => false,
        })
        .collect()
}
