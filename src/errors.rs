use thiserror::Error;

use crate::data::model::{SensorChannel, ShutterState};

/// Rejected settings. Raised before any detector runs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{channel} {shutter}: window size must be a positive odd integer, got {window_size}")]
    InvalidWindow {
        channel: SensorChannel,
        shutter: ShutterState,
        window_size: usize,
    },
    #[error("{channel} {shutter}: sigma must be positive and finite, got {sigma}")]
    InvalidSigma {
        channel: SensorChannel,
        shutter: ShutterState,
        sigma: f64,
    },
    #[error("{channel} {shutter}: minimum value {min} exceeds maximum value {max}")]
    InvertedThreshold {
        channel: SensorChannel,
        shutter: ShutterState,
        min: f64,
        max: f64,
    },
    #[error("spectral range must satisfy min < max, got ({min_band}, {max_band})")]
    InvalidSpectralRange { min_band: f64, max_band: f64 },
    #[error("diagnostic stride must be at least 1")]
    ZeroDiagnosticStride,
}

/// Failures that abort a deglitching run.
#[derive(Debug, Error, PartialEq)]
pub enum DeglitchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(
        "insufficient data to deglitch {channel} {shutter}: {records} records for a window of {window_size}"
    )]
    InsufficientData {
        channel: SensorChannel,
        shutter: ShutterState,
        records: usize,
        window_size: usize,
    },
    #[error("column '{column}' has {found} entries, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}
