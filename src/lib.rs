//! Glitch detection and removal for multi-band radiometer time series.
//!
//! Each (sensor channel, shutter state) stream is voted band by band and
//! flagged records are removed from every column of their group.

pub mod config;
pub mod data;
pub mod deglitch;
pub mod errors;

pub use config::{ChannelConfig, DeglitchConfig, EngineSettings, SpectralRange};
pub use data::model::{Capture, DatasetGroup, SensorChannel, ShutterState, TimeSeries};
pub use deglitch::deglitch_capture;
pub use errors::{ConfigError, DeglitchError};
