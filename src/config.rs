use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::{SensorChannel, ShutterState};
use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// DeglitchConfig – detector parameters for one (channel, shutter) pair
// ---------------------------------------------------------------------------

/// Parameters of one deglitch invocation.
///
/// `window_size` and `sigma` are required in a settings file; the bounds
/// are optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeglitchConfig {
    /// Moving-average window; positive and odd.
    pub window_size: usize,
    /// Residual multiplier above which a sample is an outlier.
    pub sigma: f64,
    /// Absolute lower bound, applied to `reference_band` only.
    #[serde(default)]
    pub min_value: Option<f64>,
    /// Absolute upper bound, applied to `reference_band` only.
    #[serde(default)]
    pub max_value: Option<f64>,
    /// The single waveband the absolute bounds apply to.
    #[serde(default)]
    pub reference_band: Option<f64>,
}

impl DeglitchConfig {
    pub fn default_for(shutter: ShutterState) -> Self {
        let window_size = match shutter {
            ShutterState::Dark => 11,
            ShutterState::Light => 5,
        };
        DeglitchConfig {
            window_size,
            sigma: 3.0,
            min_value: None,
            max_value: None,
            reference_band: None,
        }
    }

    pub fn validate(
        &self,
        channel: SensorChannel,
        shutter: ShutterState,
    ) -> Result<(), ConfigError> {
        if self.window_size == 0 || self.window_size % 2 == 0 {
            return Err(ConfigError::InvalidWindow {
                channel,
                shutter,
                window_size: self.window_size,
            });
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(ConfigError::InvalidSigma {
                channel,
                shutter,
                sigma: self.sigma,
            });
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(ConfigError::InvertedThreshold {
                    channel,
                    shutter,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

impl Default for DeglitchConfig {
    fn default() -> Self {
        Self::default_for(ShutterState::Light)
    }
}

/// Dark and light parameters of one sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub dark: DeglitchConfig,
    pub light: DeglitchConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            dark: DeglitchConfig::default_for(ShutterState::Dark),
            light: DeglitchConfig::default_for(ShutterState::Light),
        }
    }
}

impl ChannelConfig {
    pub fn get(&self, shutter: ShutterState) -> &DeglitchConfig {
        match shutter {
            ShutterState::Dark => &self.dark,
            ShutterState::Light => &self.light,
        }
    }
}

// ---------------------------------------------------------------------------
// SpectralRange – which wavebands vote
// ---------------------------------------------------------------------------

/// Open interval of wavebands (nm) that take part in voting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralRange {
    pub min_band: f64,
    pub max_band: f64,
}

impl Default for SpectralRange {
    fn default() -> Self {
        SpectralRange {
            min_band: 350.0,
            max_band: 850.0,
        }
    }
}

impl SpectralRange {
    /// Strictly inside `(min_band, max_band)`.
    pub fn contains(&self, wavelength: f64) -> bool {
        wavelength > self.min_band && wavelength < self.max_band
    }
}

// ---------------------------------------------------------------------------
// EngineSettings – everything one run needs, built once
// ---------------------------------------------------------------------------

/// Immutable settings for a processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Master switch for the whole engine.
    pub enabled: bool,
    /// Switch for the absolute-threshold detector.
    pub threshold_enabled: bool,
    pub spectral_range: SpectralRange,
    /// Keep diagnostics for every Nth voting band.
    pub diagnostic_stride: usize,
    /// Per-channel overrides; absent channels use the defaults.
    pub channels: BTreeMap<SensorChannel, ChannelConfig>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            enabled: true,
            threshold_enabled: false,
            spectral_range: SpectralRange::default(),
            diagnostic_stride: 20,
            channels: BTreeMap::new(),
        }
    }
}

impl EngineSettings {
    /// Read settings from a JSON document. Omitted channels and shutter
    /// blocks take the defaults; a present block must set `window_size`
    /// and `sigma`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings: EngineSettings =
            serde_json::from_str(&text).context("parsing settings JSON")?;
        Ok(settings)
    }

    pub fn config_for(&self, channel: SensorChannel, shutter: ShutterState) -> DeglitchConfig {
        match self.channels.get(&channel) {
            Some(cfg) => *cfg.get(shutter),
            None => DeglitchConfig::default_for(shutter),
        }
    }

    /// Reject unusable settings before any detector runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.spectral_range;
        if !(range.min_band < range.max_band) {
            return Err(ConfigError::InvalidSpectralRange {
                min_band: range.min_band,
                max_band: range.max_band,
            });
        }
        if self.diagnostic_stride == 0 {
            return Err(ConfigError::ZeroDiagnosticStride);
        }
        for channel in SensorChannel::ALL {
            for shutter in [ShutterState::Dark, ShutterState::Light] {
                self.config_for(channel, shutter).validate(channel, shutter)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = EngineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(
            settings.config_for(SensorChannel::ES, ShutterState::Dark).window_size,
            11
        );
        assert_eq!(
            settings.config_for(SensorChannel::LT, ShutterState::Light).window_size,
            5
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "threshold_enabled": true,
            "channels": {
                "LI": { "light": { "window_size": 7, "sigma": 2.5, "min_value": 0.0, "reference_band": 555.0 } }
            }
        }"#;
        let settings: EngineSettings = serde_json::from_str(json).unwrap();
        assert!(settings.enabled);
        assert!(settings.threshold_enabled);
        assert_eq!(settings.spectral_range, SpectralRange::default());

        let light = settings.config_for(SensorChannel::LI, ShutterState::Light);
        assert_eq!(light.window_size, 7);
        assert_eq!(light.min_value, Some(0.0));
        assert_eq!(light.max_value, None);
        assert_eq!(light.reference_band, Some(555.0));

        let dark = settings.config_for(SensorChannel::LI, ShutterState::Dark);
        assert_eq!(dark, DeglitchConfig::default_for(ShutterState::Dark));
    }

    #[test]
    fn partial_shutter_block_is_rejected() {
        for json in [
            r#"{ "channels": { "ES": { "dark": { "sigma": 2.5 } } } }"#,
            r#"{ "channels": { "ES": { "light": { "window_size": 7 } } } }"#,
        ] {
            let err = serde_json::from_str::<EngineSettings>(json).unwrap_err();
            assert!(err.to_string().contains("missing field"), "{err}");
        }
    }

    #[test]
    fn partial_settings_file_fails_to_load() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{ "channels": { "LT": { "dark": { "sigma": 3.0 } } } }"#,
        )
        .unwrap();
        assert!(EngineSettings::from_json_file(file.path()).is_err());
    }

    #[test]
    fn rejects_even_and_zero_windows() {
        for window_size in [0, 4] {
            let cfg = DeglitchConfig {
                window_size,
                ..DeglitchConfig::default()
            };
            assert!(matches!(
                cfg.validate(SensorChannel::ES, ShutterState::Light),
                Err(ConfigError::InvalidWindow { .. })
            ));
        }
    }

    #[test]
    fn rejects_bad_sigma_and_bounds() {
        let cfg = DeglitchConfig {
            sigma: 0.0,
            ..DeglitchConfig::default()
        };
        assert!(matches!(
            cfg.validate(SensorChannel::ES, ShutterState::Dark),
            Err(ConfigError::InvalidSigma { .. })
        ));

        let cfg = DeglitchConfig {
            sigma: f64::NAN,
            ..DeglitchConfig::default()
        };
        assert!(cfg.validate(SensorChannel::ES, ShutterState::Dark).is_err());

        let cfg = DeglitchConfig {
            min_value: Some(5.0),
            max_value: Some(1.0),
            ..DeglitchConfig::default()
        };
        assert!(matches!(
            cfg.validate(SensorChannel::ES, ShutterState::Dark),
            Err(ConfigError::InvertedThreshold { .. })
        ));
    }

    #[test]
    fn rejects_bad_channel_override_through_settings() {
        let mut settings = EngineSettings::default();
        let mut channel = ChannelConfig::default();
        channel.dark.window_size = 2;
        settings.channels.insert(SensorChannel::LT, channel);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidWindow {
                channel: SensorChannel::LT,
                shutter: ShutterState::Dark,
                window_size: 2
            })
        ));
    }

    #[test]
    fn spectral_range_is_open() {
        let range = SpectralRange::default();
        assert!(!range.contains(350.0));
        assert!(range.contains(350.1));
        assert!(range.contains(849.9));
        assert!(!range.contains(850.0));

        let settings = EngineSettings {
            spectral_range: SpectralRange {
                min_band: 700.0,
                max_band: 400.0,
            },
            ..EngineSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
