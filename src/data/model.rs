use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DeglitchError;

/// One measured value. `None` marks a missing sample.
pub type Sample = Option<f64>;

// ---------------------------------------------------------------------------
// SensorChannel / ShutterState – the keys of a dataset group
// ---------------------------------------------------------------------------

/// Radiometer sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SensorChannel {
    /// Downwelling irradiance.
    ES,
    /// Sky radiance.
    LI,
    /// Total water-leaving radiance.
    LT,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 3] = [SensorChannel::ES, SensorChannel::LI, SensorChannel::LT];
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorChannel::ES => "ES",
            SensorChannel::LI => "LI",
            SensorChannel::LT => "LT",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SensorChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ES" => Ok(SensorChannel::ES),
            "LI" => Ok(SensorChannel::LI),
            "LT" => Ok(SensorChannel::LT),
            other => Err(format!("unknown sensor channel '{other}'")),
        }
    }
}

/// Acquisition mode of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutterState {
    /// Shuttered: measures the sensor noise floor.
    Dark,
    /// Exposed: measures the signal.
    Light,
}

impl fmt::Display for ShutterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutterState::Dark => write!(f, "Dark"),
            ShutterState::Light => write!(f, "Light"),
        }
    }
}

impl FromStr for ShutterState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(ShutterState::Dark),
            "light" => Ok(ShutterState::Light),
            other => Err(format!("unknown shutter state '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in an ancillary column
// ---------------------------------------------------------------------------

/// A dynamically-typed ancillary value (GPS fix, tilt, heading, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeSeries – the band-major view of one (channel, shutter) stream
// ---------------------------------------------------------------------------

/// All values of one waveband across the records of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct BandColumn {
    /// Waveband centre in nm.
    pub wavelength: f64,
    /// One entry per record.
    pub values: Vec<Sample>,
}

/// Ordered records of one sensor channel in one shutter state.
///
/// Stored band-major: the detectors walk one waveband at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    /// Record timestamps, one per record.
    pub timestamps: Vec<f64>,
    /// Waveband columns sorted by ascending wavelength.
    pub bands: Vec<BandColumn>,
}

impl TimeSeries {
    /// Build a series, sorting the bands by wavelength.
    pub fn new(timestamps: Vec<f64>, mut bands: Vec<BandColumn>) -> Self {
        bands.sort_by(|a, b| a.wavelength.total_cmp(&b.wavelength));
        TimeSeries { timestamps, bands }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn wavelengths(&self) -> impl Iterator<Item = f64> + '_ {
        self.bands.iter().map(|b| b.wavelength)
    }

    /// Look up a band column by wavelength (exact match).
    pub fn band(&self, wavelength: f64) -> Option<&BandColumn> {
        self.bands.iter().find(|b| b.wavelength == wavelength)
    }
}

// ---------------------------------------------------------------------------
// DatasetGroup – series plus every parallel column sharing its index space
// ---------------------------------------------------------------------------

/// Everything recorded for one (channel, shutter) pair of an input file.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetGroup {
    pub channel: SensorChannel,
    pub shutter: ShutterState,
    pub series: TimeSeries,
    /// Ancillary columns: column_name → one value per record.
    pub ancillary: BTreeMap<String, Vec<MetadataValue>>,
}

impl DatasetGroup {
    pub fn new(channel: SensorChannel, shutter: ShutterState, series: TimeSeries) -> Self {
        DatasetGroup {
            channel,
            shutter,
            series,
            ancillary: BTreeMap::new(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Verify that every column has exactly one entry per record.
    pub fn check_consistent(&self) -> Result<(), DeglitchError> {
        let expected = self.series.timestamps.len();
        let band_lens = self
            .series
            .bands
            .iter()
            .map(|b| (b.wavelength.to_string(), b.values.len()));
        let meta_lens = self.ancillary.iter().map(|(k, v)| (k.clone(), v.len()));

        for (column, found) in band_lens.chain(meta_lens) {
            if found != expected {
                return Err(DeglitchError::ColumnLengthMismatch {
                    column,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Capture – all groups of one input file
// ---------------------------------------------------------------------------

/// The dataset groups of one processing run, keyed by (channel, shutter).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    pub groups: BTreeMap<(SensorChannel, ShutterState), DatasetGroup>,
}

impl Capture {
    pub fn group(&self, channel: SensorChannel, shutter: ShutterState) -> Option<&DatasetGroup> {
        self.groups.get(&(channel, shutter))
    }

    pub fn group_mut(
        &mut self,
        channel: SensorChannel,
        shutter: ShutterState,
    ) -> Option<&mut DatasetGroup> {
        self.groups.get_mut(&(channel, shutter))
    }

    pub fn insert(&mut self, group: DatasetGroup) {
        self.groups.insert((group.channel, group.shutter), group);
    }

    /// Total number of records across all groups.
    pub fn record_count(&self) -> usize {
        self.groups.values().map(DatasetGroup::len).sum()
    }
}

// ---------------------------------------------------------------------------
// CaptureBuilder – row-wise assembly used by the loaders
// ---------------------------------------------------------------------------

/// One decoded input row.
#[derive(Debug, Clone)]
pub struct Record {
    pub channel: SensorChannel,
    pub shutter: ShutterState,
    pub timestamp: f64,
    /// (wavelength, value) pairs. Non-finite values become missing.
    pub bands: Vec<(f64, Sample)>,
    pub metadata: BTreeMap<String, MetadataValue>,
}

#[derive(Debug, Default)]
struct PendingGroup {
    timestamps: Vec<f64>,
    bands: Vec<BandColumn>,
    ancillary: BTreeMap<String, Vec<MetadataValue>>,
}

impl PendingGroup {
    fn band_mut(&mut self, wavelength: f64) -> &mut BandColumn {
        let pos = match self.bands.iter().position(|b| b.wavelength == wavelength) {
            Some(pos) => pos,
            None => {
                // Band first seen mid-stream: earlier records lack it.
                self.bands.push(BandColumn {
                    wavelength,
                    values: vec![None; self.timestamps.len()],
                });
                self.bands.len() - 1
            }
        };
        &mut self.bands[pos]
    }

    fn push(&mut self, record: Record) {
        let row = self.timestamps.len();
        self.timestamps.push(record.timestamp);

        for (wavelength, value) in record.bands {
            let column = self.band_mut(wavelength);
            column.values.resize(row, None);
            column.values.push(value.filter(|v| v.is_finite()));
        }
        for (name, value) in record.metadata {
            let column = self.ancillary.entry(name).or_default();
            column.resize(row, MetadataValue::Null);
            column.push(value);
        }

        // Pad columns this record did not mention.
        let n = self.timestamps.len();
        for column in &mut self.bands {
            column.values.resize(n, None);
        }
        for column in self.ancillary.values_mut() {
            column.resize(n, MetadataValue::Null);
        }
    }
}

/// Accumulates decoded rows into rectangular dataset groups.
#[derive(Debug, Default)]
pub struct CaptureBuilder {
    pending: BTreeMap<(SensorChannel, ShutterState), PendingGroup>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_record(&mut self, record: Record) {
        self.pending
            .entry((record.channel, record.shutter))
            .or_default()
            .push(record);
    }

    pub fn finish(self) -> Capture {
        let groups = self
            .pending
            .into_iter()
            .map(|((channel, shutter), pending)| {
                let series = TimeSeries::new(pending.timestamps, pending.bands);
                let group = DatasetGroup {
                    channel,
                    shutter,
                    series,
                    ancillary: pending.ancillary,
                };
                ((channel, shutter), group)
            })
            .collect();
        Capture { groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(shutter: ShutterState, t: f64, bands: &[(f64, Sample)]) -> Record {
        Record {
            channel: SensorChannel::LT,
            shutter,
            timestamp: t,
            bands: bands.to_vec(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn parses_channel_and_shutter_case_insensitively() {
        assert_eq!("es".parse::<SensorChannel>(), Ok(SensorChannel::ES));
        assert_eq!(" Lt ".parse::<SensorChannel>(), Ok(SensorChannel::LT));
        assert_eq!("DARK".parse::<ShutterState>(), Ok(ShutterState::Dark));
        assert!("shade".parse::<ShutterState>().is_err());
        assert!("XX".parse::<SensorChannel>().is_err());
    }

    #[test]
    fn builder_pads_ragged_records() {
        let mut builder = CaptureBuilder::new();
        builder.push_record(record(ShutterState::Light, 0.0, &[(500.0, Some(1.0))]));
        builder.push_record(record(
            ShutterState::Light,
            1.0,
            &[(400.0, Some(2.0)), (500.0, Some(f64::NAN))],
        ));
        let mut third = record(ShutterState::Light, 2.0, &[(400.0, Some(3.0))]);
        third
            .metadata
            .insert("tilt".to_string(), MetadataValue::Float(1.5));
        builder.push_record(third);

        let capture = builder.finish();
        let group = capture
            .group(SensorChannel::LT, ShutterState::Light)
            .unwrap();
        group.check_consistent().unwrap();

        assert_eq!(group.len(), 3);
        let wl: Vec<f64> = group.series.wavelengths().collect();
        assert_eq!(wl, vec![400.0, 500.0]);
        assert_eq!(
            group.series.band(400.0).unwrap().values,
            vec![None, Some(2.0), Some(3.0)]
        );
        assert_eq!(
            group.series.band(500.0).unwrap().values,
            vec![Some(1.0), None, None]
        );
        assert_eq!(
            group.ancillary["tilt"],
            vec![
                MetadataValue::Null,
                MetadataValue::Null,
                MetadataValue::Float(1.5)
            ]
        );
    }

    #[test]
    fn builder_keeps_groups_apart() {
        let mut builder = CaptureBuilder::new();
        builder.push_record(record(ShutterState::Dark, 0.0, &[(500.0, Some(1.0))]));
        builder.push_record(record(ShutterState::Light, 0.0, &[(500.0, Some(9.0))]));
        builder.push_record(record(ShutterState::Light, 1.0, &[(500.0, Some(8.0))]));

        let capture = builder.finish();
        assert_eq!(capture.groups.len(), 2);
        assert_eq!(capture.record_count(), 3);
        assert_eq!(
            capture
                .group(SensorChannel::LT, ShutterState::Dark)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn inconsistent_group_is_reported() {
        let series = TimeSeries::new(
            vec![0.0, 1.0],
            vec![BandColumn {
                wavelength: 412.0,
                values: vec![Some(1.0)],
            }],
        );
        let group = DatasetGroup::new(SensorChannel::ES, ShutterState::Dark, series);
        match group.check_consistent() {
            Err(DeglitchError::ColumnLengthMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
