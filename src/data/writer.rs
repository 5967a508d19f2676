use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::loader::{SENSOR_COLUMN, SHUTTER_COLUMN, TIMESTAMP_COLUMN};
use super::model::{Capture, SensorChannel, ShutterState};
use crate::deglitch::RunReport;

// ---------------------------------------------------------------------------
// Cleaned capture
// ---------------------------------------------------------------------------

/// Write a capture in the CSV layout [`super::loader::load_file`] reads.
///
/// Columns are the union over all groups; cells a group does not have
/// are left empty. A ragged group is an error and nothing is written.
pub fn write_capture_csv(capture: &Capture, path: &Path) -> Result<()> {
    for group in capture.groups.values() {
        group
            .check_consistent()
            .with_context(|| format!("writing {} {}", group.channel, group.shutter))?;
    }

    let mut wavelengths: Vec<f64> = capture
        .groups
        .values()
        .flat_map(|g| g.series.wavelengths())
        .collect();
    wavelengths.sort_by(f64::total_cmp);
    wavelengths.dedup();
    let meta_names: BTreeSet<&String> = capture
        .groups
        .values()
        .flat_map(|g| g.ancillary.keys())
        .collect();

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec![
        SENSOR_COLUMN.to_string(),
        SHUTTER_COLUMN.to_string(),
        TIMESTAMP_COLUMN.to_string(),
    ];
    header.extend(wavelengths.iter().map(|wl| wl.to_string()));
    header.extend(meta_names.iter().map(|name| name.to_string()));
    writer.write_record(&header).context("writing CSV header")?;

    for group in capture.groups.values() {
        let bands: Vec<Option<&Vec<Option<f64>>>> = wavelengths
            .iter()
            .map(|wl| group.series.band(*wl).map(|b| &b.values))
            .collect();

        for (row, timestamp) in group.series.timestamps.iter().enumerate() {
            let mut fields = Vec::with_capacity(header.len());
            fields.push(group.channel.to_string());
            fields.push(group.shutter.to_string().to_ascii_lowercase());
            fields.push(timestamp.to_string());
            for band in &bands {
                let cell = band
                    .and_then(|values| values[row])
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                fields.push(cell);
            }
            for name in &meta_names {
                let cell = group
                    .ancillary
                    .get(*name)
                    .map(|column| column[row].to_string())
                    .unwrap_or_default();
                fields.push(cell);
            }
            writer
                .write_record(&fields)
                .with_context(|| format!("writing {} {} row {row}", group.channel, group.shutter))?;
        }
    }

    writer.flush().context("flushing CSV")?;
    log::info!("Wrote {} records to {}", capture.record_count(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct DiagnosticRow {
    sensor: SensorChannel,
    shutter: ShutterState,
    wavelength: f64,
    record: usize,
    raw: Option<f64>,
    pass1: bool,
    pass2: bool,
    pass3: bool,
}

/// Write the sampled per-band detector output in long format, one row per
/// (group, band, record).
pub fn write_diagnostics_csv(report: &RunReport, path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut rows = 0;
    for group in &report.groups {
        for band in &group.diagnostics {
            for record in 0..band.raw.len() {
                writer
                    .serialize(DiagnosticRow {
                        sensor: group.channel,
                        shutter: group.shutter,
                        wavelength: band.wavelength,
                        record,
                        raw: band.raw[record],
                        pass1: band.pass1[record],
                        pass2: band.pass2[record],
                        pass3: band.pass3[record],
                    })
                    .context("writing diagnostics row")?;
                rows += 1;
            }
        }
    }

    writer.flush().context("flushing diagnostics")?;
    Ok(rows)
}
