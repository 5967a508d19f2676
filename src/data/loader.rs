use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Capture, CaptureBuilder, MetadataValue, Record, Sample, SensorChannel, ShutterState};

pub const SENSOR_COLUMN: &str = "sensor";
pub const SHUTTER_COLUMN: &str = "shutter";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a capture from a file.  Dispatch by extension.
///
/// Every format carries one record per row with the columns `sensor`
/// (ES/LI/LT), `shutter` (dark/light) and `timestamp`. Columns whose name is
/// a number are wavebands in nm; anything else is ancillary metadata.
///
/// Supported formats:
/// * `.parquet` – numeric band columns, nullable (recommended)
/// * `.json`    – `[{ "sensor": "ES", "shutter": "dark", "timestamp": 0.0, "412.5": 1.2, ... }, ...]`
/// * `.csv`     – header row, empty or `nan` cells are missing samples
pub fn load_file(path: &Path) -> Result<Capture> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let capture = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!(
        "Loaded {} records in {} groups from {}",
        capture.record_count(),
        capture.groups.len(),
        path.display()
    );
    Ok(capture)
}

/// Parse a column name as a waveband, if it is one.
pub fn band_wavelength(name: &str) -> Option<f64> {
    name.trim().parse::<f64>().ok().filter(|wl| wl.is_finite())
}

/// Fail on two columns naming the same waveband, e.g. `500` and `500.0`.
fn check_unique_bands(wavelengths: impl IntoIterator<Item = f64>) -> Result<()> {
    let mut seen: Vec<f64> = wavelengths.into_iter().collect();
    seen.sort_by(f64::total_cmp);
    if let Some(pair) = seen.windows(2).find(|w| w[0] == w[1]) {
        bail!("duplicate waveband {} nm", pair[0]);
    }
    Ok(())
}

fn parse_channel(s: &str, row: usize) -> Result<SensorChannel> {
    s.parse()
        .map_err(|e: String| anyhow::anyhow!("Row {row}: {e}"))
}

fn parse_shutter(s: &str, row: usize) -> Result<ShutterState> {
    s.parse()
        .map_err(|e: String| anyhow::anyhow!("Row {row}: {e}"))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
/// Band values may be `null`.
fn load_json(path: &Path) -> Result<Capture> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut builder = CaptureBuilder::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let channel = obj
            .get(SENSOR_COLUMN)
            .and_then(JsonValue::as_str)
            .with_context(|| format!("Row {i}: missing '{SENSOR_COLUMN}'"))?;
        let shutter = obj
            .get(SHUTTER_COLUMN)
            .and_then(JsonValue::as_str)
            .with_context(|| format!("Row {i}: missing '{SHUTTER_COLUMN}'"))?;
        let timestamp = obj
            .get(TIMESTAMP_COLUMN)
            .and_then(JsonValue::as_f64)
            .with_context(|| format!("Row {i}: missing or non-numeric '{TIMESTAMP_COLUMN}'"))?;

        let mut bands = Vec::new();
        let mut metadata = BTreeMap::new();
        for (key, val) in obj {
            if key == SENSOR_COLUMN || key == SHUTTER_COLUMN || key == TIMESTAMP_COLUMN {
                continue;
            }
            match band_wavelength(key) {
                Some(wl) => {
                    let sample = match val {
                        JsonValue::Null => None,
                        v => Some(
                            v.as_f64()
                                .with_context(|| format!("Row {i}, band {key}: not a number"))?,
                        ),
                    };
                    bands.push((wl, sample));
                }
                None => {
                    metadata.insert(key.clone(), json_to_metadata(val));
                }
            }
        }

        check_unique_bands(bands.iter().map(|(wl, _)| *wl))
            .with_context(|| format!("Row {i}"))?;
        builder.push_record(Record {
            channel: parse_channel(channel, i)?,
            shutter: parse_shutter(shutter, i)?,
            timestamp,
            bands,
            metadata,
        });
    }

    Ok(builder.finish())
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum CsvColumn {
    Sensor,
    Shutter,
    Timestamp,
    Band(f64),
    Metadata,
}

fn classify(header: &str) -> CsvColumn {
    match header {
        SENSOR_COLUMN => CsvColumn::Sensor,
        SHUTTER_COLUMN => CsvColumn::Shutter,
        TIMESTAMP_COLUMN => CsvColumn::Timestamp,
        other => band_wavelength(other).map_or(CsvColumn::Metadata, CsvColumn::Band),
    }
}

fn load_csv(path: &Path) -> Result<Capture> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let roles: Vec<CsvColumn> = headers.iter().map(|h| classify(h)).collect();
    check_unique_bands(roles.iter().filter_map(|role| match role {
        CsvColumn::Band(wl) => Some(*wl),
        _ => None,
    }))
    .context("CSV header")?;

    for required in [SENSOR_COLUMN, SHUTTER_COLUMN, TIMESTAMP_COLUMN] {
        if !headers.iter().any(|h| h == required) {
            bail!("CSV missing '{required}' column");
        }
    }

    let mut builder = CaptureBuilder::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let mut channel = None;
        let mut shutter = None;
        let mut timestamp = None;
        let mut bands = Vec::new();
        let mut metadata = BTreeMap::new();

        for (col_idx, value) in record.iter().enumerate() {
            match roles[col_idx] {
                CsvColumn::Sensor => channel = Some(parse_channel(value, row_no)?),
                CsvColumn::Shutter => shutter = Some(parse_shutter(value, row_no)?),
                CsvColumn::Timestamp => {
                    let t = value.trim().parse::<f64>().with_context(|| {
                        format!("CSV row {row_no}: timestamp '{value}' is not a number")
                    })?;
                    timestamp = Some(t);
                }
                CsvColumn::Band(wl) => bands.push((wl, parse_sample(value, row_no, &headers[col_idx])?)),
                CsvColumn::Metadata => {
                    metadata.insert(headers[col_idx].clone(), guess_metadata_type(value));
                }
            }
        }

        let (Some(channel), Some(shutter), Some(timestamp)) = (channel, shutter, timestamp) else {
            bail!("CSV row {row_no}: too few fields");
        };
        builder.push_record(Record {
            channel,
            shutter,
            timestamp,
            bands,
            metadata,
        });
    }

    Ok(builder.finish())
}

fn parse_sample(s: &str, row: usize, col: &str) -> Result<Sample> {
    let tok = s.trim();
    if tok.is_empty() || tok.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let v = tok
        .parse::<f64>()
        .with_context(|| format!("Row {row}, band {col}: '{tok}' is not a number"))?;
    Ok(Some(v))
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing a capture.
///
/// Expected schema:
/// - `sensor`, `shutter`: Utf8 or LargeUtf8
/// - `timestamp`: Float64, Float32, Int64 or Int32
/// - numeric-named Float64/Float32 columns: wavebands, nulls are missing
/// - Any other columns are treated as metadata (strings, ints, floats, bools)
fn load_parquet(path: &Path) -> Result<Capture> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut capture = CaptureBuilder::new();
    let mut row_offset = 0;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let index_of = |name: &str| {
            schema
                .index_of(name)
                .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))
        };
        let sensor_col = batch.column(index_of(SENSOR_COLUMN)?);
        let shutter_col = batch.column(index_of(SHUTTER_COLUMN)?);
        let time_col = batch.column(index_of(TIMESTAMP_COLUMN)?);

        let mut band_cols = Vec::new();
        let mut meta_cols = Vec::new();
        for (i, field) in schema.fields().iter().enumerate() {
            let name = field.name();
            if name == SENSOR_COLUMN || name == SHUTTER_COLUMN || name == TIMESTAMP_COLUMN {
                continue;
            }
            match band_wavelength(name) {
                Some(wl) => band_cols.push((wl, batch.column(i))),
                None => meta_cols.push((name.clone(), batch.column(i))),
            }
        }
        check_unique_bands(band_cols.iter().map(|(wl, _)| *wl)).context("Parquet schema")?;

        for row in 0..batch.num_rows() {
            let abs_row = row_offset + row;
            let channel = extract_string(sensor_col, row)
                .with_context(|| format!("Row {abs_row}: failed to read '{SENSOR_COLUMN}'"))?;
            let shutter = extract_string(shutter_col, row)
                .with_context(|| format!("Row {abs_row}: failed to read '{SHUTTER_COLUMN}'"))?;
            let timestamp = extract_f64(time_col, row)
                .with_context(|| format!("Row {abs_row}: failed to read '{TIMESTAMP_COLUMN}'"))?
                .with_context(|| format!("Row {abs_row}: null timestamp"))?;

            let bands = band_cols
                .iter()
                .map(|(wl, col)| {
                    extract_f64(col, row)
                        .with_context(|| format!("Row {abs_row}: failed to read band {wl}"))
                        .map(|v| (*wl, v))
                })
                .collect::<Result<Vec<_>>>()?;

            let metadata = meta_cols
                .iter()
                .map(|(name, col)| (name.clone(), extract_metadata_value(col, row)))
                .collect();

            capture.push_record(Record {
                channel: parse_channel(&channel, abs_row)?,
                shutter: parse_shutter(&shutter, abs_row)?,
                timestamp,
                bands,
                metadata,
            });
        }
        row_offset += batch.num_rows();
    }

    Ok(capture.finish())
}

// -- Parquet / Arrow helpers --

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Result<String> {
    if col.is_null(row) {
        bail!("null value in text column");
    }
    match col.data_type() {
        DataType::Utf8 => Ok(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Ok(col.as_string::<i64>().value(row).to_string()),
        other => bail!("Expected Utf8 column, got {other:?}"),
    }
}

/// Read one numeric cell; null cells are missing samples.
fn extract_f64(col: &Arc<dyn Array>, row: usize) -> Result<Sample> {
    if col.is_null(row) {
        return Ok(None);
    }
    let v = match col.data_type() {
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row),
        DataType::Float32 => col.as_primitive::<Float32Type>().value(row) as f64,
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row) as f64,
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row) as f64,
        other => bail!("Expected a numeric column, got {other:?}"),
    };
    Ok(Some(v))
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int32 => {
            MetadataValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64)
        }
        DataType::Int64 => MetadataValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => {
            MetadataValue::Float(col.as_primitive::<Float32Type>().value(row) as f64)
        }
        DataType::Float64 => MetadataValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => MetadataValue::Bool(col.as_boolean().value(row)),
        _ => MetadataValue::String(format!("{:?}", col.data_type())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_csv_with_missing_cells() {
        let file = write_temp(
            ".csv",
            "sensor,shutter,timestamp,412.5,443,lat\n\
             ES,dark,0.0,1.0,2.0,52.1\n\
             ES,dark,1.0,,nan,52.2\n\
             LT,light,0.5,3.0,4.0,\n",
        );
        let capture = load_file(file.path()).unwrap();
        assert_eq!(capture.groups.len(), 2);

        let dark = capture.group(SensorChannel::ES, ShutterState::Dark).unwrap();
        assert_eq!(dark.series.timestamps, vec![0.0, 1.0]);
        assert_eq!(dark.series.band(412.5).unwrap().values, vec![Some(1.0), None]);
        assert_eq!(dark.series.band(443.0).unwrap().values, vec![Some(2.0), None]);
        assert_eq!(dark.ancillary["lat"], vec![MetadataValue::Float(52.1), MetadataValue::Float(52.2)]);

        let light = capture.group(SensorChannel::LT, ShutterState::Light).unwrap();
        assert_eq!(light.ancillary["lat"], vec![MetadataValue::Null]);
    }

    #[test]
    fn csv_requires_key_columns() {
        let file = write_temp(".csv", "sensor,timestamp,500\nES,0,1\n");
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("shutter"));
    }

    #[test]
    fn csv_rejects_unknown_sensor() {
        let file = write_temp(".csv", "sensor,shutter,timestamp,500\nXX,dark,0,1\n");
        assert!(load_file(file.path()).is_err());
    }

    #[test]
    fn loads_json_records() {
        let file = write_temp(
            ".json",
            r#"[
                {"sensor": "LI", "shutter": "Light", "timestamp": 10.0, "500": 1.5, "600": null, "station": "A"},
                {"sensor": "LI", "shutter": "Light", "timestamp": 11.0, "500": 1.6, "600": 2.0, "station": "A"}
            ]"#,
        );
        let capture = load_file(file.path()).unwrap();
        let group = capture.group(SensorChannel::LI, ShutterState::Light).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.series.band(600.0).unwrap().values, vec![None, Some(2.0)]);
        assert_eq!(group.ancillary["station"][1], MetadataValue::String("A".into()));
    }

    #[test]
    fn csv_rejects_duplicate_wavebands() {
        let file = write_temp(".csv", "sensor,shutter,timestamp,500,500.0\nES,dark,0,1,2\n");
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate waveband 500 nm"), "{err:#}");
    }

    #[test]
    fn json_rejects_duplicate_wavebands() {
        let file = write_temp(
            ".json",
            r#"[{"sensor": "ES", "shutter": "dark", "timestamp": 0.0, "500": 1.0, "500.0": 2.0}]"#,
        );
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate waveband"), "{err:#}");
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_temp(".txt", "");
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported"));
    }

    #[test]
    fn loads_parquet_with_null_bands() {
        let schema = Arc::new(Schema::new(vec![
            Field::new(SENSOR_COLUMN, DataType::Utf8, false),
            Field::new(SHUTTER_COLUMN, DataType::Utf8, false),
            Field::new(TIMESTAMP_COLUMN, DataType::Float64, false),
            Field::new("555.0", DataType::Float64, true),
            Field::new("frame", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["ES", "ES", "LT"])),
                Arc::new(StringArray::from(vec!["dark", "dark", "light"])),
                Arc::new(Float64Array::from(vec![0.0, 1.0, 2.0])),
                Arc::new(Float64Array::from(vec![Some(1.0), None, Some(3.0)])),
                Arc::new(Int64Array::from(vec![7, 8, 9])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let capture = load_file(file.path()).unwrap();
        let dark = capture.group(SensorChannel::ES, ShutterState::Dark).unwrap();
        assert_eq!(dark.series.band(555.0).unwrap().values, vec![Some(1.0), None]);
        assert_eq!(dark.ancillary["frame"], vec![MetadataValue::Integer(7), MetadataValue::Integer(8)]);
        assert_eq!(
            capture
                .group(SensorChannel::LT, ShutterState::Light)
                .unwrap()
                .series
                .timestamps,
            vec![2.0]
        );
    }
}
