use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Smooth spectral shape peaking in the blue-green.
fn spectrum_shape(wavelength: f64, scale: f64) -> f64 {
    scale * (gaussian(wavelength, 480.0, 120.0, 1.0) + gaussian(wavelength, 680.0, 60.0, 0.3))
}

struct Row {
    sensor: &'static str,
    shutter: &'static str,
    timestamp: f64,
    values: Vec<Option<f64>>,
    latitude: f64,
}

fn main() {
    let mut rng = StdRng::seed_from_u64(42);

    // Wavebands: 300 → ~900 nm, step 3.3
    let wavelengths: Vec<f64> = (0..182).map(|i| 300.0 + i as f64 * 3.3).collect();

    let sensors = [("ES", 120.0), ("LI", 8.0), ("LT", 3.0)];
    let dark_records = 60;
    let light_records = 240;
    let dark_noise = Normal::new(0.0, 0.002).expect("valid normal");

    let mut rows: Vec<Row> = Vec::new();
    for &(sensor, scale) in &sensors {
        for i in 0..dark_records {
            let values = wavelengths
                .iter()
                .map(|_| Some(0.05 + dark_noise.sample(&mut rng)))
                .collect();
            rows.push(Row {
                sensor,
                shutter: "dark",
                timestamp: i as f64 * 4.0,
                values,
                latitude: 41.5,
            });
        }

        for i in 0..light_records {
            let t = i as f64;
            // Passing cloud: slow modulation of the light level.
            let sky = 1.0 + 0.15 * (t / 40.0).sin();
            let values = wavelengths
                .iter()
                .map(|&wl| {
                    let signal = spectrum_shape(wl, scale * sky);
                    let noise = Normal::new(0.0, 0.003 * signal.max(1e-3)).expect("valid normal");
                    Some(signal + noise.sample(&mut rng))
                })
                .collect();
            rows.push(Row {
                sensor,
                shutter: "light",
                timestamp: t,
                values,
                latitude: 41.5 + t * 1e-4,
            });
        }
    }

    // Inject glitches: isolated spikes across whole spectra, and dropouts.
    let mut glitches = 0;
    for row in rows.iter_mut() {
        let draw: f64 = rng.gen();
        if draw < 0.02 {
            let factor = if rng.gen_bool(0.5) { 25.0 } else { -10.0 };
            for v in row.values.iter_mut().flatten() {
                let bump = factor * v.abs().max(0.01);
                *v += bump;
            }
            glitches += 1;
        } else if draw < 0.03 {
            let band = rng.gen_range(0..row.values.len());
            row.values[band] = None;
        }
    }

    // Build Arrow arrays
    let mut fields = vec![
        Field::new("sensor", DataType::Utf8, false),
        Field::new("shutter", DataType::Utf8, false),
        Field::new("timestamp", DataType::Float64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(rows.iter().map(|r| r.sensor).collect::<Vec<_>>())),
        Arc::new(StringArray::from(rows.iter().map(|r| r.shutter).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(rows.iter().map(|r| r.timestamp).collect::<Vec<_>>())),
    ];
    for (b, wl) in wavelengths.iter().enumerate() {
        fields.push(Field::new(format!("{wl:.1}"), DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(
            rows.iter().map(|r| r.values[b]).collect::<Vec<_>>(),
        )));
    }
    fields.push(Field::new("latitude", DataType::Float64, false));
    columns.push(Arc::new(Float64Array::from(
        rows.iter().map(|r| r.latitude).collect::<Vec<_>>(),
    )));

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).expect("Failed to create RecordBatch");

    // Write Parquet
    let output_path = "sample_capture.parquet";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {} records ({} wavebands each, {glitches} glitched) to {output_path}",
        rows.len(),
        wavelengths.len()
    );
}
