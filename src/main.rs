use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use spectral_deglitch::config::EngineSettings;
use spectral_deglitch::data::{loader, writer};
use spectral_deglitch::deglitch::deglitch_capture;

#[derive(Parser, Debug)]
#[command(
    name = "spectral-deglitch",
    version,
    about = "Detect and remove glitched records from radiometer time series"
)]
struct Args {
    /// Input capture (.csv, .json or .parquet)
    #[arg(long)]
    input: PathBuf,

    /// Engine settings (JSON); built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the cleaned capture (.csv)
    #[arg(long)]
    output: PathBuf,

    /// Where to write sampled per-band detector flags (.csv)
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Force the absolute-threshold detector on
    #[arg(long, conflicts_with = "no_threshold")]
    threshold: bool,

    /// Force the absolute-threshold detector off
    #[arg(long)]
    no_threshold: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => EngineSettings::from_json_file(path)?,
        None => EngineSettings::default(),
    };
    if args.threshold {
        settings.threshold_enabled = true;
    }
    if args.no_threshold {
        settings.threshold_enabled = false;
    }

    let mut capture = loader::load_file(&args.input)?;
    let report = deglitch_capture(&mut capture, &settings)
        .with_context(|| format!("deglitching {}", args.input.display()))?;

    for group in &report.groups {
        println!(
            "{} {}: removed {} of {} records ({:.1}%)",
            group.channel,
            group.shutter,
            group.elimination.removed,
            group.elimination.before,
            100.0 * group.elimination.removed_fraction()
        );
    }

    writer::write_capture_csv(&capture, &args.output)?;
    if let Some(path) = &args.diagnostics {
        let rows = writer::write_diagnostics_csv(&report, path)?;
        log::info!("Wrote {rows} diagnostic rows to {}", path.display());
    }
    Ok(())
}
