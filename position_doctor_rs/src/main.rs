use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use flate2::read::GzDecoder;
use log::info;
use serde::de::DeserializeOwned;
use serde_json::json;

use position_doctor_rs::input::{samples_from_points, PointsFile};
use position_doctor_rs::pipeline::{Pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Diagnose and correct a GPS trajectory")]
struct Args {
    /// Points JSON (optionally .gz): `[[lat, lon, unix_time, ele?], ...]`
    /// or `{"points": [...], "options": {...}}`
    input: PathBuf,

    /// Pipeline config JSON (partial files override only what they name)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simplification tolerance (meters)
    #[arg(long)]
    epsilon: Option<f64>,

    /// Speed anomaly ceiling (km/h)
    #[arg(long)]
    max_speed: Option<f64>,

    /// Jump anomaly ceiling (meters)
    #[arg(long)]
    max_jump: Option<f64>,

    /// Simplifier worker threads (1 = sequential)
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, default_value_t = false)]
    no_smoothing: bool,

    #[arg(long, default_value_t = false)]
    no_interpolation: bool,

    #[arg(long, default_value_t = false)]
    no_simplification: bool,

    #[arg(long, default_value_t = false)]
    no_outlier_removal: bool,

    /// Leave corrected samples out of the report
    #[arg(long, default_value_t = false)]
    omit_samples: bool,

    /// Pretty-print the report
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    serde_json::from_reader(BufReader::new(reader))
        .with_context(|| format!("parsing {}", path.display()))
}

/// Inline options, then `--config`, then individual flags
fn merge_config(inline: Option<PipelineConfig>, args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => load_json(path)?,
        None => inline.unwrap_or_default(),
    };

    if let Some(eps) = args.epsilon {
        config.simplifier.epsilon_m = eps;
    }
    if let Some(speed) = args.max_speed {
        config.detector.max_speed_kmh = speed;
    }
    if let Some(jump) = args.max_jump {
        config.detector.max_jump_m = jump;
    }
    if let Some(workers) = args.workers {
        config.simplifier.workers = workers.max(1);
    }
    config.stages.smoothing &= !args.no_smoothing;
    config.stages.interpolation &= !args.no_interpolation;
    config.stages.simplification &= !args.no_simplification;
    config.stages.outlier_removal &= !args.no_outlier_removal;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let started = Instant::now();
    let file: PointsFile = load_json(&args.input)?;
    let (points, inline) = file.into_parts();
    let config = merge_config(inline, &args)?;

    let samples = samples_from_points(&points)
        .with_context(|| format!("validating {}", args.input.display()))?;
    info!("loaded {} points from {}", samples.len(), args.input.display());

    let mut report = Pipeline::new(config).run(samples)?;
    if args.omit_samples {
        report.samples.clear();
    }

    let mut output = serde_json::to_value(&report)?;
    if let Some(obj) = output.as_object_mut() {
        obj.insert(
            "meta".to_string(),
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "processed_at": chrono::Utc::now().to_rfc3339(),
                "processing_time_ms": started.elapsed().as_secs_f64() * 1000.0,
            }),
        );
    }

    let text = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(())
}
