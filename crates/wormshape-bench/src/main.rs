//! wormshape-bench: CLI tool for detector parameter experimentation and diagnostics.
//!
//! Runs the worm shape detector on a given image file with configurable
//! parameters, printing per-stage diagnostics, the status code and the
//! detected center line. Useful for:
//!
//! - Tuning the threshold factor, blur sigma and curvature peak delta
//! - Checking which fallback branch a frame ends up in
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin wormshape-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `wormshape=info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wormshape::{
    DetectionDiagnostics, DetectionHints, DetectionResult, DetectorConfig, Polarity,
    detect_shape_with_diagnostics,
};

/// Detector parameter experimentation and diagnostics for wormshape.
///
/// Runs shape detection on a given image with configurable parameters and
/// prints per-stage timing, the legacy status code and the center line.
#[derive(Parser)]
#[command(name = "wormshape-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Gaussian blur sigma (0 disables smoothing).
    #[arg(long, default_value_t = DetectorConfig::DEFAULT_SIGMA)]
    sigma: f32,

    /// Multiplier applied to Otsu's threshold level.
    #[arg(long, default_value_t = DetectorConfig::DEFAULT_THRESHOLD_FACTOR)]
    threshold_factor: f64,

    /// Fixed threshold level; overrides --threshold-factor.
    #[arg(long)]
    absolute_threshold: Option<f64>,

    /// The worm is darker than the background.
    #[arg(long)]
    dark: bool,

    /// Number of center line points.
    #[arg(long, default_value_t = DetectorConfig::DEFAULT_NPOINTS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(2..))]
    npoints: usize,

    /// Number of samples along the contour and each side.
    #[arg(long, default_value_t = DetectorConfig::DEFAULT_NCONTOUR, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(4..))]
    ncontour: usize,

    /// Minimum curvature peak prominence for head/tail candidates.
    #[arg(long, default_value_t = DetectorConfig::DEFAULT_DELTA)]
    delta: f64,

    /// Expected body area in square pixels, used to pick among contours.
    #[arg(long)]
    size_hint: Option<f64>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output result and diagnostics as JSON instead of a report.
    #[arg(long)]
    json: bool,

    /// Full detector config as a JSON string.
    ///
    /// When provided, all other detector parameter flags are ignored.
    /// The JSON must be a valid `DetectorConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`DetectorConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<DetectorConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(DetectorConfig {
        sigma: (cli.sigma > 0.0).then_some(cli.sigma),
        absolute_threshold: cli.absolute_threshold,
        threshold_factor: cli.threshold_factor,
        polarity: if cli.dark {
            Polarity::Dark
        } else {
            Polarity::Bright
        },
        npoints: cli.npoints,
        ncontour: cli.ncontour,
        delta: cli.delta,
        ..DetectorConfig::default()
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wormshape=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let image = match wormshape::grayscale::decode_frame(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        path = %cli.image_path.display(),
        bytes = image_bytes.len(),
        width = image.width(),
        height = image.height(),
        "loaded frame"
    );

    let hints = DetectionHints {
        size: cli.size_hint,
        ..DetectionHints::default()
    };

    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (result, diagnostics) = match detect_shape_with_diagnostics(&image, &config, &hints) {
            Ok(output) => output,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return ExitCode::FAILURE;
            }
        };

        if cli.json {
            let output = serde_json::json!({
                "result": &result,
                "diagnostics": &diagnostics,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
            println!();
            print_result(&result);
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Print the status code and the center line with its width.
fn print_result(result: &DetectionResult) {
    println!("Status code: {}", result.outcome.code());
    println!("{:>4} {:>10} {:>10} {:>8}", "#", "x", "y", "width");
    for (i, (p, w)) in result.center.iter().zip(&result.width).enumerate() {
        println!("{i:>4} {:>10.2} {:>10.2} {w:>8.2}", p.x, p.y);
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&DetectionDiagnostics) -> Option<std::time::Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[DetectionDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(30));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Blur", |d| d.blur.as_ref().map(|s| s.duration)),
        ("Threshold", |d| d.threshold.as_ref().map(|s| s.duration)),
        ("Selection", |d| d.selection.as_ref().map(|s| s.duration)),
        ("Head/Tail", |d| d.head_tail.as_ref().map(|s| s.duration)),
        ("Sides", |d| d.sides.as_ref().map(|s| s.duration)),
        ("Midline", |d| d.midline.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<16} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_a_config() {
        let cli = Cli::parse_from([
            "wormshape-bench",
            "frame.png",
            "--dark",
            "--sigma",
            "0",
            "--npoints",
            "31",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.polarity, Polarity::Dark);
        assert_eq!(config.sigma, None);
        assert_eq!(config.npoints, 31);
        assert_eq!(config.ncontour, DetectorConfig::DEFAULT_NCONTOUR);
    }

    #[test]
    fn json_config_overrides_flags() {
        let cli = Cli::parse_from([
            "wormshape-bench",
            "frame.png",
            "--npoints",
            "31",
            "--config-json",
            r#"{"npoints": 11, "delta": 0.2}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.npoints, 11);
        assert!((config.delta - 0.2).abs() < 1e-12);
    }

    #[test]
    fn malformed_json_is_reported() {
        let cli = Cli::parse_from(["wormshape-bench", "frame.png", "--config-json", "{"]);
        assert!(config_from_cli(&cli).is_err());
    }
}
