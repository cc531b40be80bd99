//! ShotCheck - Localized screenshot text verification
//!
//! Reads a specification of expected UI strings, recognizes the text on the
//! matching screenshots in each target language and reports which strings
//! actually render.

mod analysis;
mod app;
mod config;
mod corpus;
mod errors;
mod pipeline;
mod report;
mod shared;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{RunSettings, ShotCheckApp};
use crate::config::AppConfig;
use crate::report::{console_summary, JsonReportRenderer, ReportRenderer};
use crate::vision::{ImageAnnotator, TesseractConfig, TesseractRecognizer, TextRecognizer};

/// ShotCheck - verify localized strings on screenshots
#[derive(Parser, Debug)]
#[command(name = "shotcheck", version)]
#[command(about = "Batch verification that localized UI strings render correctly on screenshots")]
struct Args {
    /// Specification file (CSV rows with confirmed text)
    #[arg(short = 'c', long = "csv", required_unless_present = "write_default_config")]
    csv: Option<PathBuf>,

    /// Directory searched (recursively) for screenshots
    #[arg(short = 'i', long = "images", required_unless_present = "write_default_config")]
    images: Option<PathBuf>,

    /// Root for annotated screenshots [default: directory of the report]
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Report file
    #[arg(short = 'r', long = "report", default_value = "shotcheck_report.json")]
    report: PathBuf,

    /// Minimum similarity for a match, between 0 and 1
    #[arg(short = 't', long = "threshold", value_parser = parse_threshold)]
    threshold: Option<f32>,

    /// Number of worker threads
    #[arg(short = 'w', long = "workers", value_parser = clap::value_parser!(u16).range(1..))]
    workers: Option<u16>,

    /// Cancel the remaining jobs after this many failed jobs
    #[arg(long = "max-failed-jobs", value_parser = clap::value_parser!(u16).range(1..))]
    max_failed_jobs: Option<u16>,

    /// Configuration file [default: user config directory]
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

fn parse_threshold(value: &str) -> Result<f32, String> {
    let threshold: f32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("{threshold} is outside [0, 1]"));
    }
    Ok(threshold)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => storage::default_config_path()?,
    };

    if args.write_default_config {
        config::save_config(&AppConfig::default(), &config_path)?;
        println!("Default configuration written to {}", config_path.display());
        return Ok(());
    }

    let (mut config, config_source) = load_or_default_config(&config_path, args.config.is_some())?;
    apply_overrides(&mut config, &args);

    // Initialize logging
    let level = if args.verbose { "debug" } else { config.general.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shotcheck={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ShotCheck starting...");
    config_source.log();
    config.validate()?;

    // Required unless --write-default-config, which returned above
    let corpus_path = args.csv.clone().context("--csv is required")?;
    let image_dir = args.images.clone().context("--images is required")?;
    let output_root = args
        .output
        .clone()
        .unwrap_or_else(|| report_parent(&args.report));

    let app = ShotCheckApp::new(RunSettings::from_config(
        &config,
        &corpus_path,
        &image_dir,
        &output_root,
    ))?;

    let annotator = Arc::new(ImageAnnotator::new(
        &config.annotation.matched_color,
        &config.annotation.unmatched_color,
        config.annotation.stroke_width,
    )?);
    let tesseract = TesseractConfig {
        command: config.recognition.tesseract_cmd.clone(),
        tessdata_dir: config.recognition.tessdata_dir.clone(),
        page_segmentation_mode: config.recognition.page_segmentation_mode,
        granularity: config.matching.granularity,
    };

    let output = app
        .run(
            |code: &str| -> Result<Box<dyn TextRecognizer>> {
                Ok(Box::new(TesseractRecognizer::new(tesseract, code)?))
            },
            annotator,
        )
        .map_err(|e| {
            error!("Run aborted: {}", e);
            e
        })?;

    let report = app.report(&output);
    JsonReportRenderer {
        pretty: config.report.pretty,
    }
    .render(&report, &args.report)?;

    print!("{}", console_summary(&report));
    println!("Report: {}", args.report.display());

    info!("ShotCheck finished");
    Ok(())
}

/// Where the configuration came from
#[derive(Debug, PartialEq)]
enum ConfigSource {
    File(PathBuf),
    Defaults,
    /// Default-location file that failed to load
    Ignored(PathBuf, String),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {:?}", path),
            ConfigSource::Defaults => info!("Using default configuration"),
            ConfigSource::Ignored(path, reason) => {
                warn!("Ignoring configuration {:?} ({}), using defaults", path, reason)
            }
        }
    }
}

/// Load configuration from file or fall back to defaults.
///
/// A file named explicitly must load; the default location may be absent
/// or broken.
fn load_or_default_config(path: &Path, explicit: bool) -> Result<(AppConfig, ConfigSource)> {
    if explicit {
        let config = config::load_config(path)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }
    if !path.exists() {
        return Ok((AppConfig::default(), ConfigSource::Defaults));
    }
    match config::load_config(path) {
        Ok(config) => Ok((config, ConfigSource::File(path.to_path_buf()))),
        Err(e) => Ok((
            AppConfig::default(),
            ConfigSource::Ignored(path.to_path_buf(), format!("{e:#}")),
        )),
    }
}

/// Command-line values win over the configuration file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(threshold) = args.threshold {
        config.matching.confidence_threshold = threshold;
    }
    if let Some(workers) = args.workers {
        config.pool.workers = usize::from(workers);
    }
    if let Some(limit) = args.max_failed_jobs {
        config.pool.max_failed_jobs = Some(usize::from(limit));
    }
}

fn report_parent(report: &Path) -> PathBuf {
    match report.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
