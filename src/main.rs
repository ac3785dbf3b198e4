// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! mudra: command-line front end for the photo and video sessions

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use mudra_studio::camera::{CaptureConstraints, SyntheticCamera};
use mudra_studio::classifier::HttpClassifier;
use mudra_studio::media::Artifact;
use mudra_studio::photo::{PhotoResult, PhotoStatus, PhotoStore};
use mudra_studio::video::{SimulatedAnalyzer, VideoReport, VideoStatus, VideoStore};
use mudra_studio::{AppConfig, MudraError, Result};

/// mudra - Bharatanatyam hand-gesture analysis
#[derive(Parser, Debug)]
#[command(name = "mudra")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Classify mudra photos and analyze dance videos", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Classifier endpoint (overrides config)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify the mudra shown in a photo
    Photo {
        /// Image file to submit
        path: PathBuf,
    },

    /// Analyze a dance video
    Video {
        /// Video file to analyze
        path: PathBuf,
    },

    /// Record from the synthetic camera
    Record {
        /// Seconds to record for
        #[arg(short, long, default_value = "3")]
        seconds: u64,

        /// Analyze the recording once it is finished
        #[arg(long)]
        analyze: bool,

        /// Write the recording to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that the classifier is reachable
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(endpoint) = cli.endpoint.clone() {
        config.classifier.url = endpoint;
        config.validate()?;
    }

    let json = cli.format == "json";
    match cli.command {
        Commands::Photo { path } => run_photo(config, &path, json).await,
        Commands::Video { path } => run_video(config, &path, json, cli.quiet).await,
        Commands::Record { seconds, analyze, output } => {
            run_record(config, seconds, analyze, output, json, cli.quiet).await
        }
        Commands::Status => run_status(config).await,
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

async fn run_photo(config: AppConfig, path: &Path, json: bool) -> Result<()> {
    let classifier = HttpClassifier::new(&config.classifier)?;
    let store = PhotoStore::new(Arc::new(classifier));

    store.upload_photo(Artifact::from_path(path)?)?;
    store.analyze().await;

    let session = store.snapshot();
    let result = session.result();
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match &result {
            Some(PhotoResult::Detected(prediction)) => {
                println!("Detected Mudra: {}", prediction.mudra);
                println!("Confidence:     {}%", prediction.confidence);
            }
            Some(PhotoResult::Failed { error }) => println!("{}", error),
            None => println!("No result ({})", session.status().as_str()),
        }
    }

    if session.status() == PhotoStatus::Errored {
        std::process::exit(2);
    }
    Ok(())
}

fn video_store(config: &AppConfig) -> VideoStore {
    let camera = SyntheticCamera::new(Duration::from_millis(config.camera.chunk_interval_ms));
    VideoStore::new(
        Box::new(camera),
        CaptureConstraints::from(&config.camera),
        Arc::new(SimulatedAnalyzer::new(&config.video)),
    )
}

/// Run analysis on whatever the store has loaded, echoing progress
async fn analyze_loaded(store: &VideoStore, json: bool, quiet: bool) -> Result<()> {
    let mut progress = store.subscribe_progress();
    let printer = if quiet || json {
        None
    } else {
        Some(tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let percent = *progress.borrow_and_update();
                println!("Analyzing... {:>3}%", percent);
                if percent == 100 {
                    break;
                }
            }
        }))
    };

    store.analyze().await?;
    if let Some(printer) = printer {
        printer.abort();
    }

    let session = store.snapshot();
    match session.report() {
        Some(report) if json => println!("{}", serde_json::to_string_pretty(report)?),
        Some(report) => print_report(report),
        None => {
            let reason = session.error().unwrap_or("no report produced").to_string();
            return Err(MudraError::Analysis(reason));
        }
    }
    Ok(())
}

async fn run_video(config: AppConfig, path: &Path, json: bool, quiet: bool) -> Result<()> {
    let store = video_store(&config);
    store.upload_video(Artifact::from_path(path)?).await?;
    analyze_loaded(&store, json, quiet).await
}

async fn run_record(
    config: AppConfig,
    seconds: u64,
    analyze: bool,
    output: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let store = video_store(&config);

    if let Err(e) = store.start_camera().await {
        eprintln!("Could not access camera. Please ensure you have granted camera permissions.");
        return Err(e);
    }
    store.start_recording().await?;
    info!("Recording for {}s", seconds);
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    store.stop_recording().await?;

    let session = store.snapshot();
    if let Some(source) = session.source() {
        info!("Recorded {} bytes as {}", source.artifact.len(), source.uri);
        if let Some(output) = &output {
            std::fs::write(output, &source.artifact.bytes)?;
            info!("Saved recording to {:?}", output);
        }
    }

    if analyze {
        analyze_loaded(&store, json, quiet).await?;
    } else if session.status() != VideoStatus::FileLoaded {
        warn!("Recording ended in state {}", session.status().as_str());
    }
    Ok(())
}

fn print_report(report: &VideoReport) {
    println!("Video Information");
    println!("  Length:       {}", report.duration_label);
    println!("  FPS:          {}", report.fps);
    println!("  Total Frames: {}", report.total_frames);
    println!();
    println!("Detected Mudras ({})", report.gestures_identified);
    for gesture in &report.detected_gestures {
        println!(
            "  {:<18} {:>3}%  Frame: {} | Duration: {}",
            gesture.name, gesture.confidence_percent, gesture.frame_timestamp_label, gesture.duration_label
        );
    }
    println!();
    println!("Performance");
    println!("  Overall Accuracy:     {}%", report.overall_accuracy);
    println!("  Gesture Quality:      {}%", report.gesture_quality);
    println!("  Emotional Expression: {}", report.emotional_expression);
    println!();
    println!("Recommendations");
    for rec in &report.recommendations {
        println!("  - {}", rec);
    }
}

async fn run_status(config: AppConfig) -> Result<()> {
    let client = HttpClassifier::new(&config.classifier)?;

    println!("mudra v{} Status", env!("CARGO_PKG_VERSION"));
    println!("==================");

    match client.health_check().await {
        Ok(()) => println!("Classifier: Running ({})", client.url()),
        Err(e) => println!("Classifier: Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Upload field: {}", config.classifier.field_name);
    println!("  Camera:       {}x{} ({})", config.camera.width, config.camera.height, config.camera.mime_type);
    println!(
        "  Analysis:     {}% every {}ms",
        config.video.step_percent, config.video.step_interval_ms
    );

    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Classifier: {}", config.classifier.url);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_photo_command() {
        let cli = Cli::try_parse_from(["mudra", "photo", "/tmp/pataka.jpg"]).unwrap();
        match cli.command {
            Commands::Photo { path } => assert_eq!(path, PathBuf::from("/tmp/pataka.jpg")),
            _ => panic!("Expected Photo command"),
        }
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_cli_record_command() {
        let cli = Cli::try_parse_from([
            "mudra", "record", "--seconds", "5", "--analyze", "--format", "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Record { seconds, analyze, output } => {
                assert_eq!(seconds, 5);
                assert!(analyze);
                assert!(output.is_none());
            }
            _ => panic!("Expected Record command"),
        }
        assert_eq!(cli.format, "json");
    }

    #[test]
    fn test_cli_endpoint_override() {
        let cli = Cli::try_parse_from([
            "mudra", "--endpoint", "http://127.0.0.1:5000/predict", "status",
        ])
        .unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("http://127.0.0.1:5000/predict"));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["mudra", "--format", "xml", "status"]).is_err());
    }
}
