//! dubsync - Audio/Video Re-synchronization
//!
//! Entry point: aligns a replacement audio track to a video by
//! cross-correlation and remuxes the pair with ffmpeg.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dubsync::cli::{Args, Commands};
use dubsync::config::Config;
use dubsync::job::SyncJob;
use dubsync::workflow::Synchronizer;

const DEFAULT_CONFIG_FILE: &str = "dubsync.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    info!("Starting dubsync - Audio/Video Re-synchronization");

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Sync { video, audio, output, tolerance_ms, offset, keep_temp } => {
            if let Some(tolerance_ms) = tolerance_ms {
                config.sync.tolerance_ms = tolerance_ms;
            }
            if let Some(offset) = offset {
                config.sync.manual_offset_secs = offset;
            }
            config.sync.keep_temp |= keep_temp;

            let synchronizer = Synchronizer::new(config)?;
            let job = SyncJob::new(video, audio, output)
                .with_config(&synchronizer.config().sync)
                .with_debug(args.verbose);

            let progress = (!args.verbose).then(|| spinner("Synchronizing audio..."));
            let result = synchronizer.sync(&job).await;
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }
            let report = result?;

            println!(
                "Calculated offset: {:.3} seconds (total applied: {:.3} seconds)",
                report.alignment.offset_secs, report.total_offset_secs
            );
            println!("Audio synced to video: {}", report.output_path.display());
        }
        Commands::Probe { files } => {
            let synchronizer = Synchronizer::new(config)?;
            for file in files {
                let media = synchronizer.probe(&file).await?;
                println!("{:<60} {:>10.3}s", media.path.display(), media.duration_secs);
            }
        }
        Commands::Align { reference, audio } => {
            let synchronizer = Synchronizer::new(config)?;

            let progress = (!args.verbose).then(|| spinner("Correlating audio..."));
            let result = synchronizer.align_files(&reference, &audio).await;
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }
            let alignment = result?;

            println!("Lag: {} samples @ {} Hz", alignment.lag_samples, alignment.sample_rate);
            println!("Offset: {:.3} seconds", alignment.offset_secs);
            if !alignment.has_signal() {
                println!("Warning: no correlatable signal in the leading segment, lag set to 0");
            }
        }
        Commands::Reference { video, output } => {
            let synchronizer = Synchronizer::new(config)?;
            let reference = synchronizer.write_reference(&video, &output).await?;
            println!("Reference audio ({}) written to {}", reference.source, reference.path.display());
        }
        Commands::Check => {
            let synchronizer = Synchronizer::new(config)?;
            synchronizer.media().check_availability().await?;
            for version in synchronizer.media().version_info().await? {
                println!("{}", version);
            }
        }
    }

    info!("dubsync completed successfully");
    Ok(())
}

/// Spinner shown while external tools run
fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".dubsync").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "dubsync.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("dubsync.log").display()
    );

    Ok(())
}
