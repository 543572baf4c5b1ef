//! `ar-markers` command-line tool: replay recorded detections and inspect
//! configuration files.

use std::path::{Path, PathBuf};

use ar_markers::io::{DetectionLog, TrackingConfig};
use ar_markers::replay::replay;
use ar_markers::CameraIntrinsics;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ar-markers")]
#[command(about = "Track AR markers across frames and reconcile scene objects")]
#[command(version)]
struct Cli {
    /// Raise the log level (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON log lines (only with the `tracing` feature).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded detection log through the tracker.
    Replay(ReplayArgs),

    /// Validate a tracking configuration file.
    CheckConfig {
        /// Path to the configuration (JSON).
        #[arg(long)]
        config: PathBuf,
    },

    /// Print the default intrinsics derived from a frame size.
    Intrinsics {
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
}

#[derive(Args)]
struct ReplayArgs {
    /// Path to the configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Path to the detection log (JSON).
    #[arg(long)]
    detections: PathBuf,

    /// Path to write the replay report (JSON).
    #[arg(long)]
    out: Option<PathBuf>,
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(feature = "tracing")]
fn init_logging(verbose: u8, json: bool) -> CliResult<()> {
    let level = level_for(verbose);
    tracing_log::LogTracer::init_with_filter(level)?;
    ar_markers::core::init_tracing(json, level);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8, json: bool) -> CliResult<()> {
    ar_markers::core::init_with_level(level_for(verbose))?;
    if json {
        log::warn!("--log-json needs the `tracing` feature; using plain logs");
    }
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    match cli.command {
        Commands::Replay(args) => run_replay(&args),
        Commands::CheckConfig { config } => run_check_config(&config),
        Commands::Intrinsics { width, height } => run_intrinsics(width, height),
    }
}

fn load_config(path: &Path) -> CliResult<TrackingConfig> {
    TrackingConfig::load_json(path).map_err(|e| -> CliError {
        format!("failed to load config {}: {e}", path.display()).into()
    })
}

// ── replay ────────────────────────────────────────────────────────────

fn run_replay(args: &ReplayArgs) -> CliResult<()> {
    let config = load_config(&args.config)?;
    let recording = DetectionLog::load_json(&args.detections).map_err(|e| -> CliError {
        format!("failed to load detections {}: {e}", args.detections.display()).into()
    })?;
    log::info!(
        "replaying {} frame(s) against {} marker definition(s)",
        recording.frames.len(),
        config.markers.len()
    );

    let report = replay(&config, &recording)?;

    println!("frames processed:  {}", report.stats.frames);
    println!("frames skipped:    {}", report.stats.skipped);
    println!("objects created:   {}", report.stats.created);
    println!("objects destroyed: {}", report.stats.destroyed);
    println!("objects alive:     {}", report.final_objects.len());
    for obj in &report.final_objects {
        let label = format!("{} marker {} ({})", obj.object, obj.marker_id, obj.prototype);
        match obj.transform {
            Some(t) => {
                let p = t.position;
                println!("  {label} at [{:.3}, {:.3}, {:.3}]", p.x, p.y, p.z);
            }
            None => println!("  {label}"),
        }
    }

    if let Some(out) = &args.out {
        report.write_json(out)?;
        log::info!("report written to {}", out.display());
    }
    Ok(())
}

// ── check-config ──────────────────────────────────────────────────────

fn run_check_config(path: &Path) -> CliResult<()> {
    let config = load_config(path)?;
    config.validate()?;

    println!("config ok: {}", path.display());
    println!("  dictionary:   {}", config.dictionary);
    println!("  marker size:  {}", config.marker_size);
    println!("  grace period: {}s", config.tracker.grace_period_s);
    for def in config.build_definitions()?.iter() {
        println!("  marker {:>4} -> {}", def.marker_id, def.prototype);
    }
    Ok(())
}

// ── intrinsics ────────────────────────────────────────────────────────

fn run_intrinsics(width: u32, height: u32) -> CliResult<()> {
    if width == 0 || height == 0 {
        return Err(format!("frame size must be non-zero, got {width}x{height}").into());
    }
    let k = CameraIntrinsics::from_image_size(width, height);
    println!("{}", serde_json::to_string_pretty(&k)?);
    Ok(())
}
