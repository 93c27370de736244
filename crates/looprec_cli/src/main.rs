//! LoopRec CLI
//!
//! Continuous loop recording with space-bounded retention.
//!
//! # Commands
//!
//! - `record` - Record segments until Ctrl-C, evicting the oldest as needed
//! - `inspect` - List retained segments and volume space
//! - `prune` - Run one retention pass without recording

mod commands;
mod settings;

use clap::{Args, Parser, Subcommand};
use settings::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Loop recorder with space-bounded retention.
#[derive(Parser)]
#[command(name = "looprec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the recording directory
    #[arg(global = true, short, long, env = "LOOPREC_PATH")]
    path: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(global = true, short, long, env = "LOOPREC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record segments until interrupted
    Record {
        /// Encoder command template using {output}, {duration_ms}, {duration_secs}
        #[arg(long, env = "LOOPREC_CAPTURE_CMD")]
        capture_cmd: Option<String>,

        /// Bytes written to the encoder's stdin to end a segment early
        #[arg(long)]
        finish_input: Option<String>,

        /// Seconds a finishing encoder gets before it is killed
        #[arg(long)]
        finish_grace: Option<u64>,

        /// Keep partial files from failed captures
        #[arg(long)]
        keep_failed: bool,

        #[command(flatten)]
        recorder: RecorderArgs,
    },

    /// List retained segments and volume space
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        #[command(flatten)]
        recorder: RecorderArgs,
    },

    /// Evict the oldest segments until the threshold is met
    Prune {
        /// Dry run - show what would be deleted
        #[arg(short, long)]
        dry_run: bool,

        #[command(flatten)]
        recorder: RecorderArgs,
    },

    /// Show version information
    Version,
}

/// Options shared by commands that work on a recording directory.
#[derive(Args)]
struct RecorderArgs {
    /// Segment length in seconds
    #[arg(long)]
    segment_secs: Option<u64>,

    /// Minimum free space to keep, in MiB
    #[arg(long, env = "LOOPREC_THRESHOLD_MB")]
    threshold_mb: Option<u64>,

    /// Segment file name prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Segment file suffix
    #[arg(long)]
    suffix: Option<String>,

    /// Also run retention every N seconds while recording
    #[arg(long)]
    retention_interval: Option<u64>,
}

impl RecorderArgs {
    fn into_settings(self, path: Option<PathBuf>) -> Settings {
        Settings {
            volume_path: path,
            segment_secs: self.segment_secs,
            threshold_mb: self.threshold_mb,
            file_prefix: self.prefix,
            file_suffix: self.suffix,
            retention_interval_secs: self.retention_interval,
            ..Settings::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let file = Settings::load_optional(cli.config.as_deref())?;

    match cli.command {
        Commands::Record {
            capture_cmd,
            finish_input,
            finish_grace,
            keep_failed,
            recorder,
        } => {
            let flags = Settings {
                capture_command: capture_cmd,
                finish_input,
                finish_grace_secs: finish_grace,
                discard_failed_segments: keep_failed.then_some(false),
                ..recorder.into_settings(cli.path)
            };
            let settings = file.merge(flags);
            let capture = settings
                .capture()?
                .ok_or("Encoder command required for record (--capture-cmd)")?;
            commands::record::run(settings.recorder_config(), capture)?;
        }
        Commands::Inspect { format, recorder } => {
            let settings = file.merge(recorder.into_settings(cli.path));
            commands::inspect::run(&settings.recorder_config(), &format)?;
        }
        Commands::Prune { dry_run, recorder } => {
            let settings = file.merge(recorder.into_settings(cli.path));
            commands::prune::run(&settings.recorder_config(), dry_run)?;
        }
        Commands::Version => {
            println!("LoopRec CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("LoopRec Core v{}", looprec_core::VERSION);
        }
    }

    Ok(())
}
