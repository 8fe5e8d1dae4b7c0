use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hpcheck", version, about = "Headphone screening check in the terminal")]
pub struct Cli {
    /// Default log level; RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a check interactively
    Run(RunArgs),
    /// Resolve a settings file and print the effective check configuration
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Stimulus pool JSON file
    #[arg(long)]
    pub stimuli: Option<PathBuf>,

    /// Settings file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed for reproducible trial order
    #[arg(long)]
    pub seed: Option<u64>,

    /// Persist progress under this directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Command used to play a sound file, called as `<player> <src>`
    #[arg(long)]
    pub player: Option<String>,

    #[arg(long)]
    pub total_trials: Option<i64>,

    #[arg(long)]
    pub trials_per_page: Option<i64>,

    #[arg(long)]
    pub correct_threshold: Option<f64>,

    /// Skip the calibration sound
    #[arg(long)]
    pub no_calibration: bool,
}
