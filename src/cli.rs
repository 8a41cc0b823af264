use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gridpilot", version, about = "Orchestrates oracle-driven spreadsheet tasks")]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose console output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every task in a dataset file
    Run {
        /// Path to the dataset JSON file
        dataset: PathBuf,

        /// Override the configured revision budget
        #[arg(long)]
        max_revisions: Option<u32>,

        /// Override the configured oracle model
        #[arg(long)]
        model: Option<String>,
    },

    /// Show the recorded report for one task
    Report {
        /// Task identifier
        id: String,
    },
}
