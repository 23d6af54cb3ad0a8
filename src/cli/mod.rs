use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "dashboard-remarks")]
#[command(about = "Business dashboard backend with an 8-stage remark workflow")]
#[command(long_about = "Serves tabular company data from a Google Sheet or local table file and \
                       tracks a remark (stage, annotation and audit history) per record. \
                       Start the API with 'dashboard-remarks serve'.")]
pub struct Cli {
    /// Configuration file to use instead of dashboard-remarks.toml / .dashboard-remarks-rc
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API until interrupted
    Serve,
    /// List the configured workflow stages
    Stages,
    /// Show dashboard rows from the configured record source
    Records {
        /// Maximum number of rows to print
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Column filter, repeatable (e.g. --filter Country=India)
        #[arg(long = "filter", value_name = "COLUMN=VALUE")]
        filters: Vec<String>,
        /// Only records whose remark is currently in this stage
        #[arg(long)]
        stage: Option<String>,
    },
    /// Inspect or change the remark attached to a record
    Remark {
        #[command(subcommand)]
        action: RemarkAction,
    },
}

#[derive(Subcommand)]
pub enum RemarkAction {
    /// Print the current stage and annotation
    Show {
        /// Record id (zero-based row index)
        record_id: u64,
    },
    /// Move a record to a stage with a new annotation
    Set {
        /// Record id (zero-based row index)
        record_id: u64,
        /// Target stage label (case-insensitive)
        stage: String,
        /// Annotation text
        #[arg(long, default_value = "")]
        text: String,
        /// Actor name recorded in the history
        #[arg(long = "as", value_name = "ACTOR", default_value = "cli")]
        actor: String,
        /// Allow leaving a terminal stage
        #[arg(long)]
        force: bool,
    },
    /// Print the transition history, oldest first
    History {
        /// Record id (zero-based row index)
        record_id: u64,
    },
}
