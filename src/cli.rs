use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Checklist manager for subjects and projects.
/// Storage defaults to ~/.taskboard/task-storage.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "tb", version, about = "Subject and project checklist manager")]
pub struct Cli {
    /// Path to the JSON state file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
