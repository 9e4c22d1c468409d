//! # tb - subject and project checklists
//!
//! A small command-line checklist manager. Tasks live in named groups, each either a
//! **Subject** (something you study) or a **Project** (something you build).
//!
//! ## Key Features
//!
//! - **Rich Task Metadata**: description, link, image, tags, priority and due dates
//! - **Recurring Tasks**: completing a repeating task queues its next occurrence
//! - **Statistics**: completion rates, tasks due this week, overdue counts
//! - **Search**: case-insensitive over titles, descriptions and tags
//! - **Export/Import**: full-fidelity JSON backups and a plain-text checklist outline
//!
//! ## Quick Start
//!
//! ```bash
//! tb group add "Maths" --type subject
//! tb add "Problem set 4" --group maths --due friday --tag homework
//! tb add "Water plants" --group home --every weekly
//! tb done "Problem set 4"
//! tb list
//! tb stats
//! tb export --format txt
//! ```
//!
//! Data is stored in `~/.taskboard/task-storage.json` (override the directory with
//! `TASKBOARD_HOME` or the file with `--db`). Set `RUST_LOG=debug` for diagnostics.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod cmd;
pub mod db;
pub mod error;
pub mod export;
pub mod fields;
pub mod recurrence;
pub mod search;
pub mod session;
pub mod stats;
pub mod store;
pub mod task;
pub mod time;

use cli::Cli;
use db::STATE_FILE;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let db_path = cli.db.unwrap_or_else(|| {
        let data_dir = std::env::var_os("TASKBOARD_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".taskboard")
            });
        data_dir.join(STATE_FILE)
    });

    if let Err(e) = cmd::run(cli.command, &db_path) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
