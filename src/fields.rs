//! Enumerations and field types for the checklist board.
//!
//! This module defines the structured values used to categorise tasks and groups,
//! including the group category, task priorities, recurrence intervals and export formats.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What a group (and the tasks inside it) is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(alias = "subject")]
    Subject,
    #[serde(alias = "project")]
    Project,
}

/// Priority classification for task importance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "urgent")]
    Urgent,
}

/// Calendar unit a recurring task repeats on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[serde(alias = "Daily")]
    Daily,
    #[serde(alias = "Weekly")]
    Weekly,
    #[serde(alias = "Monthly")]
    Monthly,
}

/// Data formats a board can be exported to.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Txt,
}

impl ExportFormat {
    /// Default file name used when no output path is given.
    pub fn default_file_name(self) -> &'static str {
        match self {
            ExportFormat::Json => "tasks-backup.json",
            ExportFormat::Txt => "tasks-checklist.txt",
        }
    }
}

/// Format a category for display.
pub fn format_category(c: Category) -> &'static str {
    match c {
        Category::Subject => "Subject",
        Category::Project => "Project",
    }
}

/// Format a priority for display.
pub fn format_priority(p: Option<Priority>) -> &'static str {
    match p {
        Some(Priority::Low) => "Low",
        Some(Priority::Medium) => "Medium",
        Some(Priority::High) => "High",
        Some(Priority::Urgent) => "Urgent",
        None => "-",
    }
}

/// Format a recurrence interval for display.
pub fn format_interval(i: Interval) -> &'static str {
    match i {
        Interval::Daily => "daily",
        Interval::Weekly => "weekly",
        Interval::Monthly => "monthly",
    }
}
