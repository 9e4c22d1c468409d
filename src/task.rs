//! Task data structures.
//!
//! This module defines the plain data shapes held by the store: tasks, the groups that
//! own them, recurrence settings and the derived statistics block. None of these types
//! carry behaviour beyond construction helpers; every mutation goes through `TaskStore`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::fields::*;
use crate::time::Millis;

/// Recurrence settings for a task: repeat every `frequency` units of `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurring {
    pub enabled: bool,
    pub interval: Interval,
    pub frequency: u32,
}

impl Recurring {
    pub fn every(frequency: u32, interval: Interval) -> Self {
        Recurring { enabled: true, interval, frequency }
    }
}

/// A single checklist item with optional metadata.
///
/// `parent` is a back-reference to the owning group's id; ownership lives in
/// `TaskGroup::tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    pub category: Category,
    pub parent: String,
    pub created_at: Millis,
    pub updated_at: Millis,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Millis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<Recurring>,
}

impl Task {
    /// Whether completing this task should spawn a successor.
    pub fn is_recurring(&self) -> bool {
        self.recurring.is_some_and(|r| r.enabled)
    }

    /// Tags as a slice, empty when none were ever set.
    pub fn tag_list(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

/// Optional fields merged verbatim into a task at creation time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    pub description: Option<String>,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<Priority>,
    pub due_date: Option<Millis>,
    pub recurring: Option<Recurring>,
}

impl TaskOptions {
    pub(crate) fn apply(self, task: &mut Task) {
        task.description = self.description;
        task.link = self.link;
        task.image_url = self.image_url;
        task.tags = self.tags;
        task.priority = self.priority;
        task.due_date = self.due_date;
        task.recurring = self.recurring;
    }
}

/// A named, ordered collection of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Category,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub created_at: Millis,
    pub updated_at: Millis,
    pub order: i64,
}

impl TaskGroup {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }
}

/// Aggregates derived from the current groups. Never authoritative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub completion_percentage: f64,
    pub today_completion_percentage: f64,
    pub upcoming_due_tasks: usize,
    pub overdue_tasks_count: usize,
}

/// Everything the store holds, in the shape it is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub task_groups: Vec<TaskGroup>,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub statistics: Statistics,
    /// Ids of completed recurring tasks whose successor has already been spawned.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub regenerated: BTreeSet<String>,
}
