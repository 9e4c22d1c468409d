//! Export and import formats.
//!
//! JSON is the full-fidelity backup format (`{ "taskGroups": [...] }`) and round-trips
//! through `parse_envelope`. TXT is a one-way, human-readable checklist outline.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::fields::format_category;
use crate::task::TaskGroup;
use crate::time::format_date;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a> {
    task_groups: &'a [TaskGroup],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    task_groups: Vec<TaskGroup>,
}

/// Serialize groups into the compact JSON envelope.
pub fn export_json(groups: &[TaskGroup]) -> Result<String> {
    Ok(serde_json::to_string(&EnvelopeRef { task_groups: groups })?)
}

/// Serialize groups into the JSON envelope, indented for files meant to be read.
pub fn export_json_pretty(groups: &[TaskGroup]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&EnvelopeRef { task_groups: groups })?)
}

/// Parse and validate a JSON envelope.
///
/// Malformed JSON, a missing or null `taskGroups` field, groups that do not deserialize,
/// repeated group or task ids, and tasks whose `parent` does not name their owning group
/// are all rejected.
pub fn parse_envelope(json: &str) -> Result<Vec<TaskGroup>> {
    let value: Value = serde_json::from_str(json)?;
    match value.get("taskGroups") {
        None | Some(Value::Null) => return Err(StoreError::MissingTaskGroups),
        Some(_) => {}
    }
    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| StoreError::InvalidShape(e.to_string()))?;

    let mut group_ids = HashSet::new();
    let mut task_ids = HashSet::new();
    for group in &envelope.task_groups {
        if !group_ids.insert(group.id.as_str()) {
            return Err(StoreError::InvalidShape(format!("duplicate group id '{}'", group.id)));
        }
        if let Some(task) = group.tasks.iter().find(|t| !task_ids.insert(t.id.as_str())) {
            return Err(StoreError::InvalidShape(format!("duplicate task id '{}'", task.id)));
        }
        if let Some(task) = group.tasks.iter().find(|t| t.parent != group.id) {
            return Err(StoreError::InvalidShape(format!(
                "task '{}' in group '{}' names parent '{}'",
                task.id, group.id, task.parent
            )));
        }
    }
    Ok(envelope.task_groups)
}

/// Render groups as a plain-text checklist outline.
pub fn render_txt(groups: &[TaskGroup]) -> String {
    let mut content = String::from("# TASK CHECKLIST\n\n");

    for group in groups {
        content.push_str(&format!("## {} ({})\n\n", group.name, format_category(group.kind)));

        for task in &group.tasks {
            let mark = if task.completed { 'x' } else { ' ' };
            content.push_str(&format!("- [{mark}] {}\n", task.title));
            if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
                content.push_str(&format!("  Description: {desc}\n"));
            }
            if let Some(link) = task.link.as_deref().filter(|l| !l.is_empty()) {
                content.push_str(&format!("  Link: {link}\n"));
            }
            if let Some(due) = task.due_date {
                content.push_str(&format!("  Due: {}\n", format_date(due)));
            }
            if !task.tag_list().is_empty() {
                content.push_str(&format!("  Tags: {}\n", task.tag_list().join(", ")));
            }
            content.push('\n');
        }

        content.push('\n');
    }

    content
}
