//! Free-text search over tasks.

use crate::task::{Task, TaskGroup};

/// Case-insensitive substring matcher for task title, description and tags.
pub struct TextMatcher {
    needle: String,
}

impl TextMatcher {
    /// Build a matcher for `term`. Returns `None` for an empty term.
    pub fn new(term: &str) -> Option<Self> {
        if term.is_empty() {
            return None;
        }
        Some(Self { needle: term.to_lowercase() })
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.matches_field(&task.title)
            || task.description.as_deref().is_some_and(|d| self.matches_field(d))
            || task.tag_list().iter().any(|tag| self.matches_field(tag))
    }

    fn matches_field(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.needle)
    }
}

/// Every task across all groups matching `term`, flattened in board order.
pub fn filter_tasks<'a>(groups: &'a [TaskGroup], term: &str) -> Vec<&'a Task> {
    let Some(matcher) = TextMatcher::new(term) else {
        return Vec::new();
    };
    groups
        .iter()
        .flat_map(|g| g.tasks.iter())
        .filter(|t| matcher.matches(t))
        .collect()
}
