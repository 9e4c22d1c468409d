//! The task store: the single owner of all groups and tasks.
//!
//! Every mutation goes through a named method on `TaskStore`. Methods are total: an
//! unknown group or task id, or an empty name/title, makes the call a silent no-op. Only
//! `import_from_json` reports failure.
//!
//! Derived work (statistics, recurring task regeneration) is never done inside the
//! mutating call. Mutations queue a `Followup` instead and the owner drains the queue
//! with `run_pending`, so a mutation and its derived refresh are two observable steps.
//! Queued follow-ups are coalesced: requesting one that is already waiting is a no-op.
//!
//! Observers registered with `subscribe` are told about every change that actually
//! happened, after it happened.

use std::collections::VecDeque;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::export::{export_json, parse_envelope};
use crate::fields::{Category, Priority};
use crate::recurrence::next_due_date;
use crate::search::filter_tasks;
use crate::stats::compute_statistics;
use crate::task::{Recurring, Statistics, Task, TaskGroup, TaskOptions, TaskState};
use crate::time::{Clock, Millis, SystemClock};

/// Which task field an update touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Description,
    Link,
    Image,
    Tags,
    Priority,
    DueDate,
    Recurring,
}

/// A change that has been applied to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    GroupAdded { group_id: String },
    GroupRemoved { group_id: String },
    GroupRenamed { group_id: String },
    GroupsReordered,
    TaskAdded { group_id: String, task_id: String },
    TaskRemoved { group_id: String, task_id: String },
    TaskToggled { group_id: String, task_id: String, completed: bool },
    TaskUpdated { group_id: String, task_id: String, field: TaskField },
    TasksReordered { group_id: String },
    SearchChanged,
    Imported { groups: usize },
    RecurringSpawned { count: usize },
    StatisticsUpdated,
}

/// Derived work deferred until the next `run_pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    ProcessRecurring,
    UpdateStatistics,
}

type Listener = Box<dyn FnMut(&StoreEvent, &TaskState)>;

/// In-memory owner of the board state.
pub struct TaskStore<C: Clock = SystemClock> {
    state: TaskState,
    clock: C,
    pending: VecDeque<Followup>,
    listeners: Vec<Listener>,
}

impl TaskStore<SystemClock> {
    /// Empty store on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for TaskStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TaskStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self::from_state(TaskState::default(), clock)
    }

    /// Resume from a previously persisted state.
    pub fn from_state(state: TaskState, clock: C) -> Self {
        TaskStore {
            state,
            clock,
            pending: VecDeque::new(),
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn task_groups(&self) -> &[TaskGroup] {
        &self.state.task_groups
    }

    pub fn search_term(&self) -> &str {
        &self.state.search_term
    }

    pub fn statistics(&self) -> &Statistics {
        &self.state.statistics
    }

    pub fn group(&self, group_id: &str) -> Option<&TaskGroup> {
        self.state.task_groups.iter().find(|g| g.id == group_id)
    }

    pub fn task(&self, task_id: &str, group_id: &str) -> Option<&Task> {
        self.group(group_id)?.task(task_id)
    }

    /// Register an observer. Observers run in registration order.
    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent, &TaskState) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // --- groups ---------------------------------------------------------------

    /// Append a new group. Returns its id, or `None` if `name` is empty.
    pub fn add_task_group(&mut self, name: &str, kind: Category) -> Option<String> {
        if name.is_empty() {
            debug!("ignoring group with empty name");
            return None;
        }
        let now = self.clock.now();
        let id = new_id();
        self.state.task_groups.push(TaskGroup {
            id: id.clone(),
            name: name.to_string(),
            kind,
            tasks: Vec::new(),
            created_at: now,
            updated_at: now,
            order: self.state.task_groups.len() as i64,
        });
        self.emit(StoreEvent::GroupAdded { group_id: id.clone() });
        self.defer(Followup::UpdateStatistics);
        Some(id)
    }

    /// Remove a group and every task in it.
    pub fn remove_task_group(&mut self, group_id: &str) {
        let Some(idx) = self.group_index(group_id) else {
            debug!(group_id, "remove: no such group");
            return;
        };
        let group = self.state.task_groups.remove(idx);
        for task in &group.tasks {
            self.state.regenerated.remove(&task.id);
        }
        self.emit(StoreEvent::GroupRemoved { group_id: group.id });
        self.defer(Followup::UpdateStatistics);
    }

    pub fn update_task_group_name(&mut self, group_id: &str, name: &str) {
        let now = self.clock.now();
        let Some(group) = self.group_mut(group_id) else {
            debug!(group_id, "rename: no such group");
            return;
        };
        group.name = name.to_string();
        group.updated_at = now;
        self.emit(StoreEvent::GroupRenamed { group_id: group_id.to_string() });
    }

    /// Replace the group sequence with `groups`, re-stamping `order` by position.
    pub fn reorder_task_groups(&mut self, groups: Vec<TaskGroup>) {
        self.state.task_groups = groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| TaskGroup { order: index as i64, ..group })
            .collect();
        self.emit(StoreEvent::GroupsReordered);
    }

    /// Move one group to `to` (clamped), shifting the others.
    pub fn move_task_group(&mut self, group_id: &str, to: usize) {
        let Some(from) = self.group_index(group_id) else {
            debug!(group_id, "move: no such group");
            return;
        };
        let mut groups = self.state.task_groups.clone();
        let group = groups.remove(from);
        groups.insert(to.min(groups.len()), group);
        self.reorder_task_groups(groups);
    }

    // --- tasks ----------------------------------------------------------------

    /// Append a task to a group. Returns its id, or `None` if the group is unknown or
    /// the title is empty.
    pub fn add_task(
        &mut self,
        title: &str,
        category: Category,
        group_id: &str,
        options: TaskOptions,
    ) -> Option<String> {
        if title.is_empty() {
            debug!("ignoring task with empty title");
            return None;
        }
        let now = self.clock.now();
        let Some(group) = self.group_mut(group_id) else {
            debug!(group_id, "add task: no such group");
            return None;
        };
        let mut task = Task {
            id: new_id(),
            title: title.to_string(),
            completed: false,
            category,
            parent: group_id.to_string(),
            created_at: now,
            updated_at: now,
            order: group.tasks.len() as i64,
            description: None,
            link: None,
            image_url: None,
            tags: None,
            priority: None,
            due_date: None,
            recurring: None,
        };
        options.apply(&mut task);
        let task_id = task.id.clone();
        group.tasks.push(task);
        group.updated_at = now;

        self.emit(StoreEvent::TaskAdded {
            group_id: group_id.to_string(),
            task_id: task_id.clone(),
        });
        self.defer(Followup::UpdateStatistics);
        Some(task_id)
    }

    /// Remove a task. Remaining tasks keep their `order` values, gaps included.
    pub fn remove_task(&mut self, task_id: &str, group_id: &str) {
        let now = self.clock.now();
        let Some(group) = self.group_mut(group_id) else {
            debug!(group_id, "remove task: no such group");
            return;
        };
        let before = group.tasks.len();
        group.tasks.retain(|t| t.id != task_id);
        if group.tasks.len() == before {
            debug!(task_id, group_id, "remove task: no such task");
            return;
        }
        group.updated_at = now;
        self.state.regenerated.remove(task_id);
        self.emit(StoreEvent::TaskRemoved {
            group_id: group_id.to_string(),
            task_id: task_id.to_string(),
        });
        self.defer(Followup::UpdateStatistics);
    }

    /// Flip a task's completion. Completing a recurring task queues regeneration.
    pub fn toggle_task_completion(&mut self, task_id: &str, group_id: &str) {
        let now = self.clock.now();
        let Some(group) = self.group_mut(group_id) else {
            debug!(group_id, "toggle: no such group");
            return;
        };
        let Some(task) = group.task_mut(task_id) else {
            debug!(task_id, group_id, "toggle: no such task");
            return;
        };
        task.completed = !task.completed;
        task.updated_at = now;
        let completed = task.completed;
        let recurring = task.is_recurring();
        group.updated_at = now;

        if !completed {
            self.state.regenerated.remove(task_id);
        }
        self.emit(StoreEvent::TaskToggled {
            group_id: group_id.to_string(),
            task_id: task_id.to_string(),
            completed,
        });
        if completed && recurring {
            self.defer(Followup::ProcessRecurring);
        }
        self.defer(Followup::UpdateStatistics);
    }

    pub fn update_task_title(&mut self, task_id: &str, group_id: &str, title: &str) {
        self.modify_task(task_id, group_id, TaskField::Title, |t| t.title = title.to_string());
    }

    pub fn update_task_description(&mut self, task_id: &str, group_id: &str, description: Option<String>) {
        self.modify_task(task_id, group_id, TaskField::Description, |t| t.description = description);
    }

    pub fn update_task_link(&mut self, task_id: &str, group_id: &str, link: Option<String>) {
        self.modify_task(task_id, group_id, TaskField::Link, |t| t.link = link);
    }

    pub fn update_task_image(&mut self, task_id: &str, group_id: &str, image_url: Option<String>) {
        self.modify_task(task_id, group_id, TaskField::Image, |t| t.image_url = image_url);
    }

    pub fn update_task_tags(&mut self, task_id: &str, group_id: &str, tags: Vec<String>) {
        self.modify_task(task_id, group_id, TaskField::Tags, |t| t.tags = Some(tags));
    }

    pub fn update_task_priority(&mut self, task_id: &str, group_id: &str, priority: Option<Priority>) {
        self.modify_task(task_id, group_id, TaskField::Priority, |t| t.priority = priority);
    }

    pub fn update_task_due_date(&mut self, task_id: &str, group_id: &str, due_date: Option<Millis>) {
        if self.modify_task(task_id, group_id, TaskField::DueDate, |t| t.due_date = due_date) {
            self.defer(Followup::UpdateStatistics);
        }
    }

    pub fn update_task_recurring(&mut self, task_id: &str, group_id: &str, recurring: Option<Recurring>) {
        self.modify_task(task_id, group_id, TaskField::Recurring, |t| t.recurring = recurring);
    }

    /// Replace a group's task sequence with `tasks`, re-stamping `order` by position.
    pub fn reorder_tasks(&mut self, group_id: &str, tasks: Vec<Task>) {
        let now = self.clock.now();
        let Some(group) = self.group_mut(group_id) else {
            debug!(group_id, "reorder: no such group");
            return;
        };
        group.tasks = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| Task {
                order: index as i64,
                parent: group_id.to_string(),
                ..task
            })
            .collect();
        group.updated_at = now;
        self.emit(StoreEvent::TasksReordered { group_id: group_id.to_string() });
    }

    /// Move one task to position `to` (clamped) within its group.
    pub fn move_task(&mut self, task_id: &str, group_id: &str, to: usize) {
        let Some(group) = self.group(group_id) else {
            debug!(group_id, "move task: no such group");
            return;
        };
        let mut tasks = group.tasks.clone();
        let Some(from) = tasks.iter().position(|t| t.id == task_id) else {
            debug!(task_id, group_id, "move task: no such task");
            return;
        };
        let task = tasks.remove(from);
        tasks.insert(to.min(tasks.len()), task);
        self.reorder_tasks(group_id, tasks);
    }

    // --- search ---------------------------------------------------------------

    pub fn set_search_term(&mut self, term: &str) {
        self.state.search_term = term.to_string();
        self.emit(StoreEvent::SearchChanged);
    }

    /// Tasks matching the active search term, flattened across groups.
    pub fn get_filtered_tasks(&self) -> Vec<&Task> {
        filter_tasks(&self.state.task_groups, &self.state.search_term)
    }

    // --- import / export ------------------------------------------------------

    /// The full group collection as a `{ "taskGroups": [...] }` document.
    pub fn export_to_json(&self) -> Result<String> {
        export_json(&self.state.task_groups)
    }

    /// Replace every group with those in `json`. On error nothing changes.
    pub fn import_from_json(&mut self, json: &str) -> Result<()> {
        let groups = match parse_envelope(json) {
            Ok(groups) => groups,
            Err(e) => {
                warn!("import rejected: {e}");
                return Err(e);
            }
        };
        let count = groups.len();
        // Imported completions already produced their successors wherever they came from.
        self.state.regenerated = groups
            .iter()
            .flat_map(|g| g.tasks.iter())
            .filter(|t| t.completed && t.is_recurring())
            .map(|t| t.id.clone())
            .collect();
        self.state.task_groups = groups;
        info!(groups = count, "imported task groups");
        self.emit(StoreEvent::Imported { groups: count });
        self.defer(Followup::UpdateStatistics);
        Ok(())
    }

    // --- derived state --------------------------------------------------------

    /// Spawn the next occurrence of every completed recurring task that has not been
    /// regenerated yet. Returns the number of tasks created.
    ///
    /// The successor is a copy of the source with a fresh id and timestamps, not
    /// completed, appended to the same group, due `frequency` intervals after the
    /// source's due date (or undated if the source was undated). The source task itself
    /// is left as it is.
    pub fn process_recurring_tasks(&mut self) -> usize {
        let now = self.clock.now();
        let mut spawned = 0usize;

        for group in self.state.task_groups.iter_mut() {
            let successors: Vec<Task> = group
                .tasks
                .iter()
                .filter(|t| t.completed && t.is_recurring())
                .filter(|t| !self.state.regenerated.contains(&t.id))
                .enumerate()
                .map(|(offset, source)| {
                    let due_date = match (source.due_date, source.recurring.as_ref()) {
                        (Some(due), Some(rule)) => next_due_date(due, rule),
                        _ => None,
                    };
                    Task {
                        id: new_id(),
                        completed: false,
                        created_at: now,
                        updated_at: now,
                        order: (group.tasks.len() + offset) as i64,
                        due_date,
                        ..source.clone()
                    }
                })
                .collect();

            if successors.is_empty() {
                continue;
            }
            for source in group.tasks.iter().filter(|t| t.completed && t.is_recurring()) {
                self.state.regenerated.insert(source.id.clone());
            }
            spawned += successors.len();
            group.tasks.extend(successors);
            group.updated_at = now;
        }

        if spawned == 0 {
            return 0;
        }
        info!(count = spawned, "spawned recurring tasks");
        self.emit(StoreEvent::RecurringSpawned { count: spawned });
        self.defer(Followup::UpdateStatistics);
        spawned
    }

    /// Recompute the statistics block from the current groups.
    pub fn update_statistics(&mut self) {
        self.state.statistics = compute_statistics(&self.state.task_groups, self.clock.now());
        self.emit(StoreEvent::StatisticsUpdated);
    }

    // --- follow-up queue ------------------------------------------------------

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Run queued follow-ups in FIFO order, including any queued while draining.
    /// Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Some(followup) = self.pending.pop_front() {
            debug!(?followup, "running follow-up");
            match followup {
                Followup::ProcessRecurring => {
                    self.process_recurring_tasks();
                }
                Followup::UpdateStatistics => self.update_statistics(),
            }
            ran += 1;
        }
        ran
    }

    /// One cycle of the periodic timer. Returns the number of recurring tasks spawned.
    pub fn tick(&mut self) -> usize {
        let spawned = self.process_recurring_tasks();
        self.update_statistics();
        // The statistics above already reflect any spawned tasks.
        self.pending.retain(|f| *f != Followup::UpdateStatistics);
        spawned
    }

    fn defer(&mut self, followup: Followup) {
        if !self.pending.contains(&followup) {
            self.pending.push_back(followup);
        }
    }

    // --- helpers --------------------------------------------------------------

    fn emit(&mut self, event: StoreEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event, &self.state);
        }
    }

    fn group_index(&self, group_id: &str) -> Option<usize> {
        self.state.task_groups.iter().position(|g| g.id == group_id)
    }

    fn group_mut(&mut self, group_id: &str) -> Option<&mut TaskGroup> {
        self.state.task_groups.iter_mut().find(|g| g.id == group_id)
    }

    fn modify_task(
        &mut self,
        task_id: &str,
        group_id: &str,
        field: TaskField,
        apply: impl FnOnce(&mut Task),
    ) -> bool {
        let now = self.clock.now();
        let Some(group) = self.group_mut(group_id) else {
            debug!(group_id, ?field, "update: no such group");
            return false;
        };
        let Some(task) = group.task_mut(task_id) else {
            debug!(task_id, group_id, ?field, "update: no such task");
            return false;
        };
        apply(task);
        task.updated_at = now;
        group.updated_at = now;
        self.emit(StoreEvent::TaskUpdated {
            group_id: group_id.to_string(),
            task_id: task_id.to_string(),
            field,
        });
        true
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    use chrono::Duration;

    use super::*;
    use crate::fields::Interval;
    use crate::time::testing::{local_ms, FixedClock};

    fn store_at(ms: Millis) -> (TaskStore<FixedClock>, FixedClock) {
        let clock = FixedClock::at(ms);
        (TaskStore::with_clock(clock.clone()), clock)
    }

    fn noon() -> Millis {
        local_ms(2024, 3, 14, 12, 0)
    }

    fn add(store: &mut TaskStore<FixedClock>, group: &str, title: &str) -> String {
        store
            .add_task(title, Category::Subject, group, TaskOptions::default())
            .unwrap()
    }

    fn orders(store: &TaskStore<FixedClock>, group: &str) -> Vec<i64> {
        store.group(group).unwrap().tasks.iter().map(|t| t.order).collect()
    }

    #[test]
    fn test_add_group_assigns_order_and_timestamps() {
        let (mut store, _) = store_at(noon());
        let a = store.add_task_group("Maths", Category::Subject).unwrap();
        let b = store.add_task_group("Website", Category::Project).unwrap();
        assert_ne!(a, b);
        let groups = store.task_groups();
        assert_eq!(groups[0].order, 0);
        assert_eq!(groups[1].order, 1);
        assert_eq!(groups[1].kind, Category::Project);
        assert_eq!(groups[0].created_at, noon());
        assert_eq!(groups[0].updated_at, noon());
    }

    #[test]
    fn test_empty_names_and_titles_are_ignored() {
        let (mut store, _) = store_at(noon());
        assert!(store.add_task_group("", Category::Subject).is_none());
        assert!(store.task_groups().is_empty());
        let g = store.add_task_group("Maths", Category::Subject).unwrap();
        assert!(store.add_task("", Category::Subject, &g, TaskOptions::default()).is_none());
        assert!(store.group(&g).unwrap().tasks.is_empty());
    }

    #[test]
    fn test_unknown_ids_are_silent_no_ops() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("Maths", Category::Subject).unwrap();
        let t = add(&mut store, &g, "Algebra");
        store.run_pending();
        let before = store.state().clone();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |e, _| sink.borrow_mut().push(e.clone()));

        store.remove_task_group("nope");
        store.update_task_group_name("nope", "x");
        store.move_task_group("nope", 0);
        assert!(store.add_task("x", Category::Subject, "nope", TaskOptions::default()).is_none());
        store.remove_task("nope", &g);
        store.remove_task(&t, "nope");
        store.toggle_task_completion("nope", &g);
        store.update_task_title("nope", &g, "x");
        store.update_task_due_date(&t, "nope", Some(1));
        store.reorder_tasks("nope", Vec::new());
        store.move_task("nope", &g, 0);

        assert_eq!(store.state(), &before);
        assert!(events.borrow().is_empty());
        assert!(!store.has_pending());
    }

    #[test]
    fn test_add_task_merges_options() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("English", Category::Subject).unwrap();
        let opts = TaskOptions {
            description: Some("Chapters 1-3".into()),
            link: Some("https://example.org".into()),
            image_url: None,
            tags: Some(vec!["reading".into(), "reading".into()]),
            priority: Some(Priority::High),
            due_date: Some(local_ms(2024, 3, 20, 0, 0)),
            recurring: Some(Recurring::every(2, Interval::Daily)),
        };
        let t = store.add_task("Read", Category::Subject, &g, opts).unwrap();
        let task = store.task(&t, &g).unwrap();
        assert_eq!(task.parent, g);
        assert!(!task.completed);
        assert_eq!(task.order, 0);
        assert_eq!(task.description.as_deref(), Some("Chapters 1-3"));
        assert_eq!(task.tag_list(), ["reading", "reading"]);
        assert_eq!(task.priority, Some(Priority::High));
        assert!(task.image_url.is_none());
        assert!(task.is_recurring());
    }

    #[test]
    fn test_remove_group_cascades() {
        let (mut store, _) = store_at(noon());
        let a = store.add_task_group("A", Category::Subject).unwrap();
        let b = store.add_task_group("B", Category::Subject).unwrap();
        add(&mut store, &a, "one");
        add(&mut store, &b, "two");
        store.remove_task_group(&a);
        store.run_pending();
        assert_eq!(store.task_groups().len(), 1);
        assert_eq!(store.statistics().total_tasks, 1);
    }

    #[test]
    fn test_remove_task_leaves_order_gaps() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let ids: Vec<_> = ["a", "b", "c", "d"].iter().map(|t| add(&mut store, &g, t)).collect();
        store.remove_task(&ids[1], &g);
        assert_eq!(orders(&store, &g), vec![0, 2, 3]);
    }

    #[test]
    fn test_reorder_tasks_restamps_contiguous_order() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let ids: Vec<_> = (0..6).map(|i| add(&mut store, &g, &format!("t{i}"))).collect();
        store.remove_task(&ids[0], &g);
        store.remove_task(&ids[3], &g);
        add(&mut store, &g, "late");

        let mut tasks = store.group(&g).unwrap().tasks.clone();
        tasks.reverse();
        store.reorder_tasks(&g, tasks);

        let set: BTreeSet<i64> = orders(&store, &g).into_iter().collect();
        assert_eq!(set, (0..5).collect::<BTreeSet<i64>>());
        assert_eq!(store.group(&g).unwrap().tasks[0].title, "late");
    }

    #[test]
    fn test_move_task_and_group() {
        let (mut store, _) = store_at(noon());
        let a = store.add_task_group("A", Category::Subject).unwrap();
        let b = store.add_task_group("B", Category::Subject).unwrap();
        let c = store.add_task_group("C", Category::Project).unwrap();
        store.move_task_group(&c, 0);
        let names: Vec<_> = store.task_groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["C", "A", "B"]);
        let ord: Vec<_> = store.task_groups().iter().map(|g| g.order).collect();
        assert_eq!(ord, [0, 1, 2]);

        let x = add(&mut store, &b, "x");
        add(&mut store, &b, "y");
        store.move_task(&x, &b, 99);
        let titles: Vec<_> = store.group(&b).unwrap().tasks.iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, ["y", "x"]);
        assert_eq!(orders(&store, &b), vec![0, 1]);
        assert!(store.group(&a).unwrap().tasks.is_empty());
    }

    #[test]
    fn test_field_updates_stamp_updated_at() {
        let (mut store, clock) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let t = add(&mut store, &g, "draft");
        clock.advance(Duration::minutes(5));
        let later = noon() + Duration::minutes(5).num_milliseconds();

        store.update_task_title(&t, &g, "final");
        store.update_task_description(&t, &g, Some("notes".into()));
        store.update_task_link(&t, &g, Some("https://x".into()));
        store.update_task_image(&t, &g, Some("https://x/img.png".into()));
        store.update_task_tags(&t, &g, vec!["a".into(), "b".into()]);
        store.update_task_priority(&t, &g, Some(Priority::Urgent));
        store.update_task_due_date(&t, &g, Some(later));
        store.update_task_recurring(&t, &g, Some(Recurring::every(1, Interval::Monthly)));

        let task = store.task(&t, &g).unwrap();
        assert_eq!(task.title, "final");
        assert_eq!(task.link.as_deref(), Some("https://x"));
        assert_eq!(task.image_url.as_deref(), Some("https://x/img.png"));
        assert_eq!(task.tag_list(), ["a", "b"]);
        assert_eq!(task.priority, Some(Priority::Urgent));
        assert_eq!(task.due_date, Some(later));
        assert_eq!(task.created_at, noon());
        assert_eq!(task.updated_at, later);
        assert_eq!(store.group(&g).unwrap().updated_at, later);
    }

    #[test]
    fn test_rename_group() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("Mths", Category::Subject).unwrap();
        store.update_task_group_name(&g, "Maths");
        assert_eq!(store.group(&g).unwrap().name, "Maths");
    }

    #[test]
    fn test_statistics_are_deferred_until_run_pending() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        add(&mut store, &g, "one");
        add(&mut store, &g, "two");
        assert_eq!(store.statistics().total_tasks, 0);
        assert!(store.has_pending());
        // Coalesced into a single refresh.
        assert_eq!(store.run_pending(), 1);
        assert_eq!(store.statistics().total_tasks, 2);
        assert!(!store.has_pending());
    }

    #[test]
    fn test_forty_percent_complete() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let ids: Vec<_> = (0..10).map(|i| add(&mut store, &g, &format!("t{i}"))).collect();
        for id in &ids[..4] {
            store.toggle_task_completion(id, &g);
        }
        store.run_pending();
        assert_eq!(store.statistics().completion_percentage, 40.0);
        assert_eq!(store.statistics().pending_tasks, 6);
    }

    #[test]
    fn test_overdue_cleared_by_completion() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let opts = TaskOptions {
            due_date: Some(local_ms(2024, 3, 13, 12, 0)),
            ..TaskOptions::default()
        };
        let t = store.add_task("late", Category::Subject, &g, opts).unwrap();
        store.run_pending();
        assert_eq!(store.statistics().overdue_tasks_count, 1);
        store.toggle_task_completion(&t, &g);
        store.run_pending();
        assert_eq!(store.statistics().overdue_tasks_count, 0);
    }

    #[test]
    fn test_weekly_recurrence_spawns_one_successor() {
        let (mut store, clock) = store_at(noon());
        let g = store.add_task_group("Chores", Category::Project).unwrap();
        let due = local_ms(2024, 3, 14, 9, 0);
        let opts = TaskOptions {
            tags: Some(vec!["home".into()]),
            due_date: Some(due),
            recurring: Some(Recurring::every(1, Interval::Weekly)),
            ..TaskOptions::default()
        };
        let t = store.add_task("Laundry", Category::Project, &g, opts).unwrap();
        add(&mut store, &g, "Dishes");
        store.run_pending();

        clock.advance(Duration::hours(1));
        store.toggle_task_completion(&t, &g);
        let original = store.task(&t, &g).unwrap().clone();
        assert_eq!(store.group(&g).unwrap().tasks.len(), 2);

        store.run_pending();
        let tasks = &store.group(&g).unwrap().tasks;
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0], original);
        let next = &tasks[2];
        assert_ne!(next.id, t);
        assert!(!next.completed);
        assert_eq!(next.title, "Laundry");
        assert_eq!(next.parent, g);
        assert_eq!(next.order, 2);
        assert_eq!(next.tag_list(), ["home"]);
        assert_eq!(next.due_date, Some(local_ms(2024, 3, 21, 9, 0)));
        assert_eq!(next.created_at, clock.now());
        assert_eq!(store.statistics().total_tasks, 3);

        // The timer firing again does not spawn a second successor.
        assert_eq!(store.process_recurring_tasks(), 0);
        assert_eq!(store.group(&g).unwrap().tasks.len(), 3);
    }

    #[test]
    fn test_undated_recurring_successor_is_undated() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let opts = TaskOptions {
            recurring: Some(Recurring::every(1, Interval::Daily)),
            ..TaskOptions::default()
        };
        let t = store.add_task("Stretch", Category::Subject, &g, opts).unwrap();
        store.toggle_task_completion(&t, &g);
        store.run_pending();
        let tasks = &store.group(&g).unwrap().tasks;
        assert_eq!(tasks.len(), 2);
        assert!(tasks[1].due_date.is_none());
    }

    #[test]
    fn test_reopening_and_completing_again_spawns_again() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let opts = TaskOptions {
            recurring: Some(Recurring::every(1, Interval::Daily)),
            ..TaskOptions::default()
        };
        let t = store.add_task("Stretch", Category::Subject, &g, opts).unwrap();
        store.toggle_task_completion(&t, &g);
        store.run_pending();
        store.toggle_task_completion(&t, &g);
        store.toggle_task_completion(&t, &g);
        store.run_pending();
        assert_eq!(store.group(&g).unwrap().tasks.len(), 3);
    }

    #[test]
    fn test_no_recurring_work_emits_nothing() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let t = add(&mut store, &g, "plain");
        store.toggle_task_completion(&t, &g);
        store.run_pending();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |e, _| sink.borrow_mut().push(e.clone()));
        assert_eq!(store.process_recurring_tasks(), 0);
        assert!(events.borrow().is_empty());
        assert!(!store.has_pending());
    }

    #[test]
    fn test_toggle_queues_recurrence_before_statistics() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let opts = TaskOptions {
            recurring: Some(Recurring::every(1, Interval::Daily)),
            ..TaskOptions::default()
        };
        let t = store.add_task("Stretch", Category::Subject, &g, opts).unwrap();
        store.run_pending();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |e, state| sink.borrow_mut().push((e.clone(), state.statistics.total_tasks)));
        store.toggle_task_completion(&t, &g);
        store.run_pending();

        let seen: Vec<_> = events.borrow().iter().map(|(e, _)| e.clone()).collect();
        assert!(matches!(seen[0], StoreEvent::TaskToggled { completed: true, .. }));
        assert_eq!(seen[1], StoreEvent::RecurringSpawned { count: 1 });
        assert_eq!(seen[2], StoreEvent::StatisticsUpdated);
        assert_eq!(seen.len(), 3);
        assert_eq!(events.borrow()[2].1, 2);
    }

    #[test]
    fn test_search_flattens_across_groups() {
        let (mut store, _) = store_at(noon());
        let a = store.add_task_group("A", Category::Subject).unwrap();
        let b = store.add_task_group("B", Category::Project).unwrap();
        let tagged = |tag: &str| TaskOptions { tags: Some(vec![tag.into()]), ..TaskOptions::default() };
        store.add_task("Essay", Category::Subject, &a, tagged("Homework")).unwrap();
        store.add_task("Deploy", Category::Project, &b, tagged("homework-ish")).unwrap();
        store.add_task("Groceries", Category::Project, &b, tagged("errands")).unwrap();

        assert!(store.get_filtered_tasks().is_empty());
        store.set_search_term("HOMEW");
        let titles: Vec<_> = store.get_filtered_tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Essay", "Deploy"]);
        assert_eq!(store.search_term(), "HOMEW");

        store.set_search_term("");
        assert!(store.get_filtered_tasks().is_empty());
    }

    #[test]
    fn test_export_import_round_trip() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let opts = TaskOptions {
            description: Some("d".into()),
            tags: Some(vec!["x".into()]),
            priority: Some(Priority::Low),
            due_date: Some(local_ms(2024, 4, 1, 0, 0)),
            recurring: Some(Recurring::every(2, Interval::Monthly)),
            ..TaskOptions::default()
        };
        store.add_task("Full", Category::Subject, &g, opts).unwrap();
        add(&mut store, &g, "Bare");
        store.add_task_group("B", Category::Project).unwrap();
        let json = store.export_to_json().unwrap();

        let (mut fresh, _) = store_at(noon());
        fresh.import_from_json(&json).unwrap();
        assert_eq!(fresh.task_groups(), store.task_groups());
        assert!(fresh.has_pending());
        fresh.run_pending();
        assert_eq!(fresh.statistics().total_tasks, 2);
    }

    #[test]
    fn test_failed_import_leaves_state_untouched() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        add(&mut store, &g, "keep me");
        store.run_pending();
        let before = store.state().clone();

        assert!(store.import_from_json("{ definitely not json").is_err());
        assert!(store.import_from_json("{\"somethingElse\": []}").is_err());
        assert_eq!(store.state(), &before);
        assert!(!store.has_pending());
    }

    #[test]
    fn test_tick_runs_recurrence_and_statistics() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("A", Category::Subject).unwrap();
        let opts = TaskOptions {
            recurring: Some(Recurring::every(1, Interval::Daily)),
            ..TaskOptions::default()
        };
        let t = store.add_task("Stretch", Category::Subject, &g, opts).unwrap();
        store.toggle_task_completion(&t, &g);
        store.tick();
        assert_eq!(store.statistics().total_tasks, 2);
        assert_eq!(store.statistics().completed_tasks, 1);
    }

    #[test]
    fn test_imported_completions_do_not_spawn_again() {
        let (mut store, _) = store_at(noon());
        let g = store.add_task_group("Chores", Category::Project).unwrap();
        let opts = TaskOptions {
            due_date: Some(local_ms(2024, 3, 14, 9, 0)),
            recurring: Some(Recurring::every(1, Interval::Weekly)),
            ..TaskOptions::default()
        };
        let t = store.add_task("Laundry", Category::Project, &g, opts).unwrap();
        store.toggle_task_completion(&t, &g);
        store.run_pending();
        assert_eq!(store.group(&g).unwrap().tasks.len(), 2);
        let json = store.export_to_json().unwrap();

        let (mut fresh, _) = store_at(noon());
        fresh.import_from_json(&json).unwrap();
        fresh.run_pending();
        fresh.tick();
        assert_eq!(fresh.group(&g).unwrap().tasks.len(), 2);
        assert_eq!(fresh.statistics().total_tasks, 2);

        // Reopening and completing again still spawns the next occurrence.
        fresh.toggle_task_completion(&t, &g);
        fresh.toggle_task_completion(&t, &g);
        fresh.run_pending();
        assert_eq!(fresh.group(&g).unwrap().tasks.len(), 3);
    }
}
