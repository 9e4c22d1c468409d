//! Command implementations for the CLI interface.
//!
//! Each handler opens a `Session`, calls store operations, and commits. Groups and tasks
//! can be referenced by full id, id prefix, or case-insensitive exact name/title.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::Local;
use clap::Subcommand;
use clap_complete::{generate, Shell};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{CliError, StoreError};
use crate::export::{export_json_pretty, render_txt};
use crate::fields::*;
use crate::session::Session;
use crate::store::TaskStore;
use crate::task::{Recurring, Task, TaskGroup, TaskOptions};
use crate::time::{format_due_relative, local_midnight, parse_due_input, Clock, Millis};

type CmdResult = Result<(), CliError>;

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Board(BoardCommand),

    /// Create a timestamped backup of the state file.
    Backup,

    /// Keep running, regenerating recurring tasks and refreshing statistics periodically.
    Watch {
        #[arg(long, default_value_t = 3600)]
        interval_secs: u64,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Commands that load the board, change or report on it, and save it back.
#[derive(Subcommand)]
pub enum BoardCommand {
    /// Manage subject and project groups.
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },

    /// Add a task to a group.
    Add {
        /// Short title for the task.
        title: String,
        /// Group id or name.
        #[arg(long, short)]
        group: String,
        /// Category; defaults to the group's type.
        #[arg(long, value_enum)]
        category: Option<Category>,
        /// Longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Related link (URL).
        #[arg(long)]
        link: Option<String>,
        /// Image URL.
        #[arg(long)]
        image: Option<String>,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Priority: low | medium | high | urgent.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "friday" or "in Nd".
        #[arg(long)]
        due: Option<String>,
        /// Repeat the task after completion: daily | weekly | monthly.
        #[arg(long, value_enum)]
        every: Option<Interval>,
        /// Repeat every N intervals.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        frequency: u32,
    },

    /// Remove a task.
    Rm {
        /// Task id or title.
        task: String,
        /// Group id or name, to disambiguate.
        #[arg(long, short)]
        group: Option<String>,
    },

    /// Toggle a task between done and not done.
    Done {
        /// Task id or title.
        task: String,
        #[arg(long, short)]
        group: Option<String>,
    },

    /// Update fields on a task.
    Edit {
        /// Task id or title.
        task: String,
        #[arg(long, short)]
        group: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        image: Option<String>,
        /// Replace tags. May be repeated and comma-separated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Remove every tag.
        #[arg(long)]
        clear_tags: bool,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        due: Option<String>,
        /// Clear the due date.
        #[arg(long)]
        clear_due: bool,
        #[arg(long, value_enum)]
        every: Option<Interval>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        frequency: Option<u32>,
        /// Stop repeating.
        #[arg(long)]
        no_repeat: bool,
    },

    /// Move a task to a new position within its group (0-based).
    Move {
        task: String,
        position: usize,
        #[arg(long, short)]
        group: Option<String>,
    },

    /// Show the board.
    List {
        /// Only show this group.
        #[arg(long, short)]
        group: Option<String>,
    },

    /// Search titles, descriptions and tags.
    Search {
        term: String,
    },

    /// List distinct tags and counts.
    Tags,

    /// Show completion and due-date statistics.
    Stats,

    /// Export the board to a file.
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file path, or "-" for stdout.
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Replace the board with a previously exported JSON file.
    Import {
        input: String,
        /// Skip creating a backup before import.
        #[arg(long)]
        no_backup: bool,
    },

    /// Regenerate recurring tasks and refresh statistics once.
    Tick,

}

#[derive(Subcommand)]
pub enum GroupAction {
    /// Create a group.
    Add {
        name: String,
        #[arg(long = "type", value_enum, default_value_t = Category::Subject)]
        kind: Category,
    },
    /// Delete a group and all of its tasks.
    Rm { group: String },
    /// Rename a group.
    Rename { group: String, name: String },
    /// Move a group to a new position (0-based).
    Move { group: String, position: usize },
    /// List groups.
    List,
}

/// Dispatch a parsed command against the state file at `db_path`.
pub fn run(command: Commands, db_path: &Path) -> CmdResult {
    let db = Database::new(db_path);
    match command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
        Commands::Watch { interval_secs } => cmd_watch(&db, interval_secs),
        Commands::Backup => cmd_backup(&db),
        Commands::Board(command) => {
            let mut session = Session::open(db)?;
            dispatch(&mut session, command)?;
            session.commit()?;
            Ok(())
        }
    }
}

fn dispatch(session: &mut Session, command: BoardCommand) -> CmdResult {
    let db = session.db().clone();
    let store = &mut session.store;
    match command {
        BoardCommand::Group { action } => cmd_group(store, action),
        BoardCommand::Add {
            title, group, category, desc, link, image, tags, priority, due, every, frequency,
        } => {
            let options = TaskOptions {
                description: desc,
                link,
                image_url: image,
                tags: if tags.is_empty() { None } else { Some(split_tags(&tags)) },
                priority,
                due_date: due.as_deref().map(parse_due).transpose()?,
                recurring: every.map(|interval| Recurring::every(frequency, interval)),
            };
            cmd_add(store, &title, &group, category, options)
        }
        BoardCommand::Rm { task, group } => {
            let (group_id, task_id, title) = resolve_task(store, &task, group.as_deref())?;
            store.remove_task(&task_id, &group_id);
            println!("Removed task '{title}'");
            Ok(())
        }
        BoardCommand::Done { task, group } => cmd_done(store, &task, group.as_deref()),
        BoardCommand::Edit {
            task, group, title, desc, link, image, tags, clear_tags, priority, due, clear_due,
            every, frequency, no_repeat,
        } => {
            let (group_id, task_id, _) = resolve_task(store, &task, group.as_deref())?;
            if let Some(title) = title {
                if title.trim().is_empty() {
                    return Err(CliError::Empty("Title"));
                }
                store.update_task_title(&task_id, &group_id, &title);
            }
            if let Some(desc) = desc {
                store.update_task_description(&task_id, &group_id, non_empty(desc));
            }
            if let Some(link) = link {
                store.update_task_link(&task_id, &group_id, non_empty(link));
            }
            if let Some(image) = image {
                store.update_task_image(&task_id, &group_id, non_empty(image));
            }
            if clear_tags {
                store.update_task_tags(&task_id, &group_id, Vec::new());
            } else if !tags.is_empty() {
                store.update_task_tags(&task_id, &group_id, split_tags(&tags));
            }
            if priority.is_some() {
                store.update_task_priority(&task_id, &group_id, priority);
            }
            if clear_due {
                store.update_task_due_date(&task_id, &group_id, None);
            } else if let Some(due) = due {
                store.update_task_due_date(&task_id, &group_id, Some(parse_due(&due)?));
            }
            if no_repeat {
                let current = store.task(&task_id, &group_id).and_then(|t| t.recurring);
                let disabled = current.map(|r| Recurring { enabled: false, ..r });
                store.update_task_recurring(&task_id, &group_id, disabled);
            } else if every.is_some() || frequency.is_some() {
                let current = store.task(&task_id, &group_id).and_then(|t| t.recurring);
                let recurring = Recurring {
                    enabled: true,
                    interval: every.or(current.map(|r| r.interval)).unwrap_or(Interval::Daily),
                    frequency: frequency.or(current.map(|r| r.frequency)).unwrap_or(1),
                };
                store.update_task_recurring(&task_id, &group_id, Some(recurring));
            }
            println!("Updated task {}", short_id(&task_id));
            Ok(())
        }
        BoardCommand::Move { task, position, group } => {
            let (group_id, task_id, title) = resolve_task(store, &task, group.as_deref())?;
            store.move_task(&task_id, &group_id, position);
            println!("Moved '{title}' to position {position}");
            Ok(())
        }
        BoardCommand::List { group } => cmd_list(store, group.as_deref()),
        BoardCommand::Search { term } => {
            cmd_search(store, &term);
            Ok(())
        }
        BoardCommand::Tags => {
            cmd_tags(store);
            Ok(())
        }
        BoardCommand::Stats => {
            store.update_statistics();
            print_statistics(store);
            Ok(())
        }
        BoardCommand::Export { format, output } => cmd_export(store, format, output),
        BoardCommand::Import { input, no_backup } => cmd_import(store, &db, &input, no_backup),
        BoardCommand::Tick => {
            let spawned = store.process_recurring_tasks();
            store.update_statistics();
            println!("Spawned {spawned} recurring task(s).");
            print_statistics(store);
            Ok(())
        }
    }
}

fn cmd_group<C: Clock>(store: &mut TaskStore<C>, action: GroupAction) -> CmdResult {
    match action {
        GroupAction::Add { name, kind } => {
            let name = name.trim();
            let Some(id) = store.add_task_group(name, kind) else {
                return Err(CliError::Empty("Group name"));
            };
            println!("Added {} '{}' ({})", format_category(kind), name, short_id(&id));
        }
        GroupAction::Rm { group } => {
            let group = resolve_group(store, &group)?;
            let (id, name, count) = (group.id.clone(), group.name.clone(), group.tasks.len());
            store.remove_task_group(&id);
            println!("Removed '{name}' and {count} task(s)");
        }
        GroupAction::Rename { group, name } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(CliError::Empty("Group name"));
            }
            let id = resolve_group(store, &group)?.id.clone();
            store.update_task_group_name(&id, name);
            println!("Renamed to '{name}'");
        }
        GroupAction::Move { group, position } => {
            let id = resolve_group(store, &group)?.id.clone();
            store.move_task_group(&id, position);
            println!("Moved to position {position}");
        }
        GroupAction::List => {
            println!("{:<10} {:<8} {:>5}  {}", "ID", "Type", "Tasks", "Name");
            for g in store.task_groups() {
                println!(
                    "{:<10} {:<8} {:>5}  {}",
                    short_id(&g.id),
                    format_category(g.kind),
                    g.tasks.len(),
                    g.name
                );
            }
        }
    }
    Ok(())
}

/// Add a new task to a group.
fn cmd_add<C: Clock>(
    store: &mut TaskStore<C>,
    title: &str,
    group: &str,
    category: Option<Category>,
    options: TaskOptions,
) -> CmdResult {
    let title = title.trim();
    if title.is_empty() {
        return Err(CliError::Empty("Title"));
    }
    let group = resolve_group(store, group)?;
    let (group_id, kind) = (group.id.clone(), group.kind);
    let id = store
        .add_task(title, category.unwrap_or(kind), &group_id, options)
        .ok_or_else(|| CliError::NotFound { kind: "group", reference: group_id.clone() })?;
    println!("Added task {}", short_id(&id));
    Ok(())
}

fn cmd_done<C: Clock>(store: &mut TaskStore<C>, task: &str, group: Option<&str>) -> CmdResult {
    let (group_id, task_id, title) = resolve_task(store, task, group)?;
    store.toggle_task_completion(&task_id, &group_id);
    let completed = store.task(&task_id, &group_id).is_some_and(|t| t.completed);
    if completed {
        println!("Marked '{title}' done.");
    } else {
        println!("Reopened '{title}'.");
    }
    Ok(())
}

/// Print the board, optionally a single group.
fn cmd_list<C: Clock>(store: &TaskStore<C>, group: Option<&str>) -> CmdResult {
    let groups: Vec<&TaskGroup> = match group {
        Some(reference) => vec![resolve_group(store, reference)?],
        None => {
            let mut all: Vec<&TaskGroup> = store.task_groups().iter().collect();
            all.sort_by_key(|g| g.order);
            all
        }
    };
    if groups.is_empty() {
        println!("No groups yet. Create one with `tb group add <name>`.");
        return Ok(());
    }
    for g in groups {
        let done = g.tasks.iter().filter(|t| t.completed).count();
        println!(
            "== {} ({}) [{}/{}] {}",
            g.name,
            format_category(g.kind),
            done,
            g.tasks.len(),
            short_id(&g.id)
        );
        let mut tasks: Vec<&Task> = g.tasks.iter().collect();
        tasks.sort_by_key(|t| t.order);
        print_tasks(&tasks);
        println!();
    }
    Ok(())
}

fn cmd_search<C: Clock>(store: &mut TaskStore<C>, term: &str) {
    store.set_search_term(term);
    let found = store.get_filtered_tasks();
    if found.is_empty() {
        println!("No tasks match '{term}'.");
        return;
    }
    print_tasks(&found);
}

fn cmd_tags<C: Clock>(store: &TaskStore<C>) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for t in store.task_groups().iter().flat_map(|g| g.tasks.iter()) {
        for tag in t.tag_list() {
            *counts.entry(tag.as_str()).or_default() += 1;
        }
    }
    println!("{:<16} {}", "Tag", "Count");
    for (tag, c) in counts {
        println!("{:<16} {}", truncate(tag, 16), c);
    }
}

fn cmd_export<C: Clock>(store: &TaskStore<C>, format: ExportFormat, output: Option<String>) -> CmdResult {
    let content = match format {
        ExportFormat::Json => export_json_pretty(store.task_groups())?,
        ExportFormat::Txt => render_txt(store.task_groups()),
    };
    let output = output.unwrap_or_else(|| format.default_file_name().to_string());
    if output == "-" {
        print!("{content}");
        return Ok(());
    }
    fs::write(&output, content).map_err(|e| crate::error::StoreError::io(&output, e))?;
    println!("Exported {} group(s) to {}", store.task_groups().len(), output);
    Ok(())
}

fn cmd_import<C: Clock>(store: &mut TaskStore<C>, db: &Database, input: &str, no_backup: bool) -> CmdResult {
    let json = fs::read_to_string(input).map_err(|e| crate::error::StoreError::io(input, e))?;

    if !no_backup && db.path().exists() {
        match db.create_backup() {
            Ok(path) => println!("Created backup: {}", path.display()),
            Err(e) => {
                eprintln!("Warning: Failed to create backup: {e}");
                print!("Continue without backup? (y/N): ");
                io::stdout().flush().ok();
                let mut response = String::new();
                if io::stdin().read_line(&mut response).is_err()
                    || !response.trim().to_lowercase().starts_with('y')
                {
                    println!("Import cancelled.");
                    return Ok(());
                }
            }
        }
    }

    if let Err(e) = store.import_from_json(&json) {
        eprintln!("Import failed: nothing was changed.");
        return Err(e.into());
    }
    let tasks: usize = store.task_groups().iter().map(|g| g.tasks.len()).sum();
    println!("Imported {} group(s), {} task(s).", store.task_groups().len(), tasks);
    Ok(())
}

fn cmd_backup(db: &Database) -> CmdResult {
    let path = db.create_backup()?;
    println!("Backup created: {}", path.display());
    Ok(())
}

/// The periodic timer: one tick immediately, then one per interval, forever.
///
/// A cycle that fails to load or save is logged and retried on the next interval.
fn cmd_watch(db: &Database, interval_secs: u64) -> CmdResult {
    let interval = Duration::from_secs(interval_secs.max(1));
    info!(interval_secs = interval.as_secs(), "watching for recurring tasks");
    loop {
        if let Err(e) = watch_cycle(db) {
            warn!("tick failed, retrying next cycle: {e}");
        }
        thread::sleep(interval);
    }
}

/// Reopen the state, tick once, and save. Returns the tasks spawned by the tick.
fn watch_cycle(db: &Database) -> Result<usize, StoreError> {
    // Reopen every cycle so edits made by other invocations are picked up.
    let mut session = Session::open(db.clone())?;
    let spawned = session.store.tick();
    session.commit()?;
    let s = session.store.statistics();
    info!(spawned, total = s.total_tasks, overdue = s.overdue_tasks_count, "tick");
    Ok(spawned)
}

fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut io::stdout());
}

fn print_statistics<C: Clock>(store: &TaskStore<C>) {
    let s = store.statistics();
    println!("Total tasks:        {}", s.total_tasks);
    println!("Completed:          {}", s.completed_tasks);
    println!("Pending:            {}", s.pending_tasks);
    println!("Completion:         {:.1}%", s.completion_percentage);
    println!("Due today done:     {:.1}%", s.today_completion_percentage);
    println!("Due in next 7 days: {}", s.upcoming_due_tasks);
    println!("Overdue:            {}", s.overdue_tasks_count);
}

/// Print tasks as a table.
fn print_tasks(tasks: &[&Task]) {
    let today = Local::now().date_naive();
    println!("{:<10} {:<4} {:<7} {:<10} {:<8} {}", "ID", "Done", "Pri", "Due", "Repeat", "Title [tags]");
    for t in tasks {
        let tags = if t.tag_list().is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tag_list().join(","))
        };
        let repeat = match t.recurring {
            Some(r) if r.enabled && r.frequency > 1 => format!("{}x{}", r.frequency, format_interval(r.interval)),
            Some(r) if r.enabled => format_interval(r.interval).to_string(),
            _ => "-".into(),
        };
        println!(
            "{:<10} {:<4} {:<7} {:<10} {:<8} {}{}",
            short_id(&t.id),
            if t.completed { "[x]" } else { "[ ]" },
            format_priority(t.priority),
            format_due_relative(t.due_date, today),
            truncate(&repeat, 8),
            t.title,
            tags
        );
    }
}

/// Resolve a group by id, id prefix, or case-insensitive name.
pub fn resolve_group<'a, C: Clock>(store: &'a TaskStore<C>, reference: &str) -> Result<&'a TaskGroup, CliError> {
    let groups = store.task_groups();
    if let Some(g) = groups.iter().find(|g| g.id == reference) {
        return Ok(g);
    }
    let lower = reference.to_lowercase();
    let matches: Vec<&TaskGroup> = groups
        .iter()
        .filter(|g| g.name.to_lowercase() == lower || g.id.starts_with(reference))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::NotFound { kind: "group", reference: reference.to_string() }),
        [one] => Ok(*one),
        many => Err(CliError::Ambiguous {
            kind: "group",
            reference: reference.to_string(),
            candidates: many
                .iter()
                .map(|g| format!("  {}: {} ({})", short_id(&g.id), g.name, format_category(g.kind)))
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    }
}

/// Resolve a task to `(group id, task id, title)`, optionally within one group.
pub fn resolve_task<C: Clock>(
    store: &TaskStore<C>,
    reference: &str,
    group: Option<&str>,
) -> Result<(String, String, String), CliError> {
    let scope: Vec<&TaskGroup> = match group {
        Some(g) => vec![resolve_group(store, g)?],
        None => store.task_groups().iter().collect(),
    };
    let lower = reference.to_lowercase();
    let candidates = || scope.iter().flat_map(|g| g.tasks.iter());

    if let Some(t) = candidates().find(|t| t.id == reference) {
        return Ok((t.parent.clone(), t.id.clone(), t.title.clone()));
    }
    let matches: Vec<&Task> = candidates()
        .filter(|t| t.title.to_lowercase() == lower || t.id.starts_with(reference))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::NotFound { kind: "task", reference: reference.to_string() }),
        [t] => Ok((t.parent.clone(), t.id.clone(), t.title.clone())),
        many => Err(CliError::Ambiguous {
            kind: "task",
            reference: reference.to_string(),
            candidates: many
                .iter()
                .map(|t| format!("  {}: {}", short_id(&t.id), t.title))
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    }
}

fn parse_due(input: &str) -> Result<Millis, CliError> {
    let today = Local::now().date_naive();
    parse_due_input(input, today)
        .map(local_midnight)
        .ok_or_else(|| CliError::InvalidDate(input.to_string()))
}

/// Split comma-separated tag arguments, trimming each and dropping blanks.
/// Order is preserved and duplicates are kept.
pub fn split_tags(inputs: &[String]) -> Vec<String> {
    inputs
        .iter()
        .flat_map(|raw| raw.split(','))
        .map(|part| part.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}
