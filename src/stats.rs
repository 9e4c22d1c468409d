//! Aggregate statistics over the board.

use crate::task::{Statistics, TaskGroup};
use crate::time::{DayWindow, Millis};

/// Recompute the statistics block in a single pass over every task.
///
/// "Today" is the local midnight-to-midnight window containing `now`.
pub fn compute_statistics(groups: &[TaskGroup], now: Millis) -> Statistics {
    let window = DayWindow::containing(now);

    let mut total = 0usize;
    let mut completed = 0usize;
    let mut due_today = 0usize;
    let mut due_today_completed = 0usize;
    let mut upcoming = 0usize;
    let mut overdue = 0usize;

    for task in groups.iter().flat_map(|g| g.tasks.iter()) {
        total += 1;
        if task.completed {
            completed += 1;
        }
        let Some(due) = task.due_date else {
            continue;
        };
        if window.is_today(due) {
            due_today += 1;
            if task.completed {
                due_today_completed += 1;
            }
        }
        if task.completed {
            continue;
        }
        if due > window.today && due <= window.next_week {
            upcoming += 1;
        }
        if due < window.today {
            overdue += 1;
        }
    }

    Statistics {
        total_tasks: total,
        completed_tasks: completed,
        pending_tasks: total - completed,
        completion_percentage: percentage(completed, total),
        today_completion_percentage: percentage(due_today_completed, due_today),
        upcoming_due_tasks: upcoming,
        overdue_tasks_count: overdue,
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
