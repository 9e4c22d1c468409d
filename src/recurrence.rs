//! Next-occurrence arithmetic for recurring tasks.

use chrono::{Days, Months};

use crate::fields::Interval;
use crate::task::Recurring;
use crate::time::{to_local, Millis};

/// Due date of the successor of a task due at `due`.
///
/// Adds `frequency` calendar units in local time, so a daily task due at 09:00 stays at
/// 09:00 across DST changes. Month steps clamp to the last day of the target month
/// (Jan 31 + 1 month = Feb 28/29). A frequency of 0 is treated as 1.
pub fn next_due_date(due: Millis, recurring: &Recurring) -> Option<Millis> {
    let start = to_local(due)?;
    let n = recurring.frequency.max(1);
    let next = match recurring.interval {
        Interval::Daily => start.checked_add_days(Days::new(n as u64)),
        Interval::Weekly => start.checked_add_days(Days::new(n as u64 * 7)),
        Interval::Monthly => start.checked_add_months(Months::new(n)),
    }?;
    Some(next.timestamp_millis())
}
