//! Time helpers: millisecond timestamps, clocks, local-day windows and due date input.
//!
//! Timestamps are stored as milliseconds since the Unix epoch. Anything that talks about
//! "today" works in the local timezone, midnight to midnight.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Utc};

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Source of the current time for the store.
pub trait Clock {
    fn now(&self) -> Millis;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        Utc::now().timestamp_millis()
    }
}

/// Convert a timestamp into local time, if it is representable.
pub fn to_local(ms: Millis) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(ms).single()
}

/// Local calendar date a timestamp falls on.
pub fn local_date(ms: Millis) -> Option<NaiveDate> {
    to_local(ms).map(|dt| dt.date_naive())
}

/// Timestamp of local midnight at the start of `date`.
///
/// When midnight does not exist (DST gap) the first valid instant of the day is used.
pub fn local_midnight(date: NaiveDate) -> Millis {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.timestamp_millis(),
        None => {
            let shifted = naive + Duration::hours(1);
            Local
                .from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.timestamp_millis())
                .unwrap_or_else(|| naive.and_utc().timestamp_millis())
        }
    }
}

/// Boundaries used by the statistics pass, all at local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub today: Millis,
    pub tomorrow: Millis,
    pub next_week: Millis,
}

impl DayWindow {
    /// Window for the local day containing `now`.
    pub fn containing(now: Millis) -> Self {
        let date = local_date(now).unwrap_or_else(|| Local::now().date_naive());
        DayWindow {
            today: local_midnight(date),
            tomorrow: local_midnight(date + Duration::days(1)),
            next_week: local_midnight(date + Duration::days(7)),
        }
    }

    pub fn is_today(&self, ms: Millis) -> bool {
        ms >= self.today && ms < self.tomorrow
    }
}

/// Parse human-readable due date input.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "next monday", "this friday", bare weekdays
/// - "end of week", "end of month"
/// - "in 3d", "in 2w", "in 1m"
/// - "YYYY-MM-DD"
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of week" | "eow" => {
            let weekday = today.weekday().num_days_from_monday() as i64;
            return Some(today + Duration::days(6 - weekday));
        }
        "end of month" | "eom" => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            let first_of_next = NaiveDate::from_ymd_opt(year, month, 1)?;
            return Some(first_of_next - Duration::days(1));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Some(today + Duration::days(days));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Some(today + Duration::weeks(weeks));
            }
        }
        if let Some(nm) = rest.strip_suffix('m') {
            if let Ok(months) = nm.trim().parse::<u32>() {
                return today.checked_add_months(chrono::Months::new(months));
            }
        }
    }

    let weekdays = [
        ("monday", 0), ("tuesday", 1), ("wednesday", 2), ("thursday", 3),
        ("friday", 4), ("saturday", 5), ("sunday", 6),
        ("mon", 0), ("tue", 1), ("wed", 2), ("thu", 3),
        ("fri", 4), ("sat", 5), ("sun", 6),
    ];

    let current_day = today.weekday().num_days_from_monday() as i64;
    for (day_name, target_day) in weekdays {
        let days_ahead = (target_day + 7 - current_day) % 7;
        if s == day_name || s == format!("this {day_name}") {
            return Some(today + Duration::days(days_ahead));
        }
        if s == format!("next {day_name}") {
            let days_to_add = if days_ahead == 0 { 7 } else { days_ahead + 7 };
            return Some(today + Duration::days(days_to_add));
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<Millis>, today: NaiveDate) -> String {
    match due.and_then(local_date) {
        None => "-".into(),
        Some(d) => {
            let delta = (d - today).num_days();
            if delta == 0 {
                "today".into()
            } else if delta == 1 {
                "tomorrow".into()
            } else if delta > 1 {
                format!("in {delta}d")
            } else {
                format!("{}d late", -delta)
            }
        }
    }
}

/// Format a timestamp as a local `YYYY-MM-DD` date.
pub fn format_date(ms: Millis) -> String {
    local_date(ms).map(|d| d.to_string()).unwrap_or_else(|| "-".into())
}
