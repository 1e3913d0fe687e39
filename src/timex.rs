//! Calendar-day helpers used to build chart label axes.

use chrono::{DateTime, Duration, NaiveDate, TimeZone};

/// Returns the start of the calendar day containing `t`, in `t`'s own time zone.
///
/// When local midnight does not exist (a DST gap), the earliest valid instant
/// of that day is used instead.
pub fn truncate<Tz: TimeZone>(t: &DateTime<Tz>) -> DateTime<Tz> {
    start_of_day(&t.timezone(), t.date_naive()).unwrap_or_else(|| t.clone())
}

/// Returns the start of every calendar day from `start`'s day through `end`'s
/// day, inclusive and in chronological order.
///
/// An empty vector is returned when `end` precedes `start`.
pub fn all_days<Tz: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Vec<DateTime<Tz>> {
    let tz = start.timezone();
    let last = end.with_timezone(&tz).date_naive();

    let mut days = Vec::new();
    let mut current = Some(start.date_naive());
    while let Some(date) = current.filter(|d| *d <= last) {
        if let Some(day) = start_of_day(&tz, date) {
            days.push(day);
        }
        current = date.succ_opt();
    }
    days
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight).earliest().or_else(|| {
        // Midnight skipped by a DST transition; the day starts one hour later.
        tz.from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
    })
}
