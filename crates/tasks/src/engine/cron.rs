//! Cron expression normalization and parsing.

use std::str::FromStr;

use ::cron::Schedule;

use crate::error::{Result, TaskError};

/// Normalize a cron expression into the form the `cron` crate parses.
///
/// A 5-field expression gets `0` prepended for seconds. The `cron` crate wants
/// `sec min hour day-of-month month day-of-week` (optionally followed by a
/// year) and counts weekdays 1-7 from Sunday, so numeric day-of-week values on
/// the usual 0-7 scale (0 and 7 are Sunday) are rewritten onto it. Weekday
/// names and `@daily`-style descriptors pass through trimmed.
pub fn normalize_cron(expr: &str) -> String {
    let mut fields: Vec<String> = expr.split_whitespace().map(str::to_string).collect();
    if fields.len() == 5 {
        fields.insert(0, "0".to_string());
    }
    if matches!(fields.len(), 6 | 7) {
        fields[5] = translate_day_of_week(&fields[5]);
    }
    fields.join(" ")
}

fn translate_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(translate_day_of_week_item)
        .collect::<Vec<_>>()
        .join(",")
}

/// One list item: `N`, `A-B`, `N/S` or `A-B/S` on the 0-7 scale.
fn translate_day_of_week_item(item: &str) -> String {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    // Both scales start the week on Sunday, so `*` and `*/S` select the same days.
    if base == "*" || base == "?" {
        return item.to_string();
    }

    let bounds = match base.split_once('-') {
        Some((lo, hi)) => lo.parse::<u32>().ok().zip(hi.parse::<u32>().ok()),
        // `N/S` runs from N to Saturday.
        None => base
            .parse::<u32>()
            .ok()
            .map(|lo| (lo, if step.is_some() { 6 } else { lo })),
    };
    let step = match step.map(str::parse::<usize>) {
        None => Some(1),
        Some(Ok(step)) if step > 0 => Some(step),
        Some(_) => None,
    };

    match (bounds, step) {
        (Some((lo, hi)), Some(step)) if lo <= hi && hi <= 7 => {
            let mut days: Vec<u32> = (lo..=hi).step_by(step).map(|day| day % 7 + 1).collect();
            days.sort_unstable();
            days.dedup();
            days.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
        }
        // Names and out-of-range values are left for the parser to judge.
        _ => item.to_string(),
    }
}

/// Parse a cron expression into a [`Schedule`], mapping failures to
/// [`TaskError::InvalidSchedule`].
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let normalized = normalize_cron(expr);
    Schedule::from_str(&normalized).map_err(|source| TaskError::InvalidSchedule {
        expr: expr.to_string(),
        source,
    })
}
