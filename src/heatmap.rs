use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use crate::dates::{format_iso_date, is_iso_date};
use crate::models::{Application, HeatmapBucket};

pub const COLOR_LEVELS: u8 = 4;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Count applications per calendar day. Records whose date is not strictly
/// `YYYY-MM-DD` are skipped. Buckets come back in ascending date order.
pub fn aggregate(applications: &[Application]) -> Vec<HeatmapBucket> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for app in applications {
        if !is_iso_date(&app.date) {
            continue;
        }
        *counts.entry(app.date.as_str()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(date, count)| HeatmapBucket {
            date: date.to_string(),
            count,
        })
        .collect()
}

/// Largest bucket count, never below 1.
pub fn max_count(buckets: &[HeatmapBucket]) -> usize {
    buckets.iter().map(|b| b.count).max().unwrap_or(0).max(1)
}

/// Map a count to an intensity level in `0..=4` relative to `max`.
pub fn color_level(count: usize, max: usize) -> u8 {
    if count == 0 {
        return 0;
    }
    let max = max.max(1);
    let scaled = (count as f64 / max as f64 * f64::from(COLOR_LEVELS)).ceil();
    scaled.min(f64::from(COLOR_LEVELS)) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub count: usize,
    pub weekday: u32, // 0 = Sunday
    pub in_year: bool,
}

/// Lay out a year as Sunday-first weeks, padded with neighbouring-year days so
/// every week has seven cells.
pub fn calendar_weeks(year: i32, buckets: &[HeatmapBucket]) -> Vec<Vec<CalendarCell>> {
    let (Some(jan_first), Some(dec_last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return Vec::new();
    };

    let lookup: BTreeMap<&str, usize> = buckets.iter().map(|b| (b.date.as_str(), b.count)).collect();

    let first = jan_first - Duration::days(i64::from(jan_first.weekday().num_days_from_sunday()));
    let last = dec_last + Duration::days(i64::from(6 - dec_last.weekday().num_days_from_sunday()));

    let mut weeks = Vec::new();
    let mut week = Vec::with_capacity(7);
    let mut current = first;
    while current <= last {
        let key = format_iso_date(current);
        week.push(CalendarCell {
            date: current,
            count: lookup.get(key.as_str()).copied().unwrap_or(0),
            weekday: current.weekday().num_days_from_sunday(),
            in_year: current.year() == year,
        });
        if week.len() == 7 {
            weeks.push(std::mem::replace(&mut week, Vec::with_capacity(7)));
        }
        current += Duration::days(1);
    }
    if !week.is_empty() {
        weeks.push(week);
    }
    weeks
}

/// Month label positions: `(label, week_index)` at the first week where each month starts.
pub fn month_labels(weeks: &[Vec<CalendarCell>]) -> Vec<(&'static str, usize)> {
    let mut labels = Vec::new();
    let mut last_month = None;

    for (index, week) in weeks.iter().enumerate() {
        let Some(first_in_year) = week.iter().find(|cell| cell.in_year) else {
            continue;
        };
        let month = first_in_year.date.month0();
        if Some(month) != last_month && index > 0 {
            labels.push((MONTH_ABBREVIATIONS[month as usize], index));
            last_month = Some(month);
        }
    }
    labels
}

pub fn total(buckets: &[HeatmapBucket]) -> usize {
    buckets.iter().map(|b| b.count).sum()
}
