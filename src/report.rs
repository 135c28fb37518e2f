use chrono::NaiveDate;
use std::sync::LazyLock;

use crate::api::ApiResponse;
use crate::dates::{days_between, format_long_date, parse_iso_date};
use crate::models::{Application, DailyReport, FeaturedApplications, ReportMetadata};

pub const HIGH_PRIORITY_MATCH: u32 = 80;
pub const SECONDARY_SLOTS: usize = 2;

/// The day of issue 1.
pub static ISSUE_EPOCH: LazyLock<NaiveDate> =
    LazyLock::new(|| NaiveDate::from_ymd_opt(2025, 1, 1).expect("2025-01-01 is a valid date"));

/// Issue 1 falls on the epoch; every calendar day after adds one.
/// Dates before the epoch, or that do not parse, are issue 1.
pub fn calculate_issue_number(date: &str) -> i64 {
    match parse_iso_date(date) {
        Some(target) => (days_between(*ISSUE_EPOCH, target) + 1).max(1),
        None => 1,
    }
}

pub fn calculate_average_salary(applications: &[Application]) -> String {
    let amounts: Vec<f64> = applications
        .iter()
        .filter_map(|app| app.salary.usable_amount())
        .collect();
    if amounts.is_empty() {
        return "N/A".to_string();
    }

    let avg = amounts.iter().sum::<f64>() / amounts.len() as f64;
    if avg >= 1000.0 {
        format!("${}k", (avg / 1000.0).round() as i64)
    } else {
        format!("${}", avg.round() as i64)
    }
}

/// A report for any day but today gives way to today's report when that
/// day's fetch errored (even with partial data) or came back empty.
pub fn falls_back_to_today(date: &str, today: &str, response: &ApiResponse<Vec<Application>>) -> bool {
    date != today
        && (response.error.is_some() || response.data.as_ref().is_none_or(|apps| apps.is_empty()))
}

pub fn format_report_date(date: &str) -> String {
    match parse_iso_date(date) {
        Some(parsed) => format_long_date(parsed),
        None => date.to_string(),
    }
}

pub fn build_report(applications: &[Application], date: &str) -> DailyReport {
    let mut sorted = applications.to_vec();
    // sort_by is stable: equal scores keep their input order
    sorted.sort_by(|a, b| b.match_score.cmp(&a.match_score));

    let high_priority_count = sorted
        .iter()
        .filter(|app| app.match_score >= HIGH_PRIORITY_MATCH)
        .count();

    let mut ranked = sorted.into_iter();
    let main = ranked.next();
    let secondary: Vec<Application> = ranked.by_ref().take(SECONDARY_SLOTS).collect();
    let other_applications: Vec<Application> = ranked.collect();

    DailyReport {
        metadata: ReportMetadata {
            issue_number: calculate_issue_number(date),
            formatted_date: format_report_date(date),
            total_applications: applications.len(),
            high_priority_count,
            average_salary: calculate_average_salary(applications),
        },
        featured_applications: FeaturedApplications { main, secondary },
        other_applications,
    }
}
