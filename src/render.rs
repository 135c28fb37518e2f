use crate::heatmap::{self, CalendarCell};
use crate::models::{Application, DailyReport, HeatmapBucket, MatchStrength, truncate_chars};

pub const MAIN_CARD_CHARS: usize = 1000;
pub const LIST_CARD_CHARS: usize = 50;
pub const HOME_LIST_CHARS: usize = 80;

const LEVEL_GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];
const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let (head, _) = truncate_chars(s, max.saturating_sub(3));
    format!("{}...", head)
}

/// Description cut for a card, with a "more" marker when shortened.
pub fn excerpt(text: &str, limit: usize) -> String {
    match truncate_chars(text, limit) {
        (head, true) => format!("{} ...more", head.trim_end()),
        (whole, false) => whole.to_string(),
    }
}

pub fn match_label(app: &Application) -> String {
    let marker = match app.match_strength() {
        MatchStrength::Strong => "**",
        MatchStrength::Moderate => "*",
        MatchStrength::Weak => "",
    };
    format!("{}% Match{}", app.match_score, marker)
}

pub fn location_line(app: &Application) -> String {
    if app.salary.is_displayable() {
        format!("{} • {}", app.location, app.salary.display_value)
    } else {
        app.location.clone()
    }
}

pub fn cell_tooltip(cell: &CalendarCell) -> String {
    let plural = if cell.count == 1 { "" } else { "s" };
    format!(
        "{} application{} on {}",
        cell.count,
        plural,
        cell.date.format("%Y-%m-%d")
    )
}

/// Text calendar: a month-label row followed by one row per weekday.
/// Intensity is scaled against `max` so filtered views keep the global scale.
pub fn heatmap_lines(year: i32, buckets: &[HeatmapBucket], max: usize) -> Vec<String> {
    let weeks = heatmap::calendar_weeks(year, buckets);
    let mut lines = Vec::with_capacity(9);

    let mut labels: Vec<char> = vec![' '; weeks.len() + 3];
    for (label, index) in heatmap::month_labels(&weeks) {
        for (offset, ch) in label.chars().enumerate() {
            if let Some(slot) = labels.get_mut(index + offset) {
                *slot = ch;
            }
        }
    }
    lines.push(format!("    {}", labels.into_iter().collect::<String>().trim_end()));

    for (weekday, name) in WEEKDAY_LABELS.iter().enumerate() {
        let row: String = weeks
            .iter()
            .map(|week| match week.get(weekday) {
                Some(cell) if cell.in_year => {
                    LEVEL_GLYPHS[heatmap::color_level(cell.count, max) as usize]
                }
                _ => ' ',
            })
            .collect();
        lines.push(format!("{} {}", name, row.trim_end()));
    }

    let legend: String = LEVEL_GLYPHS.iter().map(|g| format!("{} ", g)).collect();
    lines.push(format!("    Less {}More", legend));
    lines
}

fn wrap_into(out: &mut Vec<String>, text: &str, width: usize, indent: &str) {
    for line in textwrap::fill(text, width.saturating_sub(indent.len()).max(20)).lines() {
        out.push(format!("{}{}", indent, line));
    }
}

fn card(out: &mut Vec<String>, app: &Application, chars: usize, width: usize) {
    out.push(location_line(app).to_uppercase());
    out.push(app.role.to_uppercase());
    out.push(format!("[{}]  {}", app.company.to_uppercase(), match_label(app)));
    if !app.description.is_empty() {
        wrap_into(out, &excerpt(&app.description, chars), width, "  ");
    }
    if !app.href.is_empty() {
        out.push(format!("  {}", app.href));
    }
}

/// Newspaper-style layout: masthead, lead story, two secondary stories, briefs.
pub fn report_lines(report: &DailyReport, width: usize) -> Vec<String> {
    let meta = &report.metadata;
    let rule = "=".repeat(width);
    let thin = "-".repeat(width);
    let mut out = Vec::new();

    out.push(rule.clone());
    out.push(format!("{:^width$}", "THE DAILY APPLICATION", width = width));
    out.push(rule.clone());
    out.push(format!(
        "No. {}  |  {}",
        meta.issue_number, meta.formatted_date
    ));
    out.push(format!(
        "{} applications  |  {} high priority  |  avg salary {}",
        meta.total_applications, meta.high_priority_count, meta.average_salary
    ));
    out.push(thin.clone());

    if let Some(main) = &report.featured_applications.main {
        out.push("FEATURED".to_string());
        card(&mut out, main, MAIN_CARD_CHARS, width);
        out.push(thin.clone());
    }

    for app in &report.featured_applications.secondary {
        card(&mut out, app, LIST_CARD_CHARS * 3, width);
        out.push(String::new());
    }

    if !report.other_applications.is_empty() {
        out.push(thin.clone());
        out.push("ALSO TODAY".to_string());
        for app in &report.other_applications {
            card(&mut out, app, LIST_CARD_CHARS, width);
            out.push(String::new());
        }
    }
    out
}
