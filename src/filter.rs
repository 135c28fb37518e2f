use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;

use crate::models::Application;

pub const ALL: &str = "all";

pub const INITIAL_RENDER_COUNT: usize = 15;
pub const RENDER_BUFFER: usize = 10;
pub const SCROLL_THRESHOLD: usize = 5; // rows from the end of the window

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eligibility {
    All,
    #[default]
    Eligible,
    NonEligible,
}

impl Eligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Eligibility::All => "all",
            Eligibility::Eligible => "eligible",
            Eligibility::NonEligible => "non-eligible",
        }
    }

    pub fn admits(&self, app: &Application) -> bool {
        match self {
            Eligibility::All => true,
            Eligibility::Eligible => app.is_eligible(),
            Eligibility::NonEligible => !app.is_eligible(),
        }
    }

    pub fn cycle(&self) -> Self {
        match self {
            Eligibility::Eligible => Eligibility::All,
            Eligibility::All => Eligibility::NonEligible,
            Eligibility::NonEligible => Eligibility::Eligible,
        }
    }
}

impl FromStr for Eligibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Eligibility::All),
            "eligible" => Ok(Eligibility::Eligible),
            "non-eligible" => Ok(Eligibility::NonEligible),
            other => Err(format!(
                "unknown eligibility '{}' (expected all, eligible, non-eligible)",
                other
            )),
        }
    }
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub query: String,
    pub status: String,
    pub min_match: u32,
    pub location: String,
    pub eligibility: Eligibility,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            query: String::new(),
            status: ALL.to_string(),
            min_match: 0,
            location: ALL.to_string(),
            eligibility: Eligibility::Eligible,
        }
    }
}

impl Filters {
    pub fn matches(&self, app: &Application) -> bool {
        let query = self.query.to_lowercase();
        let matches_search = query.is_empty()
            || app.company.to_lowercase().contains(&query)
            || app.role.to_lowercase().contains(&query)
            || app.location.to_lowercase().contains(&query)
            || app.tags.iter().any(|tag| tag.to_lowercase().contains(&query));

        let matches_status = self.status == ALL
            || app.status.to_lowercase().contains(&self.status.to_lowercase());
        let matches_min_match = app.match_score >= self.min_match;
        let matches_location = self.location == ALL
            || app.location.to_lowercase().contains(&self.location.to_lowercase());

        matches_search
            && matches_status
            && matches_min_match
            && matches_location
            && self.eligibility.admits(app)
    }

    pub fn apply<'a>(&self, applications: &'a [Application]) -> Vec<&'a Application> {
        applications.iter().filter(|app| self.matches(app)).collect()
    }

    /// True when nothing narrows the list beyond the default eligibility view.
    pub fn is_default(&self) -> bool {
        *self == Filters::default()
    }

    /// Query-string pairs for the non-default parts of the filter state.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.query.is_empty() {
            params.push(("q", self.query.clone()));
        }
        if self.status != ALL {
            params.push(("status", self.status.clone()));
        }
        if self.min_match > 0 {
            params.push(("minMatch", self.min_match.to_string()));
        }
        if self.location != ALL {
            params.push(("location", self.location.clone()));
        }
        if self.eligibility != Eligibility::Eligible {
            params.push(("eligibility", self.eligibility.as_str().to_string()));
        }
        params
    }

    /// Inverse of `to_query_pairs`. Unknown keys are ignored and unusable
    /// values fall back to their defaults.
    pub fn from_query_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filters = Filters::default();
        for (key, value) in pairs {
            match key {
                "q" => filters.query = value.to_string(),
                "status" if !value.is_empty() => filters.status = value.to_string(),
                "minMatch" => filters.min_match = value.parse().unwrap_or(0),
                "location" if !value.is_empty() => filters.location = value.to_string(),
                "eligibility" => filters.eligibility = value.parse().unwrap_or_default(),
                _ => {}
            }
        }
        filters
    }

    /// Percent-encoded form of `to_query_pairs`, without the leading `?`.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_query_pairs())
            .finish()
    }

    /// Accepts the output of `to_query_string`, with or without a leading `?`.
    pub fn from_query_string(query: &str) -> Self {
        let pairs: Vec<_> = form_urlencoded::parse(query.trim_start_matches('?').as_bytes()).collect();
        Self::from_query_pairs(pairs.iter().map(|(key, value)| (key.as_ref(), value.as_ref())))
    }
}

/// Distinct statuses in first-seen order.
pub fn unique_statuses(applications: &[Application]) -> Vec<String> {
    let mut seen = Vec::new();
    for app in applications {
        if !seen.contains(&app.status) {
            seen.push(app.status.clone());
        }
    }
    seen
}

/// Coarse location group used to populate the location filter options.
pub fn location_group(location: &str) -> String {
    let lower = location.to_lowercase();
    if lower.contains("remote") {
        return "Remote".to_string();
    }
    if lower.contains("contract") {
        return "Contract".to_string();
    }
    let before_comma = location.split(',').next().unwrap_or(location);
    before_comma
        .split('(')
        .next()
        .unwrap_or(before_comma)
        .trim()
        .to_string()
}

pub fn unique_locations(applications: &[Application]) -> Vec<String> {
    let mut seen = Vec::new();
    for app in applications {
        let group = location_group(&app.location);
        if !seen.contains(&group) {
            seen.push(group);
        }
    }
    seen
}

pub fn has_applications_on(applications: &[Application], date: &str) -> bool {
    applications.iter().any(|app| app.date == date)
}

/// Incrementally grown window over the filtered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderWindow {
    rendered: usize,
}

impl Default for RenderWindow {
    fn default() -> Self {
        Self {
            rendered: INITIAL_RENDER_COUNT,
        }
    }
}

impl RenderWindow {
    pub fn reset(&mut self) {
        self.rendered = INITIAL_RENDER_COUNT;
    }

    /// Number of rows to materialise for a list of `total` items.
    pub fn visible(&self, total: usize) -> usize {
        self.rendered.min(total)
    }

    /// Grow by one buffer when `cursor` is near the end of the window.
    pub fn on_scroll(&mut self, cursor: usize, total: usize) {
        let visible = self.visible(total);
        if visible.saturating_sub(cursor) <= SCROLL_THRESHOLD {
            self.rendered = (self.rendered + RENDER_BUFFER).min(total.max(INITIAL_RENDER_COUNT));
        }
    }

    /// Make sure `index` is rendered, leaving a few rows after it.
    pub fn reveal(&mut self, index: usize) {
        if index >= self.rendered {
            self.rendered = index + 5;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::application;

    fn tagged(id: &str, tags: &[&str]) -> Application {
        let mut app = application(id, 50);
        app.tags = tags.iter().map(|t| t.to_string()).collect();
        app
    }

    #[test]
    fn test_default_filters_admit_unspecified_eligibility() {
        let app = application("1", 0);
        assert_eq!(app.eligible, None);
        assert!(Filters::default().matches(&app));
    }

    #[test]
    fn test_eligibility_filters() {
        let mut ineligible = application("1", 50);
        ineligible.eligible = Some(false);
        let unspecified = application("2", 50);

        let eligible = Filters::default();
        assert!(!eligible.matches(&ineligible));
        assert!(eligible.matches(&unspecified));

        let non_eligible = Filters {
            eligibility: Eligibility::NonEligible,
            ..Filters::default()
        };
        assert!(non_eligible.matches(&ineligible));
        assert!(!non_eligible.matches(&unspecified));

        let all = Filters {
            eligibility: Eligibility::All,
            ..Filters::default()
        };
        assert!(all.matches(&ineligible));
        assert!(all.matches(&unspecified));
    }

    #[test]
    fn test_query_matches_fields_and_tags_case_insensitively() {
        let app = tagged("1", &["Rust", "Kubernetes"]);
        let with_query = |q: &str| Filters {
            query: q.to_string(),
            ..Filters::default()
        };

        assert!(with_query("company 1").matches(&app));
        assert!(with_query("SOFTWARE").matches(&app));
        assert!(with_query("seattle").matches(&app));
        assert!(with_query("kube").matches(&app));
        assert!(!with_query("golang").matches(&app));
        // Description is not searched
        assert!(!with_query("build things").matches(&app));
    }

    #[test]
    fn test_status_location_and_min_match() {
        let mut app = application("1", 75);
        app.status = "Interview Scheduled".to_string();
        app.location = "Remote (US)".to_string();

        let filters = Filters {
            status: "interview".to_string(),
            location: "remote".to_string(),
            min_match: 75,
            ..Filters::default()
        };
        assert!(filters.matches(&app));

        let stricter = Filters {
            min_match: 76,
            ..filters.clone()
        };
        assert!(!stricter.matches(&app));

        let wrong_status = Filters {
            status: "rejected".to_string(),
            ..filters
        };
        assert!(!wrong_status.matches(&app));
    }

    #[test]
    fn test_apply_preserves_order() {
        let apps = vec![
            application("a", 10),
            application("b", 90),
            application("c", 60),
        ];
        let filters = Filters {
            min_match: 50,
            ..Filters::default()
        };
        let ids: Vec<&str> = filters.apply(&apps).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_query_pairs_omit_defaults() {
        assert!(Filters::default().to_query_pairs().is_empty());
        assert!(Filters::default().is_default());

        let filters = Filters {
            query: "rust".to_string(),
            status: "applied".to_string(),
            min_match: 70,
            location: ALL.to_string(),
            eligibility: Eligibility::All,
        };
        let pairs = filters.to_query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("q", "rust".to_string()),
                ("status", "applied".to_string()),
                ("minMatch", "70".to_string()),
                ("eligibility", "all".to_string()),
            ]
        );

        let restored =
            Filters::from_query_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        assert_eq!(restored, filters);
        assert!(!restored.is_default());
    }

    #[test]
    fn test_from_query_pairs_tolerates_garbage() {
        let filters = Filters::from_query_pairs([
            ("minMatch", "lots"),
            ("eligibility", "maybe"),
            ("status", ""),
            ("utm_source", "mail"),
        ]);
        assert_eq!(filters, Filters::default());
    }

    #[test]
    fn test_query_string_escapes_reserved_characters() {
        let filters = Filters {
            query: "r&d =100% #1+".to_string(),
            location: "Austin".to_string(),
            ..Filters::default()
        };
        let query = filters.to_query_string();
        assert!(query.starts_with("q=r%26d"));
        assert!(query.ends_with("&location=Austin"));

        assert_eq!(Filters::from_query_string(&query), filters);
        assert_eq!(Filters::from_query_string(&format!("?{}", query)), filters);
        assert_eq!(Filters::from_query_string(""), Filters::default());
    }

    #[test]
    fn test_location_groups() {
        assert_eq!(location_group("Remote (US)"), "Remote");
        assert_eq!(location_group("Seattle, WA (Contract)"), "Contract");
        assert_eq!(location_group("Seattle, WA"), "Seattle");
        assert_eq!(location_group("Austin (Hybrid)"), "Austin");

        let mut apps = vec![application("1", 1), application("2", 1), application("3", 1)];
        apps[1].location = "remote - anywhere".to_string();
        apps[2].location = "Seattle (Downtown)".to_string();
        assert_eq!(unique_locations(&apps), vec!["Seattle", "Remote"]);
    }

    #[test]
    fn test_unique_statuses_first_seen_order() {
        let mut apps = vec![application("1", 1), application("2", 1), application("3", 1)];
        apps[0].status = "Rejected".to_string();
        apps[2].status = "Rejected".to_string();
        assert_eq!(unique_statuses(&apps), vec!["Rejected", "Applied"]);
    }

    #[test]
    fn test_has_applications_on() {
        let apps = vec![application("1", 1)];
        assert!(has_applications_on(&apps, "2026-01-05"));
        assert!(!has_applications_on(&apps, "2026-01-06"));
    }

    #[test]
    fn test_render_window_grows_near_end() {
        let mut window = RenderWindow::default();
        assert_eq!(window.visible(100), 15);
        assert_eq!(window.visible(4), 4);

        window.on_scroll(3, 100);
        assert_eq!(window.visible(100), 15);

        window.on_scroll(12, 100);
        assert_eq!(window.visible(100), 25);

        window.reveal(60);
        assert_eq!(window.visible(100), 65);

        window.on_scroll(64, 70);
        assert_eq!(window.visible(70), 70);

        window.reset();
        assert_eq!(window.visible(100), 15);
    }
}
