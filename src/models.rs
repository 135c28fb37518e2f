use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryKind {
    Salary,
    Hourly,
    Equity,
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    #[serde(rename = "type")]
    pub kind: SalaryKind,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub display_value: String,
}

impl Salary {
    /// Amount usable for averaging: present and non-zero.
    pub fn usable_amount(&self) -> Option<f64> {
        self.amount.filter(|a| *a != 0.0 && !a.is_nan())
    }

    /// Whether the display value is worth showing next to the location.
    pub fn is_displayable(&self) -> bool {
        !self.display_value.is_empty() && !self.display_value.eq_ignore_ascii_case("not specified")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    Remote,
    Hybrid,
    OnSite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub company: String,
    pub role: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<LocationType>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub href: String,
    pub salary: Salary,
    #[serde(rename = "match")]
    pub match_score: u32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub date: String, // YYYY-MM-DD, may be empty or malformed
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligible: Option<bool>, // None counts as eligible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Application {
    pub fn is_eligible(&self) -> bool {
        self.eligible != Some(false)
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn match_strength(&self) -> MatchStrength {
        MatchStrength::from_score(self.match_score)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrength {
    Strong,   // >= 80
    Moderate, // >= 50
    Weak,
}

impl MatchStrength {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            MatchStrength::Strong
        } else if score >= 50 {
            MatchStrength::Moderate
        } else {
            MatchStrength::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapBucket {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub issue_number: i64,
    pub formatted_date: String,
    pub total_applications: usize,
    pub high_priority_count: usize,
    pub average_salary: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeaturedApplications {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<Application>,
    pub secondary: Vec<Application>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub metadata: ReportMetadata,
    pub featured_applications: FeaturedApplications,
    pub other_applications: Vec<Application>,
}

/// Cut `text` to at most `limit` characters. Returns the text and whether it was cut.
pub fn truncate_chars(text: &str, limit: usize) -> (&str, bool) {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_record() {
        let json = r#"{
            "id": "abc",
            "company": "Acme",
            "role": "Platform Engineer",
            "location": "Remote (US)",
            "locationType": "on-site",
            "description": "Keep the lights on",
            "href": "https://acme.example/jobs/1",
            "salary": {"type": "range", "currency": "USD", "amount": 150000, "displayValue": "$140k-$160k"},
            "match": 87,
            "date": "2026-01-29",
            "status": "Applied",
            "tags": ["rust", "k8s"],
            "latitude": 47.6,
            "longitude": -122.3
        }"#;

        let app: Application = serde_json::from_str(json).unwrap();
        assert_eq!(app.match_score, 87);
        assert_eq!(app.salary.kind, SalaryKind::Range);
        assert_eq!(app.salary.amount, Some(150000.0));
        assert_eq!(app.location_type, Some(LocationType::OnSite));
        assert_eq!(app.eligible, None);
        assert!(app.is_eligible());
        assert_eq!(app.coordinates(), Some((47.6, -122.3)));
    }

    #[test]
    fn test_deserialize_tolerates_missing_and_null_date() {
        let base = r#""id": "x", "company": "C", "role": "R", "location": "L",
            "salary": {"type": "hourly", "currency": "USD", "displayValue": "Not specified"},
            "match": 10"#;

        let missing: Application = serde_json::from_str(&format!("{{{}}}", base)).unwrap();
        assert_eq!(missing.date, "");
        assert!(missing.tags.is_empty());

        let null: Application =
            serde_json::from_str(&format!("{{{}, \"date\": null}}", base)).unwrap();
        assert_eq!(null.date, "");
    }

    #[test]
    fn test_deserialize_tolerates_missing_currency() {
        let json = r#"{"id": "x", "company": "C", "role": "R", "location": "L",
            "salary": {"type": "salary", "amount": 120000, "displayValue": "$120k"},
            "match": 85}"#;
        let app: Application = serde_json::from_str(json).unwrap();
        assert_eq!(app.salary.currency, "");
        assert_eq!(app.salary.usable_amount(), Some(120000.0));
    }

    #[test]
    fn test_explicit_false_is_not_eligible() {
        let mut app = fixtures::application("1", 50);
        app.eligible = Some(false);
        assert!(!app.is_eligible());
        app.eligible = Some(true);
        assert!(app.is_eligible());
    }

    #[test]
    fn test_usable_amount_skips_zero() {
        let mut salary = fixtures::application("1", 50).salary;
        assert_eq!(salary.usable_amount(), None);
        salary.amount = Some(0.0);
        assert_eq!(salary.usable_amount(), None);
        salary.amount = Some(42.0);
        assert_eq!(salary.usable_amount(), Some(42.0));
    }

    #[test]
    fn test_salary_not_specified_is_hidden() {
        let mut salary = fixtures::application("1", 50).salary;
        assert!(!salary.is_displayable());
        salary.display_value = "NOT SPECIFIED".to_string();
        assert!(!salary.is_displayable());
        salary.display_value = "$45/hr".to_string();
        assert!(salary.is_displayable());
    }

    #[test]
    fn test_match_strength_thresholds() {
        assert_eq!(MatchStrength::from_score(80), MatchStrength::Strong);
        assert_eq!(MatchStrength::from_score(79), MatchStrength::Moderate);
        assert_eq!(MatchStrength::from_score(50), MatchStrength::Moderate);
        assert_eq!(MatchStrength::from_score(49), MatchStrength::Weak);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), ("héll", true));
        assert_eq!(truncate_chars("short", 50), ("short", false));
        assert_eq!(truncate_chars("exact", 5), ("exact", false));
    }
}
