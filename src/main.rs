mod api;
mod config;
mod dates;
mod filter;
mod heatmap;
mod models;
mod render;
mod report;
mod session;
mod telemetry;
mod tui;

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Args, Parser, Subcommand};
use config::Config;
use dates::{format_iso_date, parse_date_arg, today, today_iso};
use filter::{Eligibility, Filters};
use models::Application;
use session::Session;
use telemetry::LogSink;
use std::path::PathBuf;
use tracing::warn;

const REPORT_WIDTH: usize = 72;

#[derive(Parser)]
#[command(name = "daily")]
#[command(about = "The Daily Application - browse, filter, and report on tracked job applications")]
struct Cli {
    /// Backend base URL (overrides config file and DAILY_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Log level or filter directive (overrides DAILY_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Search company, role, location, and tags
    #[arg(short, long, default_value = "")]
    query: String,

    /// Status contains (or "all")
    #[arg(short, long, default_value = filter::ALL)]
    status: String,

    /// Minimum match score (0-100)
    #[arg(short, long, default_value = "0")]
    min_match: u32,

    /// Location contains (or "all")
    #[arg(short, long, default_value = filter::ALL)]
    location: String,

    /// Eligibility: eligible, all, non-eligible
    #[arg(short, long, default_value = "eligible")]
    eligibility: Eligibility,
}

impl From<FilterArgs> for Filters {
    fn from(args: FilterArgs) -> Self {
        Filters {
            query: args.query,
            status: args.status,
            min_match: args.min_match,
            location: args.location,
            eligibility: args.eligibility,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configured password against the backend
    Login {
        /// Password (defaults to DAILY_PASSWORD or the config file)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// End the backend session
    Logout,

    /// Show whether the backend considers this client logged in
    Session,

    /// List applications matching the filters
    List {
        #[command(flatten)]
        filters: FilterArgs,

        /// Only applications from this day (YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Also print the filter state as a query string
        #[arg(long)]
        share: bool,
    },

    /// Show the per-day application heatmap
    Heatmap {
        #[command(flatten)]
        filters: FilterArgs,

        /// Calendar year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Print the day buckets as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the daily report for a date
    Report {
        /// Report date (YYYY-MM-DD, defaults to today)
        #[arg(value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        /// Print JSON instead of the newspaper layout
        #[arg(long)]
        json: bool,
    },

    /// Browse applications interactively
    Browse {
        #[command(flatten)]
        filters: FilterArgs,

        /// Restore filters from a `daily list --share` query string
        #[arg(long)]
        link: Option<String>,
    },
}

/// Fetch applications, keeping partial data that arrives alongside an error.
fn fetch_applications(session: &Session, date: Option<&str>) -> Result<Vec<Application>> {
    let response = session.client().get_jobs(date);
    match (response.data, response.error) {
        (Some(data), None) => Ok(data),
        (Some(data), Some(error)) if !data.is_empty() => {
            warn!(%error, "backend returned partial data");
            eprintln!("warning: {}", error);
            Ok(data)
        }
        (_, Some(error)) => Err(anyhow!("Unable to load applications: {}", error)),
        (None, None) => Ok(Vec::new()),
    }
}

/// Fetch the report for `date`, falling back to today when that day errors or has nothing.
fn fetch_report_applications(session: &Session, date: String) -> Result<(String, Vec<Application>)> {
    let today = today_iso();
    if date != today {
        let response = session.client().get_jobs(Some(&date));
        if !report::falls_back_to_today(&date, &today, &response) {
            return Ok((date, response.data.unwrap_or_default()));
        }
        match &response.error {
            Some(error) => eprintln!("Unable to load report for {}: {}; showing today's report.", date, error),
            None => eprintln!("No applications recorded for {}; showing today's report.", date),
        }
    }
    let apps = fetch_applications(session, Some(&today))
        .context("Unable to load report")?;
    Ok((today, apps))
}

fn print_table(applications: &[&Application]) {
    println!(
        "{:<5} {:<12} {:<30} {:<20} {:<18} {:>12}",
        "MATCH", "DATE", "ROLE", "COMPANY", "STATUS", "SALARY"
    );
    println!("{}", "-".repeat(102));
    for app in applications {
        let salary = if app.salary.is_displayable() {
            app.salary.display_value.as_str()
        } else {
            "-"
        };
        println!(
            "{:<5} {:<12} {:<30} {:<20} {:<18} {:>12}",
            format!("{}%", app.match_score),
            if app.date.is_empty() { "-" } else { app.date.as_str() },
            render::truncate(&app.role, 28),
            render::truncate(&app.company, 18),
            render::truncate(&app.status, 16),
            render::truncate(salary, 12)
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_overrides(cli.api_base.as_deref(), cli.log_level.as_deref());
    // The browser owns the terminal, so its logs go to a file
    let sink = if matches!(cli.command, Commands::Browse { .. }) {
        LogSink::browse_default()
    } else {
        LogSink::Stderr
    };
    telemetry::init(&config.log_level, &sink)?;

    let session = Session::new(api::ApiClient::new(&config.api_base)?);

    match cli.command {
        Commands::Login { password } => {
            let password = password
                .or_else(|| config.password.clone())
                .ok_or_else(|| anyhow!("No password given. Use --password or set DAILY_PASSWORD."))?;
            if session.login(&password) {
                println!("Logged in to {}.", session.client().base());
            } else {
                let reason = session.state().error.unwrap_or_else(|| "Login failed".to_string());
                return Err(anyhow!("Login failed: {}", reason));
            }
        }

        Commands::Logout => {
            session.logout().context("Logout failed")?;
            println!("Logged out.");
        }

        Commands::Session => {
            if session.check() {
                println!("Authenticated at {}.", session.client().base());
            } else {
                println!("Not authenticated at {}.", session.client().base());
            }
        }

        Commands::List {
            filters,
            date,
            json,
            share,
        } => {
            session.ensure_authenticated(config.password.as_deref())?;
            let date = date.map(format_iso_date);
            let applications = fetch_applications(&session, date.as_deref())?;
            let filters: Filters = filters.into();
            let matching = filters.apply(&applications);

            if json {
                println!("{}", serde_json::to_string_pretty(&matching)?);
            } else if matching.is_empty() {
                println!("No applications found.");
            } else {
                let label = if filters.is_default() { "Applications" } else { "Search Results" };
                println!("{} {}\n", matching.len(), label);
                print_table(&matching);
            }

            if share {
                println!("\n?{}", filters.to_query_string());
            }
        }

        Commands::Heatmap {
            filters,
            year,
            json,
        } => {
            session.ensure_authenticated(config.password.as_deref())?;
            let applications = fetch_applications(&session, None)?;
            let filters: Filters = filters.into();

            let filtered: Vec<Application> =
                filters.apply(&applications).into_iter().cloned().collect();
            let buckets = heatmap::aggregate(&filtered);

            if json {
                println!("{}", serde_json::to_string_pretty(&buckets)?);
            } else {
                // Scale against every application so filtering does not brighten the map
                let global_max = heatmap::max_count(&heatmap::aggregate(&applications));
                let year = year.unwrap_or_else(|| today().year());
                println!("{} applications in {}\n", heatmap::total(&buckets), year);
                for line in render::heatmap_lines(year, &buckets, global_max) {
                    println!("{}", line);
                }
                let weeks = heatmap::calendar_weeks(year, &buckets);
                if let Some(busiest) = weeks
                    .iter()
                    .flatten()
                    .filter(|cell| cell.in_year && cell.count > 0)
                    .max_by_key(|cell| cell.count)
                {
                    println!("\nBusiest day: {}", render::cell_tooltip(busiest));
                }
                let skipped = filtered.len() - heatmap::total(&buckets);
                if skipped > 0 {
                    println!("\n({} without a usable date)", skipped);
                }
                if filter::has_applications_on(&applications, &today_iso()) {
                    println!("\nToday's report is ready: daily report");
                }
            }
        }

        Commands::Report { date, json } => {
            session.ensure_authenticated(config.password.as_deref())?;
            let requested = date.map(format_iso_date).unwrap_or_else(today_iso);
            let (date, applications) = fetch_report_applications(&session, requested)?;

            if applications.is_empty() {
                println!("No Applications Today");
                println!("There are no job applications recorded for {}.", date);
                return Ok(());
            }

            let report = report::build_report(&applications, &date);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for line in render::report_lines(&report, REPORT_WIDTH) {
                    println!("{}", line);
                }
            }
        }

        Commands::Browse { filters, link } => {
            let filters = match link {
                Some(link) => Filters::from_query_string(&link),
                None => filters.into(),
            };
            session.ensure_authenticated(config.password.as_deref())?;
            tui::run_browse(&session, filters)?;
        }
    }

    Ok(())
}
