use anyhow::Result;
use chrono::{Datelike, Duration as Days};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{ApiResponse, RequestSequence, RequestToken};
use crate::dates::{format_iso_date, parse_iso_date, today, today_iso};
use crate::filter::{self, ALL, Filters, RenderWindow};
use crate::heatmap;
use crate::models::{Application, DailyReport, MatchStrength, truncate_chars};
use crate::render;
use crate::report::{build_report, falls_back_to_today};
use crate::session::Session;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const HEATMAP_COLORS: [Color; 5] = [
    Color::Rgb(0xeb, 0xed, 0xf0),
    Color::Rgb(0xd4, 0xd4, 0xd0),
    Color::Rgb(0xa8, 0xa8, 0xa0),
    Color::Rgb(0x66, 0x66, 0x60),
    Color::Rgb(0x2b, 0x2b, 0x2b),
];
const MIN_MATCH_STEPS: [u32; 6] = [0, 50, 60, 70, 80, 90];

#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchTarget {
    Home,
    Report(String),
}

struct FetchResult {
    token: RequestToken,
    target: FetchTarget,
    response: ApiResponse<Vec<Application>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search,
}

struct AppState {
    applications: Vec<Application>,
    filters: Filters,
    filtered: Vec<usize>,
    selected: usize,
    window: RenderWindow,
    scroll_offset: u16,
    expanded: bool,
    mode: InputMode,
    screen: Screen,
    home_loading: bool,
    home_error: Option<String>,
    home_requests: RequestSequence,
    global_max: usize,
    report_date: String,
    report_applications: Vec<Application>,
    report_loading: bool,
    report_error: Option<String>,
    report_requests: RequestSequence,
}

impl AppState {
    fn new(filters: Filters) -> Self {
        Self {
            applications: Vec::new(),
            filters,
            filtered: Vec::new(),
            selected: 0,
            window: RenderWindow::default(),
            scroll_offset: 0,
            expanded: false,
            mode: InputMode::Normal,
            screen: Screen::Home,
            home_loading: false,
            home_error: None,
            home_requests: RequestSequence::default(),
            global_max: 1,
            report_date: today_iso(),
            report_applications: Vec::new(),
            report_loading: false,
            report_error: None,
            report_requests: RequestSequence::default(),
        }
    }

    /// Each screen has its own request sequence, so a report fetch never
    /// makes an in-flight home fetch stale.
    fn requests_for(&mut self, target: &FetchTarget) -> &mut RequestSequence {
        match target {
            FetchTarget::Home => &mut self.home_requests,
            FetchTarget::Report(_) => &mut self.report_requests,
        }
    }

    fn set_applications(&mut self, applications: Vec<Application>) {
        self.global_max = heatmap::max_count(&heatmap::aggregate(&applications));
        self.applications = applications;
        self.refilter();
    }

    fn refilter(&mut self) {
        self.filtered = self
            .applications
            .iter()
            .enumerate()
            .filter(|(_, app)| self.filters.matches(app))
            .map(|(i, _)| i)
            .collect();
        self.selected = 0;
        self.scroll_offset = 0;
        self.expanded = false;
        self.window.reset();
    }

    fn filtered_applications(&self) -> Vec<Application> {
        self.filtered
            .iter()
            .filter_map(|&i| self.applications.get(i).cloned())
            .collect()
    }

    fn current(&self) -> Option<&Application> {
        self.filtered
            .get(self.selected)
            .and_then(|&i| self.applications.get(i))
    }

    fn next(&mut self) {
        let visible = self.window.visible(self.filtered.len());
        if visible > 0 && self.selected < visible - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
            self.expanded = false;
        }
        self.window.on_scroll(self.selected, self.filtered.len());
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
            self.expanded = false;
        }
    }

    fn last(&mut self) {
        if let Some(last) = self.filtered.len().checked_sub(1) {
            self.selected = last;
            self.scroll_offset = 0;
            self.expanded = false;
            self.window.reveal(last);
        }
    }

    fn first(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
        self.expanded = false;
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn cycle_status(&mut self) {
        let options = filter::unique_statuses(&self.applications);
        self.filters.status = cycle_option(&self.filters.status, &options);
        self.refilter();
    }

    fn cycle_location(&mut self) {
        let options = filter::unique_locations(&self.applications);
        self.filters.location = cycle_option(&self.filters.location, &options);
        self.refilter();
    }

    fn cycle_min_match(&mut self) {
        let position = MIN_MATCH_STEPS
            .iter()
            .position(|step| *step == self.filters.min_match)
            .unwrap_or(0);
        self.filters.min_match = MIN_MATCH_STEPS[(position + 1) % MIN_MATCH_STEPS.len()];
        self.refilter();
    }

    fn cycle_eligibility(&mut self) {
        self.filters.eligibility = self.filters.eligibility.cycle();
        self.refilter();
    }

    fn clear_filters(&mut self) {
        self.filters = Filters::default();
        self.refilter();
    }

    fn report(&self) -> DailyReport {
        build_report(&self.report_applications, &self.report_date)
    }
}

fn cycle_option(current: &str, options: &[String]) -> String {
    if current == ALL {
        return options.first().cloned().unwrap_or_else(|| ALL.to_string());
    }
    match options.iter().position(|o| o == current) {
        Some(i) if i + 1 < options.len() => options[i + 1].clone(),
        _ => ALL.to_string(),
    }
}

fn shift_date(date: &str, days: i64) -> String {
    match parse_iso_date(date) {
        Some(parsed) => format_iso_date(parsed + Days::days(days)),
        None => today_iso(),
    }
}

fn spawn_fetch(session: &Session, token: RequestToken, target: FetchTarget, tx: &Sender<FetchResult>) {
    let client = session.client().clone();
    let tx = tx.clone();
    thread::spawn(move || {
        let date = match &target {
            FetchTarget::Home => None,
            FetchTarget::Report(date) => Some(date.clone()),
        };
        let response = client.get_jobs(date.as_deref());
        // The UI may have exited; nothing to deliver to.
        let _ = tx.send(FetchResult {
            token,
            target,
            response,
        });
    });
}

fn start_fetch(state: &mut AppState, session: &Session, target: FetchTarget, tx: &Sender<FetchResult>) {
    let token = state.requests_for(&target).begin();
    debug!(?token, ?target, "starting fetch");
    match target {
        FetchTarget::Home => {
            state.home_loading = true;
            state.home_error = None;
        }
        FetchTarget::Report(_) => {
            state.report_loading = true;
            state.report_error = None;
        }
    }
    spawn_fetch(session, token, target, tx);
}

fn apply_fetch(state: &mut AppState, session: &Session, result: FetchResult, tx: &Sender<FetchResult>) {
    let FetchResult { token, target, response } = result;
    if !state.requests_for(&target).is_current(token) {
        debug!(?token, ?target, "dropping stale response");
        return;
    }

    let unauthorized = response
        .is_unauthorized()
        .then(|| session.state().error.unwrap_or_else(|| "Unauthorized".to_string()));

    match target {
        FetchTarget::Home => {
            state.home_loading = false;
            if let Some(message) = unauthorized {
                state.home_error = Some(message);
                return;
            }
            state.home_error = response.error.as_ref().map(|e| e.to_string());
            // Records that arrive alongside an error are still shown.
            state.set_applications(response.data.unwrap_or_default());
        }
        FetchTarget::Report(date) => {
            state.report_loading = false;
            if let Some(message) = unauthorized {
                state.report_error = Some(message);
                return;
            }
            let today = today_iso();
            if falls_back_to_today(&date, &today, &response) {
                info!(%date, "no report for date, falling back to today");
                state.report_date = today.clone();
                start_fetch(state, session, FetchTarget::Report(today), tx);
                return;
            }
            state.report_error = response.error.map(|e| e.to_string());
            state.report_date = date;
            state.report_applications = response.data.unwrap_or_default();
            state.scroll_offset = 0;
        }
    }
}

pub fn run_browse(session: &Session, filters: Filters) -> Result<()> {
    let mut state = AppState::new(filters);
    let (tx, rx) = mpsc::channel();
    start_fetch(&mut state, session, FetchTarget::Home, &tx);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, session, &tx, &rx);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    session: &Session,
    tx: &Sender<FetchResult>,
    rx: &Receiver<FetchResult>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        while let Ok(result) = rx.try_recv() {
            apply_fetch(state, session, result, tx);
        }
        list_state.select(if state.filtered.is_empty() { None } else { Some(state.selected) });
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let keep_running = match (state.screen, state.mode) {
                (_, InputMode::Search) => {
                    handle_search_key(state, key);
                    true
                }
                (Screen::Home, InputMode::Normal) => handle_home_key(state, session, key, tx),
                (Screen::Report, InputMode::Normal) => {
                    handle_report_key(state, session, key, tx);
                    true
                }
            };
            if !keep_running {
                break;
            }
        }
    }
    Ok(())
}

fn handle_search_key(state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Esc => state.mode = InputMode::Normal,
        KeyCode::Backspace => {
            state.filters.query.pop();
            state.refilter();
        }
        KeyCode::Char(c) => {
            state.filters.query.push(c);
            state.refilter();
        }
        _ => {}
    }
}

fn handle_home_key(state: &mut AppState, session: &Session, key: KeyEvent, tx: &Sender<FetchResult>) -> bool {
    match key.code {
        KeyCode::Char('q') => return false,
        KeyCode::Esc => {
            if state.expanded {
                state.expanded = false;
            } else if !state.filters.query.is_empty() {
                state.filters.query.clear();
                state.refilter();
            } else {
                return false;
            }
        }
        KeyCode::Char('/') => state.mode = InputMode::Search,
        KeyCode::Down | KeyCode::Char('j') => state.next(),
        KeyCode::Up | KeyCode::Char('k') => state.prev(),
        KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
        KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
        KeyCode::Char('G') | KeyCode::End => state.last(),
        KeyCode::Home => state.first(),
        KeyCode::Char('e') | KeyCode::Enter => state.expanded = !state.expanded,
        KeyCode::Char('s') => state.cycle_status(),
        KeyCode::Char('l') => state.cycle_location(),
        KeyCode::Char('m') => state.cycle_min_match(),
        KeyCode::Char('g') => state.cycle_eligibility(),
        KeyCode::Char('c') => state.clear_filters(),
        KeyCode::Char('R') => start_fetch(state, session, FetchTarget::Home, tx),
        KeyCode::Char('d') => {
            let date = state
                .current()
                .map(|app| app.date.clone())
                .filter(|date| parse_iso_date(date).is_some())
                .unwrap_or_else(today_iso);
            state.screen = Screen::Report;
            state.scroll_offset = 0;
            start_fetch(state, session, FetchTarget::Report(date), tx);
        }
        _ => {}
    }
    true
}

fn handle_report_key(state: &mut AppState, session: &Session, key: KeyEvent, tx: &Sender<FetchResult>) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('q') => {
            state.screen = Screen::Home;
            state.scroll_offset = 0;
        }
        KeyCode::Down | KeyCode::Char('j') | KeyCode::PageDown => state.scroll_down(),
        KeyCode::Up | KeyCode::Char('k') | KeyCode::PageUp => state.scroll_up(),
        KeyCode::Char('[') => {
            let date = shift_date(&state.report_date, -1);
            start_fetch(state, session, FetchTarget::Report(date), tx);
        }
        KeyCode::Char(']') => {
            let date = shift_date(&state.report_date, 1);
            start_fetch(state, session, FetchTarget::Report(date), tx);
        }
        KeyCode::Char('R') => {
            let date = state.report_date.clone();
            start_fetch(state, session, FetchTarget::Report(date), tx);
        }
        _ => {}
    }
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    match state.screen {
        Screen::Home => draw_home(frame, state, list_state, rows[0]),
        Screen::Report => draw_report(frame, state, rows[0]),
    }

    let footer = match (state.mode, state.screen) {
        (InputMode::Search, _) => format!(" search: {}_   (enter/esc to finish)", state.filters.query),
        (InputMode::Normal, Screen::Home) => {
            " j/k:navigate G:last J/K:scroll /:search s:status l:location m:match g:eligibility c:clear e:expand d:report R:reload q:quit".to_string()
        }
        (InputMode::Normal, Screen::Report) => {
            " j/k:scroll [/]:prev/next day R:reload b:back".to_string()
        }
    };
    let help = Paragraph::new(footer).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[1]);
}

fn draw_home(frame: &mut Frame, state: &AppState, list_state: &mut ListState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(10),
            Constraint::Min(0),
        ])
        .split(area);

    // Header
    let label = if state.filters.is_default() { "Applications" } else { "Search Results" };
    let mut header = format!("{} {}", state.filtered.len(), label);
    if state.home_loading {
        header.push_str("  (loading...)");
    }
    let filters = format!(
        "status:{}  location:{}  min match:{}%  eligibility:{}  query:{}",
        state.filters.status,
        state.filters.location,
        state.filters.min_match,
        state.filters.eligibility,
        if state.filters.query.is_empty() { "-" } else { state.filters.query.as_str() }
    );
    let header_widget = Paragraph::new(vec![
        Line::from(Span::styled(header, Style::default().add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(filters, Style::default().fg(Color::DarkGray))),
    ])
    .block(Block::default().borders(Borders::BOTTOM).title(" THE DAILY APPLICATION "));
    frame.render_widget(header_widget, chunks[0]);

    // Heatmap of the filtered set, scaled against the unfiltered maximum
    let buckets = heatmap::aggregate(&state.filtered_applications());
    let heatmap_widget = Paragraph::new(heatmap_text(&buckets, state.global_max))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(heatmap_widget, chunks[1]);

    // Partial data keeps the list and shows the error above it
    let mut list_area = chunks[2];
    if let (Some(error), false) = (&state.home_error, state.applications.is_empty()) {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(list_area);
        let banner = Paragraph::new(format!("{} (R to retry)", error))
            .style(Style::default().fg(Color::Red));
        frame.render_widget(banner, split[0]);
        list_area = split[1];
    }

    if let (Some(error), true) = (&state.home_error, state.applications.is_empty()) {
        let message = Paragraph::new(vec![
            Line::from(Span::styled(
                "Unable to load applications",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(error.as_str()),
            Line::from(Span::styled("Press R to try again", Style::default().fg(Color::DarkGray))),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(message, list_area);
        return;
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(65),
        ])
        .split(list_area);

    // Left panel: rendered window of the filtered list
    let visible = state.window.visible(state.filtered.len());
    let items: Vec<ListItem> = state.filtered[..visible]
        .iter()
        .filter_map(|&i| state.applications.get(i))
        .map(|app| {
            let style = match app.match_strength() {
                MatchStrength::Strong => Style::default().fg(Color::Green),
                MatchStrength::Moderate => Style::default().fg(Color::Yellow),
                MatchStrength::Weak => Style::default(),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>3}% ", app.match_score), style),
                Span::raw(format!(
                    "{} | {}",
                    render::truncate(&app.role, 30),
                    render::truncate(&app.company, 18)
                )),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Jobs ({}/{}) ", visible, state.filtered.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, body[0], list_state);

    // Right panel: detail
    let detail_widget = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, body[1]);
}

fn heatmap_text(buckets: &[crate::models::HeatmapBucket], max: usize) -> Text<'static> {
    let year = today().year();
    let weeks = heatmap::calendar_weeks(year, buckets);

    let mut labels: Vec<char> = vec![' '; weeks.len() + 3];
    for (label, index) in heatmap::month_labels(&weeks) {
        for (offset, ch) in label.chars().enumerate() {
            if let Some(slot) = labels.get_mut(index + offset) {
                *slot = ch;
            }
        }
    }
    let mut lines = vec![Line::from(labels.into_iter().collect::<String>())];

    for weekday in 0..7 {
        let spans: Vec<Span> = weeks
            .iter()
            .map(|week| match week.get(weekday) {
                Some(cell) if cell.in_year => {
                    let level = heatmap::color_level(cell.count, max) as usize;
                    Span::styled("■", Style::default().fg(HEATMAP_COLORS[level]))
                }
                _ => Span::raw(" "),
            })
            .collect();
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(Span::styled(
        format!("{} applications in view", heatmap::total(buckets)),
        Style::default().fg(Color::DarkGray),
    )));
    Text::from(lines)
}

fn build_detail(state: &AppState) -> Text<'_> {
    let Some(app) = state.current() else {
        return Text::raw(if state.home_loading { "Loading..." } else { "No applications match" });
    };

    let mut lines: Vec<Line> = Vec::new();

    // Header
    lines.push(Line::from(Span::styled(
        app.role.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", app.company)));
    lines.push(Line::from(render::location_line(app)));

    let match_style = match app.match_strength() {
        MatchStrength::Strong => Style::default().fg(Color::Green),
        MatchStrength::Moderate => Style::default().fg(Color::Yellow),
        MatchStrength::Weak => Style::default(),
    };
    lines.push(Line::from(Span::styled(render::match_label(app), match_style)));
    lines.push(Line::from(format!("Status: {}", app.status)));
    if !app.date.is_empty() {
        lines.push(Line::from(format!("Date: {}", app.date)));
    }
    if !app.is_eligible() {
        lines.push(Line::from(Span::styled("Not eligible", Style::default().fg(Color::Red))));
    }
    if !app.tags.is_empty() {
        lines.push(Line::from(format!("Tags: {}", app.tags.join(", "))));
    }
    if let Some((lat, lng)) = app.coordinates() {
        lines.push(Line::from(format!("Coordinates: {:.4}, {:.4}", lat, lng)));
    }
    if !app.href.is_empty() {
        lines.push(Line::from(format!("URL: {}", app.href)));
    }
    lines.push(Line::from(""));

    let (shown, truncated) = truncate_chars(&app.description, render::HOME_LIST_CHARS);
    if state.expanded || !truncated {
        for line in app.description.lines() {
            lines.push(Line::from(line.to_string()));
        }
    } else {
        lines.push(Line::from(vec![
            Span::raw(shown.to_string()),
            Span::styled(" ...more (e)", Style::default().fg(Color::DarkGray)),
        ]));
    }

    Text::from(lines)
}

fn draw_report(frame: &mut Frame, state: &AppState, area: Rect) {
    let title = format!(" Daily Report {} ", state.report_date);
    let block = Block::default().borders(Borders::ALL).title(title);

    let text = if state.report_loading {
        Text::raw("Loading today's report...\nFetching the latest job applications")
    } else if let Some(error) = &state.report_error {
        Text::raw(format!("Unable to load report\n{}\n\nPress R to try again", error))
    } else if state.report_applications.is_empty() {
        Text::raw(format!(
            "No Applications Today\nThere are no job applications recorded for {}.",
            state.report_date
        ))
    } else {
        let width = area.width.saturating_sub(4).max(40) as usize;
        Text::from(
            render::report_lines(&state.report(), width)
                .into_iter()
                .map(Line::from)
                .collect::<Vec<_>>(),
        )
    };

    let widget = Paragraph::new(text)
        .block(block)
        .scroll((state.scroll_offset, 0));
    frame.render_widget(widget, area);
}
