use crate::db::{Amounts, Casino, Database, TransactionView};
use crate::error::{Error, ErrorKind};
use crate::stats::{CasinoPoint, CasinoSeries, CasinoSummary, Overview, OverviewSeries};
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, TableState, Tabs},
    Frame, Terminal,
};
use std::io;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    CasinoStats,
    Casinos,
    Transactions,
    AddCasino,
    AddTransaction,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::Overview,
        Page::CasinoStats,
        Page::Casinos,
        Page::Transactions,
        Page::AddCasino,
        Page::AddTransaction,
    ];

    pub fn index(&self) -> usize {
        Page::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Page::ALL[(self.index() + 1) % Page::ALL.len()]
    }

    pub fn previous(&self) -> Self {
        Page::ALL[(self.index() + Page::ALL.len() - 1) % Page::ALL.len()]
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::CasinoStats => "Casino Stats",
            Page::Casinos => "Casinos",
            Page::Transactions => "Transactions",
            Page::AddCasino => "Add Casino",
            Page::AddTransaction => "Add Transaction",
        }
    }

    /// Pages where printable keys go into a text field.
    pub fn takes_text_input(&self) -> bool {
        matches!(self, Page::CasinoStats | Page::AddCasino | Page::AddTransaction)
    }
}

// ============================================================================
// FORMS
// ============================================================================

#[derive(Debug, Clone)]
pub struct InputField {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Form {
    pub fields: Vec<InputField>,
    pub focus: usize,
}

impl Form {
    pub fn new(labels: &[&'static str]) -> Self {
        Self {
            fields: labels
                .iter()
                .map(|label| InputField {
                    label,
                    value: String::new(),
                })
                .collect(),
            focus: 0,
        }
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.value.trim()).unwrap_or("")
    }

    pub fn push(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.pop();
        }
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    pub fn previous_field(&mut self) {
        self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
    }

    pub fn clear(&mut self) {
        for field in &mut self.fields {
            field.value.clear();
        }
        self.focus = 0;
    }
}

/// Empty means zero; anything else must be a number.
fn parse_amount(label: &str, raw: &str) -> Result<f64, Error> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::InvalidInput(format!("{} must be a number, got '{}'", label, raw)))
}

// ============================================================================
// CHARTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ChartLine {
    pub name: &'static str,
    pub color: Color,
    pub points: Vec<(f64, f64)>,
}

/// Owned chart value. Refreshing builds a new one and drops the old.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub title: String,
    pub lines: Vec<ChartLine>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
}

const DEPOSIT_COLOR: Color = Color::Red;
const REMAINING_COLOR: Color = Color::Blue;
const PAYMENT_COLOR: Color = Color::Green;
const PROFIT_COLOR: Color = Color::Magenta;

impl ChartData {
    pub fn overview(series: &OverviewSeries) -> Option<Self> {
        let first = series.points.first()?;
        let last = series.points.last()?;
        let x = |date: NaiveDate| date.num_days_from_ce() as f64;
        let points = series.points.as_slice();

        let lines = vec![
            chart_line("Total Deposits", DEPOSIT_COLOR, points, |p| (x(p.date), p.deposit)),
            chart_line("Total Remaining", REMAINING_COLOR, points, |p| (x(p.date), p.remaining)),
            chart_line("Total Payments", PAYMENT_COLOR, points, |p| (x(p.date), p.payment)),
            chart_line("Total Profit", PROFIT_COLOR, points, |p| (x(p.date), p.profit)),
        ];

        Some(Self::from_lines(
            "Cumulative Casino Transaction Trends".to_string(),
            lines,
            first.date,
            last.date,
        ))
    }

    pub fn casino(name: &str, series: &CasinoSeries) -> Option<Self> {
        let first = series.points.first()?;
        let last = series.points.last()?;
        let x = |p: &CasinoPoint| p.timestamp.and_utc().timestamp() as f64;
        let points = series.points.as_slice();

        let lines = vec![
            chart_line("Deposit", DEPOSIT_COLOR, points, |p| (x(p), p.deposit)),
            chart_line("Remaining", REMAINING_COLOR, points, |p| (x(p), p.remaining)),
            chart_line("Payment", PAYMENT_COLOR, points, |p| (x(p), p.payment)),
            chart_line("Profit", PROFIT_COLOR, points, |p| (x(p), p.profit)),
        ];

        Some(Self::from_lines(
            format!("Transaction Trends for {}", name),
            lines,
            first.timestamp.date(),
            last.timestamp.date(),
        ))
    }

    fn from_lines(title: String, lines: Vec<ChartLine>, first: NaiveDate, last: NaiveDate) -> Self {
        let x_bounds = padded_bounds(lines.iter().flat_map(|l| l.points.iter().map(|p| p.0)), false);
        let y_bounds = padded_bounds(lines.iter().flat_map(|l| l.points.iter().map(|p| p.1)), true);

        let x_labels = if first == last {
            vec![first.format("%Y-%m-%d").to_string()]
        } else {
            vec![first.format("%Y-%m-%d").to_string(), last.format("%Y-%m-%d").to_string()]
        };
        let mid = (y_bounds[0] + y_bounds[1]) / 2.0;
        let y_labels = vec![
            format!("{:.0}", y_bounds[0]),
            format!("{:.0}", mid),
            format!("{:.0}", y_bounds[1]),
        ];

        Self {
            title,
            lines,
            x_bounds,
            y_bounds,
            x_labels,
            y_labels,
        }
    }
}

fn chart_line<T>(
    name: &'static str,
    color: Color,
    items: &[T],
    point: impl Fn(&T) -> (f64, f64),
) -> ChartLine {
    ChartLine {
        name,
        color,
        points: items.iter().map(point).collect(),
    }
}

fn padded_bounds(values: impl Iterator<Item = f64>, pad: bool) -> [f64; 2] {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if !min.is_finite() || !max.is_finite() {
        return [0.0, 1.0];
    }
    if (max - min).abs() < f64::EPSILON {
        return [min - 1.0, max + 1.0];
    }

    let margin = if pad { (max - min) * 0.05 } else { 0.0 };
    [min - margin, max + margin]
}

// ============================================================================
// APP STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

pub struct App {
    db: Database,
    pub current_page: Page,
    pub casinos: Vec<Casino>,
    pub transactions: Vec<TransactionView>,
    pub overview: Overview,
    pub overview_chart: Option<ChartData>,
    pub stats_form: Form,
    pub stats_name: Option<String>,
    pub stats_summary: Option<CasinoSummary>,
    pub stats_chart: Option<ChartData>,
    pub casino_form: Form,
    pub transaction_form: Form,
    pub casinos_state: TableState,
    pub transactions_state: TableState,
    pub status: Option<Status>,
}

impl App {
    pub fn new(db: Database) -> Self {
        let mut app = Self {
            db,
            current_page: Page::Overview,
            casinos: Vec::new(),
            transactions: Vec::new(),
            overview: Overview::default(),
            overview_chart: None,
            stats_form: Form::new(&["Casino Name"]),
            stats_name: None,
            stats_summary: None,
            stats_chart: None,
            casino_form: Form::new(&["Casino Name", "Casino Link (optional)"]),
            transaction_form: Form::new(&["Casino Name", "Deposit", "Remaining", "Payment"]),
            casinos_state: TableState::default(),
            transactions_state: TableState::default(),
            status: None,
        };
        app.refresh_all();
        app
    }

    fn report(&mut self, err: &Error) {
        match err.kind() {
            ErrorKind::Store | ErrorKind::Config => error!("{}", err),
            _ => info!("{}", err),
        }
        self.status = Some(Status::Error(err.to_string()));
    }

    pub fn refresh_all(&mut self) {
        self.refresh_overview();
        self.refresh_casinos();
        self.refresh_transactions();
    }

    pub fn refresh_overview(&mut self) {
        match self.db.overview() {
            Ok(overview) => {
                // replace, never patch, the previous chart
                self.overview_chart = ChartData::overview(&overview.series);
                self.overview = overview;
            }
            Err(e) => self.report(&e),
        }
    }

    pub fn refresh_casinos(&mut self) {
        match self.db.casinos() {
            Ok(casinos) => {
                self.casinos = casinos;
                reset_selection(&mut self.casinos_state, self.casinos.len());
            }
            Err(e) => self.report(&e),
        }
    }

    pub fn refresh_transactions(&mut self) {
        match self.db.transaction_views() {
            Ok(transactions) => {
                self.transactions = transactions;
                reset_selection(&mut self.transactions_state, self.transactions.len());
            }
            Err(e) => self.report(&e),
        }
    }

    pub fn refresh_current(&mut self) {
        match self.current_page {
            Page::Overview => self.refresh_overview(),
            Page::Casinos => self.refresh_casinos(),
            Page::Transactions => self.refresh_transactions(),
            Page::CasinoStats => self.load_stats(),
            Page::AddCasino | Page::AddTransaction => {}
        }
    }

    pub fn load_stats(&mut self) {
        let name = self.stats_form.value(0).to_string();
        if name.is_empty() {
            self.status = Some(Status::Error("Please enter a valid Casino Name.".to_string()));
            return;
        }

        self.stats_chart = None;
        self.stats_summary = None;
        self.stats_name = Some(name.clone());

        match self.db.casino_stats(&name) {
            Ok(series) => {
                self.stats_chart = ChartData::casino(&name, &series);
                self.stats_summary = Some(series.summary);
                self.status = Some(Status::Info(format!("Loaded {} transactions for {}", series.points.len(), name)));
            }
            Err(e) => self.report(&e),
        }
    }

    pub fn submit_casino(&mut self) {
        let name = self.casino_form.value(0).to_string();
        let link = self.casino_form.value(1).to_string();
        let link = if link.is_empty() { None } else { Some(link.as_str()) };

        match self.db.add_casino(&name, link) {
            Ok(_) => {
                self.status = Some(Status::Info(format!("Added casino {}", name)));
                self.casino_form.clear();
                self.refresh_all();
            }
            Err(e) => self.report(&e),
        }
    }

    pub fn submit_transaction(&mut self) {
        let form = &self.transaction_form;
        let name = form.value(0).to_string();
        let amounts = parse_amount("Deposit", form.value(1)).and_then(|deposit| {
            Ok(Amounts::new(
                deposit,
                parse_amount("Remaining", form.value(2))?,
                parse_amount("Payment", form.value(3))?,
            ))
        });

        let result = amounts.and_then(|amounts| self.db.record_transaction_by_name(&name, amounts));
        match result {
            Ok(_) => {
                self.status = Some(Status::Info(format!("Recorded transaction for {}", name)));
                self.transaction_form.clear();
                self.refresh_all();
            }
            Err(e) => self.report(&e),
        }
    }

    fn active_form(&mut self) -> Option<&mut Form> {
        match self.current_page {
            Page::CasinoStats => Some(&mut self.stats_form),
            Page::AddCasino => Some(&mut self.casino_form),
            Page::AddTransaction => Some(&mut self.transaction_form),
            _ => None,
        }
    }

    fn active_table(&mut self) -> Option<(&mut TableState, usize)> {
        match self.current_page {
            Page::Casinos => Some((&mut self.casinos_state, self.casinos.len())),
            Page::Transactions => Some((&mut self.transactions_state, self.transactions.len())),
            _ => None,
        }
    }

    fn submit(&mut self) {
        match self.current_page {
            Page::CasinoStats => self.load_stats(),
            Page::AddCasino => self.submit_casino(),
            Page::AddTransaction => self.submit_transaction(),
            _ => {}
        }
    }

    /// Apply one key press. Returns true when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            return true;
        }

        match key.code {
            KeyCode::Tab => {
                self.current_page = self.current_page.next();
                return false;
            }
            KeyCode::BackTab => {
                self.current_page = self.current_page.previous();
                return false;
            }
            KeyCode::F(5) => {
                self.refresh_current();
                return false;
            }
            _ => {}
        }

        if self.current_page.takes_text_input() {
            match key.code {
                KeyCode::Enter => self.submit(),
                KeyCode::Char(c) => {
                    if let Some(form) = self.active_form() {
                        form.push(c);
                    }
                }
                KeyCode::Backspace => {
                    if let Some(form) = self.active_form() {
                        form.backspace();
                    }
                }
                KeyCode::Down => {
                    if let Some(form) = self.active_form() {
                        form.next_field();
                    }
                }
                KeyCode::Up => {
                    if let Some(form) = self.active_form() {
                        form.previous_field();
                    }
                }
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('r') => self.refresh_current(),
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some((state, len)) = self.active_table() {
                    step_selection(state, len, 1);
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if let Some((state, len)) = self.active_table() {
                    step_selection(state, len, -1);
                }
            }
            KeyCode::Home => {
                if let Some((state, len)) = self.active_table() {
                    state.select(if len > 0 { Some(0) } else { None });
                }
            }
            KeyCode::End => {
                if let Some((state, len)) = self.active_table() {
                    state.select(len.checked_sub(1));
                }
            }
            _ => {}
        }
        false
    }
}

fn reset_selection(state: &mut TableState, len: usize) {
    match state.selected() {
        Some(i) if i < len => {}
        _ => state.select(if len > 0 { Some(0) } else { None }),
    }
}

fn step_selection(state: &mut TableState, len: usize, delta: isize) {
    if len == 0 {
        return;
    }
    let current = state.selected().unwrap_or(0) as isize;
    let next = (current + delta).rem_euclid(len as isize) as usize;
    state.select(Some(next));
}

// ============================================================================
// TERMINAL LOOP
// ============================================================================

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("UI loop failed: {}", err);
        return Err(err.into());
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Overview => render_overview(f, chunks[1], app),
        Page::CasinoStats => render_stats(f, chunks[1], app),
        Page::Casinos => render_casinos(f, chunks[1], app),
        Page::Transactions => render_transactions(f, chunks[1], app),
        Page::AddCasino => render_form(f, chunks[1], &app.casino_form, " Add Casino "),
        Page::AddTransaction => render_form(f, chunks[1], &app.transaction_form, " Add Transaction "),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = Page::ALL.iter().map(|p| Line::from(p.title().to_string())).collect();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Casino Management System "),
        )
        .select(app.current_page.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )
        .divider(" │ ");

    f.render_widget(tabs, area);
}

fn totals_lines(deposit: f64, remaining: f64, payment: f64, profit: f64) -> Vec<Line<'static>> {
    let profit_color = if profit >= 0.0 { Color::Green } else { Color::Red };
    vec![
        Line::from(vec![
            Span::raw("  Total Deposit:   "),
            Span::styled(format!("${:.2}", deposit), Style::default().fg(DEPOSIT_COLOR)),
        ]),
        Line::from(vec![
            Span::raw("  Total Remaining: "),
            Span::styled(format!("${:.2}", remaining), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("  Total Payment:   "),
            Span::styled(format!("${:.2}", payment), Style::default().fg(PAYMENT_COLOR)),
        ]),
        Line::from(vec![
            Span::raw("  Total Profit:    "),
            Span::styled(
                format!("${:.2}", profit),
                Style::default().fg(profit_color).add_modifier(Modifier::BOLD),
            ),
        ]),
    ]
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    let totals = &app.overview.totals;
    let summary = Paragraph::new(totals_lines(totals.deposit, totals.remaining, totals.payment, totals.profit))
        .block(Block::default().borders(Borders::ALL).title(" Totals "));
    f.render_widget(summary, chunks[0]);

    match &app.overview_chart {
        Some(chart) => render_chart(f, chunks[1], chart),
        None => render_empty(f, chunks[1], "No transactions recorded yet."),
    }
}

fn render_stats(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(7), Constraint::Min(0)])
        .split(area);

    render_input(f, chunks[0], &app.stats_form.fields[0], true);

    let mut lines = vec![Line::from(vec![
        Span::raw("  Casino: "),
        Span::styled(
            app.stats_name.clone().unwrap_or_else(|| "-".to_string()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
    ])];
    let summary = app.stats_summary.unwrap_or(CasinoSummary {
        total_deposit: 0.0,
        total_remaining: 0.0,
        total_payment: 0.0,
        profit: 0.0,
    });
    lines.extend(totals_lines(
        summary.total_deposit,
        summary.total_remaining,
        summary.total_payment,
        summary.profit,
    ));

    let block = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Summary "));
    f.render_widget(block, chunks[1]);

    match &app.stats_chart {
        Some(chart) => render_chart(f, chunks[2], chart),
        None => render_empty(f, chunks[2], "Enter a casino name and press Enter."),
    }
}

fn render_chart(f: &mut Frame, area: Rect, chart: &ChartData) {
    let datasets: Vec<Dataset> = chart
        .lines
        .iter()
        .map(|line| {
            Dataset::default()
                .name(line.name)
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(line.color))
                .data(&line.points)
        })
        .collect();

    let x_labels: Vec<Span> = chart.x_labels.iter().map(|l| Span::raw(l.clone())).collect();
    let y_labels: Vec<Span> = chart.y_labels.iter().map(|l| Span::raw(l.clone())).collect();

    let widget = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", chart.title)),
        )
        .x_axis(
            Axis::default()
                .title("Date")
                .style(Style::default().fg(Color::Gray))
                .bounds(chart.x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Amount ($)")
                .style(Style::default().fg(Color::Gray))
                .bounds(chart.y_bounds)
                .labels(y_labels),
        );

    f.render_widget(widget, area);
}

fn render_empty(f: &mut Frame, area: Rect, text: &str) {
    let block = Paragraph::new(Line::from(Span::styled(
        format!("  {}", text),
        Style::default().fg(Color::DarkGray),
    )))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(block, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_casinos(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(&["ID", "Name", "Link", "Deposit", "Remaining", "Payment", "Profit"]);

    let rows = app.casinos.iter().map(|c| {
        let profit = c.profit();
        let color = if profit >= 0.0 { Color::Green } else { Color::Red };
        Row::new(vec![
            Cell::from(c.id.to_string()),
            Cell::from(truncate(&c.name, 24)),
            Cell::from(truncate(c.link.as_deref().unwrap_or(""), 28)),
            Cell::from(format!("{:.2}", c.deposit)),
            Cell::from(format!("{:.2}", c.remaining)),
            Cell::from(format!("{:.2}", c.payment)),
            Cell::from(format!("{:.2}", profit)).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(26),
            Constraint::Length(30),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Casinos "))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.casinos_state);
}

fn render_transactions(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(&["ID", "Casino", "Deposit", "Remaining", "Payment", "Date"]);

    let rows = app.transactions.iter().map(|t| {
        Row::new(vec![
            Cell::from(t.id.to_string()),
            Cell::from(truncate(&t.casino, 24)),
            Cell::from(format!("{:.2}", t.deposit)).style(Style::default().fg(DEPOSIT_COLOR)),
            Cell::from(format!("{:.2}", t.remaining)),
            Cell::from(format!("{:.2}", t.payment)).style(Style::default().fg(PAYMENT_COLOR)),
            Cell::from(t.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(26),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(20),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Transactions "))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.transactions_state);
}

fn render_input(f: &mut Frame, area: Rect, field: &InputField, focused: bool) {
    let border = if focused { Color::Yellow } else { Color::White };
    let cursor = if focused { "▏" } else { "" };
    let input = Paragraph::new(format!("{}{}", field.value, cursor)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(format!(" {} ", field.label)),
    );
    f.render_widget(input, area);
}

fn render_form(f: &mut Frame, area: Rect, form: &Form, title: &str) {
    let outer = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let mut constraints: Vec<Constraint> = form.fields.iter().map(|_| Constraint::Length(3)).collect();
    constraints.push(Constraint::Min(0));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (i, field) in form.fields.iter().enumerate() {
        render_input(f, chunks[i], field, i == form.focus);
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = Vec::new();

    match &app.status {
        Some(Status::Info(text)) => {
            status_spans.push(Span::styled(format!(" {} ", text), Style::default().fg(Color::Green)));
            status_spans.push(Span::raw("|"));
        }
        Some(Status::Error(text)) => {
            status_spans.push(Span::styled(format!(" Error: {} ", text), Style::default().fg(Color::Red)));
            status_spans.push(Span::raw("|"));
        }
        None => {}
    }

    status_spans.push(Span::raw(" "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    if app.current_page.takes_text_input() {
        status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Field | "));
        status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Submit | "));
    } else {
        status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Nav | "));
        status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Refresh | "));
    }
    status_spans.push(Span::styled("Esc", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StatRow;
    use crate::stats::{casino_series, overview_series};
    use crate::test_utils::{at, TempDb};
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn test_app(temp: &TempDb) -> App {
        let db = Database::new(temp.path());
        db.init().unwrap();
        App::new(db)
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Overview.next(), Page::CasinoStats);
        assert_eq!(Page::AddTransaction.next(), Page::Overview);
        assert_eq!(Page::Overview.previous(), Page::AddTransaction);
        assert_eq!(Page::Casinos.index(), 2);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("Deposit", "").unwrap(), 0.0);
        assert_eq!(parse_amount("Deposit", "12.5").unwrap(), 12.5);
        assert!(matches!(parse_amount("Deposit", "ten"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_overview_chart_lines_and_bounds() {
        let series = overview_series(&[], &[]);
        assert!(ChartData::overview(&series).is_none());

        let transactions = vec![
            crate::db::Transaction { id: 1, casino_id: 1, deposit: 100.0, remaining: 50.0, payment: 0.0, created_at: at(2024, 1, 1, 10, 0) },
            crate::db::Transaction { id: 2, casino_id: 1, deposit: 0.0, remaining: 0.0, payment: 200.0, created_at: at(2024, 1, 3, 10, 0) },
        ];
        let series = overview_series(&transactions, &[]);
        let chart = ChartData::overview(&series).unwrap();

        assert_eq!(chart.lines.len(), 4);
        assert_eq!(chart.lines[0].points.len(), 2);
        assert_eq!(chart.x_labels, vec!["2024-01-01".to_string(), "2024-01-03".to_string()]);
        assert_eq!(chart.x_bounds[1] - chart.x_bounds[0], 2.0);
        assert!(chart.y_bounds[0] <= -50.0);
        assert!(chart.y_bounds[1] >= 200.0);
    }

    #[test]
    fn test_single_point_chart_has_nonzero_range() {
        let rows = vec![StatRow { created_at: at(2024, 1, 1, 10, 0), deposit: 5.0, remaining: 5.0, payment: 5.0 }];
        let series = casino_series(&rows).unwrap();
        let chart = ChartData::casino("Royal", &series).unwrap();

        assert!(chart.x_bounds[1] > chart.x_bounds[0]);
        assert!(chart.y_bounds[1] > chart.y_bounds[0]);
        assert_eq!(chart.title, "Transaction Trends for Royal");
    }

    #[test]
    fn test_add_casino_and_transaction_through_keys() {
        let temp = TempDb::new("ui-forms");
        let mut app = test_app(&temp);

        app.current_page = Page::AddCasino;
        type_text(&mut app, "Royal");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.casinos.len(), 1);
        assert!(matches!(app.status, Some(Status::Info(_))));

        app.current_page = Page::AddTransaction;
        type_text(&mut app, "Royal");
        app.handle_key(key(KeyCode::Down));
        type_text(&mut app, "100");
        app.handle_key(key(KeyCode::Down));
        type_text(&mut app, "30");
        app.handle_key(key(KeyCode::Down));
        type_text(&mut app, "40");
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.transactions.len(), 1);
        assert_eq!(app.casinos[0].deposit, 100.0);
        assert_eq!(app.overview.totals.profit, 40.0 + 30.0 - 100.0);
        assert!(app.overview_chart.is_some());
        assert_eq!(app.transaction_form.value(0), "");
    }

    #[test]
    fn test_unknown_casino_and_bad_amount_show_errors() {
        let temp = TempDb::new("ui-errors");
        let mut app = test_app(&temp);

        app.current_page = Page::AddTransaction;
        type_text(&mut app, "Ghost");
        app.handle_key(key(KeyCode::Enter));
        assert!(matches!(app.status, Some(Status::Error(ref m)) if m.contains("Ghost")));

        app.handle_key(key(KeyCode::Down));
        type_text(&mut app, "lots");
        app.handle_key(key(KeyCode::Enter));
        assert!(matches!(app.status, Some(Status::Error(ref m)) if m.contains("Deposit")));
        assert!(app.transactions.is_empty());
    }

    #[test]
    fn test_stats_for_casino_without_transactions_is_message() {
        let temp = TempDb::new("ui-stats");
        let mut app = test_app(&temp);
        Database::new(temp.path()).add_casino("Empty", None).unwrap();

        app.current_page = Page::CasinoStats;
        type_text(&mut app, "Empty");
        app.handle_key(key(KeyCode::Enter));

        assert!(app.stats_chart.is_none());
        assert!(matches!(app.status, Some(Status::Error(ref m)) if m.contains("No transactions")));
    }

    #[test]
    fn test_quit_keys_depend_on_page() {
        let temp = TempDb::new("ui-quit");
        let mut app = test_app(&temp);

        app.current_page = Page::AddCasino;
        assert!(!app.handle_key(key(KeyCode::Char('q'))));
        assert_eq!(app.casino_form.value(0), "q");

        app.current_page = Page::Overview;
        assert!(app.handle_key(key(KeyCode::Char('q'))));
        assert!(app.handle_key(key(KeyCode::Esc)));
        assert!(app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn test_every_page_renders() {
        let temp = TempDb::new("ui-render");
        let db = Database::new(temp.path());
        db.init().unwrap();
        let id = db.add_casino("Royal", Some("https://royal.example")).unwrap();
        db.record_transaction(id, Amounts::new(10.0, 5.0, 0.0)).unwrap();

        let mut app = App::new(db);
        app.stats_form.fields[0].value = "Royal".to_string();
        app.load_stats();
        assert!(app.stats_chart.is_some());

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        for page in Page::ALL {
            app.current_page = page;
            terminal.draw(|f| ui(f, &mut app)).unwrap();
        }
    }
}
