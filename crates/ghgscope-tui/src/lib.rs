// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ghgscope_app::{
    AppCommand, AppEvent, AppState, ChartCommand, Credentials, EditCommand, EditPhase,
    EditableField, ExplorerCommand, Facet, Metric, NavigationParams, ReferenceHints, Role,
    SortColumn, ServiceRequest, ServiceResponse, TABLE_HEADERS, display_number,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const SORTABLE_FIRST_COLUMN: usize = 4;

/// Executes service requests for the UI loop.
///
/// Implementations either answer inline or hand the request to a worker; in both cases the
/// response arrives on the channel as [`InternalEvent::Response`].
pub trait AppRuntime {
    fn execute(&mut self, request: ServiceRequest) -> ServiceResponse;

    fn submit(&mut self, request: ServiceRequest, tx: &Sender<InternalEvent>) -> Result<()> {
        let response = self.execute(request);
        tx.send(InternalEvent::Response(response))
            .map_err(|_| anyhow!("response channel closed"))
    }

    /// Destination for the next download.
    fn download_path(&mut self) -> PathBuf;
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Response(ServiceResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Search,
    GoToPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InputState {
    kind: InputKind,
    buffer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LoginFocus {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct LoginForm {
    username: String,
    password: String,
    focus: LoginFocus,
}

impl LoginForm {
    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginFocus::Username => &mut self.username,
            LoginFocus::Password => &mut self.password,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ChartPanel {
    visible: bool,
    cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    selected_row: usize,
    input: Option<InputState>,
    login: Option<LoginForm>,
    edit_field: usize,
    chart: ChartPanel,
    help_visible: bool,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    restore: Option<&NavigationParams>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let events = state.start(restore);
    process_app_events(state, runtime, &mut view_data, &internal_tx, events);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Response(response) => {
                let events = state.handle_response(response);
                process_app_events(state, runtime, view_data, tx, events);
            }
        }
    }
}

fn process_app_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    events: Vec<AppEvent>,
) {
    for event in events {
        match event {
            AppEvent::Request(request) => {
                let name = request.name();
                debug!(request = name, "submitting request");
                if let Err(error) = runtime.submit(request, tx) {
                    warn!(request = name, error = %error, "request not submitted");
                    state.status_line = Some(format!("{name} failed: {error}"));
                    bump_status(view_data, tx);
                }
            }
            AppEvent::StatusUpdated(_) => bump_status(view_data, tx),
            AppEvent::StatusCleared | AppEvent::Repaint => {}
        }
    }
    clamp_selection(state, view_data);
}

fn bump_status(view_data: &mut ViewData, tx: &Sender<InternalEvent>) {
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(tx, view_data.status_token);
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn clamp_selection(state: &AppState, view_data: &mut ViewData) {
    let rows = state.explorer.rows().rows().len();
    view_data.selected_row = view_data.selected_row.min(rows.saturating_sub(1));
    let entries = state.chart.available().len();
    view_data.chart.cursor = view_data.chart.cursor.min(entries.saturating_sub(1));
}

fn apply<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    process_app_events(state, runtime, view_data, tx, events);
}

/// Returns true when the app should exit.
fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }
    if view_data.login.is_some() {
        handle_login_key(state, runtime, view_data, tx, key);
        return false;
    }
    if state.admin.phase().is_open() {
        handle_edit_key(state, runtime, view_data, tx, key);
        return false;
    }
    if view_data.input.is_some() {
        handle_input_key(state, runtime, view_data, tx, key);
        return false;
    }
    if view_data.chart.visible && handle_chart_key(state, runtime, view_data, tx, key) {
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('/') => {
            view_data.input = Some(InputState {
                kind: InputKind::Search,
                buffer: state.explorer.search().raw().to_owned(),
            });
        }
        KeyCode::Char('g') => {
            view_data.input = Some(InputState {
                kind: InputKind::GoToPage,
                buffer: String::new(),
            });
        }
        KeyCode::Char(ch @ ('s' | 'S' | 'r' | 'R' | 'n' | 'N')) => {
            let facet = match ch.to_ascii_lowercase() {
                's' => Facet::Sector,
                'r' => Facet::Region,
                _ => Facet::Country,
            };
            let next = state.explorer.filters().cycled(facet, ch.is_ascii_lowercase());
            let command = match facet {
                Facet::Sector => ExplorerCommand::SetSector(next),
                Facet::Region => ExplorerCommand::SetRegion(next),
                Facet::Country => ExplorerCommand::SetCountry(next),
            };
            apply(state, runtime, view_data, tx, AppCommand::Explorer(command));
        }
        KeyCode::Char(ch @ ('1' | '2' | '3')) => {
            let index = usize::from(ch as u8 - b'1');
            apply(
                state,
                runtime,
                view_data,
                tx,
                AppCommand::Explorer(ExplorerCommand::ClickSort(SortColumn::ALL[index])),
            );
        }
        KeyCode::Left | KeyCode::Char('h') => apply(
            state,
            runtime,
            view_data,
            tx,
            AppCommand::Explorer(ExplorerCommand::PrevPage),
        ),
        KeyCode::Right | KeyCode::Char('l') => apply(
            state,
            runtime,
            view_data,
            tx,
            AppCommand::Explorer(ExplorerCommand::NextPage),
        ),
        KeyCode::Down | KeyCode::Char('j') => {
            view_data.selected_row = view_data.selected_row.saturating_add(1);
            clamp_selection(state, view_data);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            view_data.selected_row = view_data.selected_row.saturating_sub(1);
        }
        KeyCode::Char('x') => apply(
            state,
            runtime,
            view_data,
            tx,
            AppCommand::Explorer(ExplorerCommand::ClearAll),
        ),
        KeyCode::Char('d') => {
            let dest = runtime.download_path();
            apply(state, runtime, view_data, tx, AppCommand::Download(dest));
        }
        KeyCode::Char('c') => view_data.chart.visible = true,
        KeyCode::Char('L') => {
            if state.admin.role() == Role::Admin {
                apply(
                    state,
                    runtime,
                    view_data,
                    tx,
                    AppCommand::Edit(EditCommand::Logout),
                );
            } else {
                view_data.login = Some(LoginForm::default());
            }
        }
        KeyCode::Char('e') | KeyCode::Enter => {
            view_data.edit_field = 0;
            let row = view_data.selected_row;
            apply(state, runtime, view_data, tx, AppCommand::EditRow(row));
        }
        _ => {}
    }
    false
}

fn handle_input_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(input) = view_data.input.as_mut() else {
        return;
    };
    let kind = input.kind;
    match key.code {
        KeyCode::Esc => {
            view_data.input = None;
            return;
        }
        KeyCode::Enter => {
            let buffer = input.buffer.clone();
            view_data.input = None;
            if kind == InputKind::GoToPage {
                match buffer.trim().parse::<i64>() {
                    Ok(page) => apply(
                        state,
                        runtime,
                        view_data,
                        tx,
                        AppCommand::Explorer(ExplorerCommand::CommitPage(page)),
                    ),
                    Err(_) => {
                        state.status_line = Some(format!("`{buffer}` is not a page number"));
                        bump_status(view_data, tx);
                    }
                }
            }
            return;
        }
        KeyCode::Backspace => {
            input.buffer.pop();
        }
        KeyCode::Char(ch) => {
            if kind == InputKind::GoToPage && !(ch.is_ascii_digit() || ch == '-') {
                return;
            }
            input.buffer.push(ch);
        }
        _ => return,
    }

    if kind == InputKind::Search {
        let raw = input.buffer.clone();
        apply(
            state,
            runtime,
            view_data,
            tx,
            AppCommand::Explorer(ExplorerCommand::Search(raw)),
        );
    }
}

fn handle_login_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.login.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => view_data.login = None,
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            form.focus = match form.focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Username,
            };
        }
        KeyCode::Backspace => {
            form.focused_mut().pop();
        }
        KeyCode::Char(ch) => form.focused_mut().push(ch),
        KeyCode::Enter => {
            let credentials = Credentials {
                username: form.username.trim().to_owned(),
                password: form.password.clone(),
            };
            view_data.login = None;
            apply(
                state,
                runtime,
                view_data,
                tx,
                AppCommand::Edit(EditCommand::Login(credentials)),
            );
        }
        _ => {}
    }
}

fn handle_edit_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let field = EditableField::ALL[view_data.edit_field % EditableField::ALL.len()];
    let command = match key.code {
        KeyCode::Esc => EditCommand::Cancel,
        KeyCode::Enter => EditCommand::Save,
        KeyCode::Down | KeyCode::Tab => {
            view_data.edit_field = (view_data.edit_field + 1) % EditableField::ALL.len();
            return;
        }
        KeyCode::Up | KeyCode::BackTab => {
            view_data.edit_field =
                (view_data.edit_field + EditableField::ALL.len() - 1) % EditableField::ALL.len();
            return;
        }
        KeyCode::Backspace | KeyCode::Char(_) => {
            let Some(session) = state.admin.session() else {
                return;
            };
            let mut value = session.value(field).to_owned();
            match key.code {
                KeyCode::Char(ch) => value.push(ch),
                _ => {
                    value.pop();
                }
            }
            EditCommand::SetField(field, value)
        }
        _ => return,
    };
    apply(state, runtime, view_data, tx, AppCommand::Edit(command));
}

/// Returns true when the chart panel consumed the key.
fn handle_chart_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let command = match key.code {
        KeyCode::Esc | KeyCode::Char('c') => {
            view_data.chart.visible = false;
            return true;
        }
        KeyCode::Down | KeyCode::Char('j') => {
            view_data.chart.cursor = view_data.chart.cursor.saturating_add(1);
            clamp_selection(state, view_data);
            return true;
        }
        KeyCode::Up | KeyCode::Char('k') => {
            view_data.chart.cursor = view_data.chart.cursor.saturating_sub(1);
            return true;
        }
        KeyCode::Tab => {
            view_data.chart.cursor = 0;
            ChartCommand::SetDimension(state.chart.dimension().next())
        }
        KeyCode::Char(' ') => {
            let Some(entry) = state.chart.available().get(view_data.chart.cursor) else {
                return true;
            };
            ChartCommand::ToggleEntity(entry.clone())
        }
        KeyCode::Char(ch @ '1'..='4') => {
            ChartCommand::ToggleMetric(Metric::ALL[usize::from(ch as u8 - b'1')])
        }
        KeyCode::Char('x') => ChartCommand::Clear,
        _ => return false,
    };
    apply(state, runtime, view_data, tx, AppCommand::Chart(command));
    true
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let filters = Paragraph::new(filter_bar_text(state, view_data))
        .block(Block::default().title("ghgscope").borders(Borders::ALL));
    frame.render_widget(filters, layout[0]);

    if view_data.chart.visible {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(layout[1]);
        let picker = Paragraph::new(chart_picker_text(state, view_data)).block(
            Block::default()
                .title(format!("chart by {}", state.chart.dimension().param()))
                .borders(Borders::ALL),
        );
        frame.render_widget(picker, columns[0]);
        render_chart(frame, columns[1], state);
    } else {
        render_table(frame, layout[1], state, view_data);
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if let Some(form) = &view_data.login {
        let area = centered_rect(40, 30, frame.area());
        frame.render_widget(Clear, area);
        let login = Paragraph::new(login_overlay_text(form))
            .block(Block::default().title("login").borders(Borders::ALL));
        frame.render_widget(login, area);
    }

    if state.admin.phase().is_open() {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let title = state
            .admin
            .session()
            .map(|session| format!("edit {}", session.target.company_name))
            .unwrap_or_else(|| "edit".to_owned());
        let editor = Paragraph::new(edit_overlay_text(state, view_data))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(editor, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, view_data: &ViewData) {
    let header = Row::new(TABLE_HEADERS.iter().enumerate().map(|(index, label)| {
        Cell::from(header_label(state, index, label)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = state
        .explorer
        .rows()
        .display_rows()
        .into_iter()
        .enumerate()
        .map(|(index, cells)| {
            let style = if index == view_data.selected_row {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default()
            };
            Row::new(cells.into_iter().map(Cell::from)).style(style)
        })
        .collect::<Vec<_>>();

    let widths = [
        Constraint::Min(24),
        Constraint::Min(14),
        Constraint::Min(12),
        Constraint::Min(14),
        Constraint::Min(10),
        Constraint::Min(16),
        Constraint::Min(14),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(state))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn header_label(state: &AppState, index: usize, label: &str) -> String {
    let Some(column) = index
        .checked_sub(SORTABLE_FIRST_COLUMN)
        .and_then(|offset| SortColumn::ALL.get(offset))
    else {
        return label.to_owned();
    };
    match state.explorer.sort().direction_of(*column) {
        Some(direction) => format!("{label} {}", direction.marker()),
        None => label.to_owned(),
    }
}

fn table_title(state: &AppState) -> String {
    let pages = state.explorer.pages();
    let loading = if state.explorer.rows().in_flight() {
        " | loading"
    } else {
        ""
    };
    format!(
        "emissions | {} rows | page {}/{}{loading}",
        pages.total_items(),
        pages.index(),
        pages.total_pages().max(1)
    )
}

fn filter_bar_text(state: &AppState, view_data: &ViewData) -> String {
    let filters = state.explorer.filters();
    let search = match &view_data.input {
        Some(InputState {
            kind: InputKind::Search,
            buffer,
        }) => format!("/{buffer}_"),
        _ => state.explorer.search().raw().to_owned(),
    };
    let mut text = format!(
        "sector: {} | region: {} | country: {} | search: {search}",
        filters.sector(),
        filters.region(),
        filters.country()
    );
    if let Some(InputState {
        kind: InputKind::GoToPage,
        buffer,
    }) = &view_data.input
    {
        text.push_str(&format!(" | go to page: {buffer}_"));
    }
    text
}

fn chart_picker_text(state: &AppState, view_data: &ViewData) -> String {
    let chart = &state.chart;
    let mut lines = Vec::new();
    for (index, metric) in Metric::ALL.iter().enumerate() {
        let mark = if chart.metrics().is_selected(*metric) {
            "[x]"
        } else if chart.metrics().is_enabled(*metric) {
            "[ ]"
        } else {
            " - "
        };
        lines.push(format!("{} {mark} {}", index + 1, metric.label()));
    }
    lines.push(String::new());
    for (index, entry) in chart.available().iter().enumerate() {
        let cursor = if index == view_data.chart.cursor {
            ">"
        } else {
            " "
        };
        let mark = if chart.entities().contains(entry) {
            "[x]"
        } else {
            "[ ]"
        };
        lines.push(format!("{cursor}{mark} {entry}"));
    }
    lines.join("\n")
}

fn render_chart(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    let block = Block::default().title("emissions").borders(Borders::ALL);
    let points = state.chart.points();
    if points.is_empty() {
        let hint = Paragraph::new("pick entries with space and metrics with 1-4").block(block);
        frame.render_widget(hint, area);
        return;
    }

    let metrics = state.chart.metrics().metrics();
    let mut chart = BarChart::default()
        .block(block)
        .bar_width(6)
        .bar_gap(1)
        .group_gap(3);
    for point in points {
        let bars = metrics
            .iter()
            .map(|metric| {
                let value = point.value(*metric);
                Bar::default()
                    .value(value.map(|v| v.max(0.0).round() as u64).unwrap_or_default())
                    .text_value(display_number(value))
                    .label(Line::from(metric.key()))
            })
            .collect::<Vec<_>>();
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(point.label.clone()))
                .bars(&bars),
        );
    }
    frame.render_widget(chart, area);
}

fn login_overlay_text(form: &LoginForm) -> String {
    let (user_mark, pass_mark) = match form.focus {
        LoginFocus::Username => (">", " "),
        LoginFocus::Password => (" ", ">"),
    };
    format!(
        "{user_mark} username: {}\n{pass_mark} password: {}\n\nenter submit | tab switch | esc cancel",
        form.username,
        "*".repeat(form.password.chars().count())
    )
}

fn edit_overlay_text(state: &AppState, view_data: &ViewData) -> String {
    let Some(session) = state.admin.session() else {
        return String::new();
    };
    let mut lines = Vec::new();
    for (index, field) in EditableField::ALL.iter().enumerate() {
        let cursor = if index == view_data.edit_field { ">" } else { " " };
        let hint = match &session.reference {
            ReferenceHints::Loaded(Some(reference)) => format!("  (reference: {})", reference.hint(*field)),
            _ => String::new(),
        };
        lines.push(format!(
            "{cursor} {:<18} {}{hint}",
            field.label(),
            session.value(*field)
        ));
    }
    lines.push(String::new());
    lines.push(match &session.reference {
        ReferenceHints::Loading => "reference data loading".to_owned(),
        ReferenceHints::Loaded(None) => "no reference data for this record".to_owned(),
        ReferenceHints::Loaded(Some(_)) => String::new(),
        ReferenceHints::Unavailable(reason) => format!("reference data unavailable: {reason}"),
    });
    if let Some(error) = &session.error {
        lines.push(format!("error: {error}"));
    }
    let phase = match state.admin.phase() {
        EditPhase::Saving => "saving",
        _ => "enter save | esc cancel | up/down field",
    };
    lines.push(phase.to_owned());
    lines.join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let role = match (state.admin.role(), state.admin.username()) {
        (Role::Admin, Some(user)) => format!("ADMIN {user}"),
        (Role::Admin, None) => "ADMIN".to_owned(),
        (Role::Analyst, _) => "ANALYST".to_owned(),
    };
    let hints = if view_data.chart.visible {
        "tab dimension | space pick | 1-4 metric | x clear | esc close"
    } else {
        "/ search | s/r/n filter | 1-3 sort | ←/→ page | g go | x clear | d download | c chart | L login | e edit | ? help | q quit"
    };
    match &state.status_line {
        Some(status) => format!("{role} | {status} | {hints}"),
        None => format!("{role} | {hints}"),
    }
}

fn help_overlay_text() -> &'static str {
    "/        search company or ISIN\n\
     s S      next/previous sector\n\
     r R      next/previous region\n\
     n N      next/previous country\n\
     1 2 3    sort by scope 1, scope 2 location, scope 2 market\n\
     ← →      previous/next page\n\
     g        go to page\n\
     x        clear filters, search, sort and page\n\
     d        download the current view as CSV\n\
     c        chart panel\n\
     L        log in or out\n\
     e        edit the selected row (admin)\n\
     q        quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, ViewData, handle_key_event, process_app_events,
        process_internal_events, render, status_text,
    };
    use ghgscope_app::{
        AggregateQuery, AllRows, AppState, ChartDimension, ChartPoint, Credentials, DataService,
        FilterOptions, LoginOutcome, Metric, MetricValue, QueryDescriptor, RecordId,
        ReferenceRecord, RegionCountryMap, Role, RowPage, RowRecord, ServiceError,
        ServiceRequest, ServiceResponse, ServiceResult, WriteOutcome, execute,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::{self, Receiver, Sender};

    const TOTAL_ROWS: u64 = 23;

    struct FixtureService;

    fn row(id: i64) -> RowRecord {
        RowRecord {
            id: RecordId::new(id),
            company_name: format!("Company {id}"),
            isin: Some(format!("US{id:010}")),
            ticker: None,
            weight: None,
            sector: Some("Energy".to_owned()),
            region: Some("Europe".to_owned()),
            country: Some("France".to_owned()),
            scope1_direct: Some(id as f64),
            scope2_location: None,
            scope2_market: Some(1.5),
        }
    }

    impl DataService for FixtureService {
        fn filter_options(&self) -> ServiceResult<FilterOptions> {
            Ok(FilterOptions {
                sectors: vec!["Energy".to_owned(), "Utilities".to_owned()],
                regions: vec!["Europe".to_owned()],
                countries: vec!["France".to_owned()],
            })
        }

        fn region_country_map(&self) -> ServiceResult<BTreeMap<String, Vec<String>>> {
            Ok(BTreeMap::from([(
                "Europe".to_owned(),
                vec!["France".to_owned()],
            )]))
        }

        fn rows(&self, _query: &QueryDescriptor, page: u32, page_size: u32) -> ServiceResult<RowPage> {
            let start = i64::from((page.max(1) - 1) * page_size) + 1;
            let end = (start + i64::from(page_size)).min(TOTAL_ROWS as i64 + 1);
            Ok(RowPage {
                rows: (start..end).map(row).collect(),
                total_items: TOTAL_ROWS,
            })
        }

        fn all_rows(&self) -> ServiceResult<AllRows> {
            Ok(AllRows::default())
        }

        fn chart_items(&self, _dimension: ChartDimension) -> ServiceResult<Vec<String>> {
            Ok(vec!["Company 1".to_owned(), "Company 2".to_owned()])
        }

        fn chart_data(&self, query: &AggregateQuery) -> ServiceResult<Vec<ChartPoint>> {
            Ok(query
                .entities
                .iter()
                .map(|label| ChartPoint {
                    label: label.clone(),
                    values: query
                        .metrics
                        .iter()
                        .map(|metric| MetricValue {
                            metric: *metric,
                            value: Some(10.0),
                        })
                        .collect(),
                })
                .collect())
        }

        fn reference_data(&self, _id: RecordId) -> ServiceResult<Option<ReferenceRecord>> {
            Ok(None)
        }

        fn login(&self, credentials: &Credentials) -> ServiceResult<LoginOutcome> {
            if credentials.username == "admin" && credentials.password == "admin" {
                Ok(LoginOutcome { success: true })
            } else {
                Err(ServiceError::Auth("invalid username or password".to_owned()))
            }
        }

        fn update_row(&self, _record: &RowRecord) -> ServiceResult<WriteOutcome> {
            Ok(WriteOutcome::accepted())
        }

        fn download(&self, _query: &QueryDescriptor, _dest: &Path) -> ServiceResult<u64> {
            Ok(TOTAL_ROWS)
        }
    }

    #[derive(Default)]
    struct TestRuntime {
        submitted: Vec<&'static str>,
    }

    impl AppRuntime for TestRuntime {
        fn execute(&mut self, request: ServiceRequest) -> ServiceResponse {
            self.submitted.push(request.name());
            execute(&FixtureService, request)
        }

        fn download_path(&mut self) -> PathBuf {
            PathBuf::from("/tmp/ghgscope-test.csv")
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn started() -> Self {
            let (tx, rx) = mpsc::channel();
            let mut harness = Self {
                state: AppState::load(&FixtureService),
                runtime: TestRuntime::default(),
                view_data: ViewData::default(),
                tx,
                rx,
            };
            let events = harness.state.start(None);
            process_app_events(
                &mut harness.state,
                &mut harness.runtime,
                &mut harness.view_data,
                &harness.tx,
                events,
            );
            harness.settle();
            harness
        }

        fn settle(&mut self) {
            process_internal_events(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn press(&mut self, code: KeyCode) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, KeyModifiers::NONE),
            );
            self.settle();
            quit
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }
    }

    #[test]
    fn startup_loads_first_page_and_chart_entries() {
        let harness = Harness::started();
        assert_eq!(harness.state.explorer.rows().rows().len(), 10);
        assert_eq!(harness.state.explorer.pages().total_pages(), 3);
        assert_eq!(harness.state.chart.available().len(), 2);
        assert_eq!(harness.runtime.submitted, ["rows", "chart_items"]);
    }

    #[test]
    fn sector_key_cycles_and_refetches() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('s'));
        assert_eq!(harness.state.explorer.filters().sector().as_str(), "Energy");
        assert_eq!(harness.runtime.submitted.last(), Some(&"rows"));
        assert_eq!(
            harness.state.explorer.navigation().current(),
            Some("?page=1&sector=Energy&region=all&country=all")
        );
    }

    #[test]
    fn go_to_page_clamps_to_last_page() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('g'));
        harness.type_text("5x");
        harness.press(KeyCode::Enter);
        assert_eq!(harness.state.explorer.pages().index(), 3);
        assert_eq!(harness.state.explorer.rows().rows().len(), 3);
    }

    #[test]
    fn typing_q_in_search_does_not_quit() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('/'));
        assert!(!harness.press(KeyCode::Char('q')));
        assert_eq!(harness.state.explorer.search().raw(), "q");
        harness.press(KeyCode::Esc);
        assert!(harness.press(KeyCode::Char('q')));
    }

    #[test]
    fn editing_requires_login() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('e'));
        assert!(!harness.state.admin.phase().is_open());
        assert!(
            harness
                .state
                .status_line
                .as_deref()
                .unwrap_or_default()
                .contains("admin")
        );

        harness.press(KeyCode::Char('L'));
        harness.type_text("admin");
        harness.press(KeyCode::Tab);
        harness.type_text("admin");
        harness.press(KeyCode::Enter);
        assert_eq!(harness.state.admin.role(), Role::Admin);

        harness.press(KeyCode::Down);
        harness.press(KeyCode::Char('e'));
        assert!(harness.state.admin.phase().is_open());
        let target = harness
            .state
            .admin
            .session()
            .map(|session| session.target.id);
        assert_eq!(target, Some(RecordId::new(2)));

        harness.press(KeyCode::Enter);
        assert!(!harness.state.admin.phase().is_open());
        assert_eq!(harness.state.status_line.as_deref(), Some("record 2 saved"));
    }

    #[test]
    fn chart_panel_toggles_entries_and_metrics() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('c'));
        harness.press(KeyCode::Char(' '));
        harness.press(KeyCode::Char('1'));
        assert_eq!(harness.state.chart.points().len(), 1);
        assert_eq!(
            harness.state.chart.points()[0].value(Metric::Scope1Direct),
            Some(10.0)
        );
        // sort keys are routed to the chart while it is open
        assert_eq!(harness.state.explorer.sort().active(), None);

        harness.press(KeyCode::Esc);
        assert!(!harness.view_data.chart.visible);
    }

    #[test]
    fn download_reports_written_rows() {
        let mut harness = Harness::started();
        harness.press(KeyCode::Char('d'));
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("downloaded 23 rows to /tmp/ghgscope-test.csv")
        );
    }

    #[test]
    fn render_draws_table_and_status() -> anyhow::Result<()> {
        let harness = Harness::started();
        let mut terminal = Terminal::new(TestBackend::new(140, 30))?;
        terminal.draw(|frame| render(frame, &harness.state, &harness.view_data))?;
        let buffer = terminal.backend().buffer().clone();
        let text: String = buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Company 1"));
        assert!(text.contains("page 1/3"));
        assert!(status_text(&harness.state, &harness.view_data).starts_with("ANALYST"));
        Ok(())
    }
}
