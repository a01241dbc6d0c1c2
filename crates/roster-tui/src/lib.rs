// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use roster_app::{
    AppCommand, AppEvent, AppMode, AppState, FetchTicket, FieldKind, FieldSpec, FieldValue,
    FormMode, Platform, PlatformKey, User, UserForm, UserListSource, UserPayload, platform_fields,
    style_for,
};
use std::collections::BTreeMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{error, warn};

const PASSWORD_MASK: char = '*';

pub trait AppRuntime {
    fn list_users(&mut self) -> Result<Vec<User>>;
    fn create_user(&mut self, payload: &UserPayload) -> Result<()>;
    fn update_user(&mut self, username: &str, payload: &UserPayload) -> Result<()>;
    fn delete_user(&mut self, username: &str) -> Result<()>;
    /// Loads the list and reports it on `tx`. Runtimes backed by the network
    /// override this to load off the UI thread.
    fn spawn_list_users(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.list_users().map_err(|error| format!("{error:#}"));
        tx.send(InternalEvent::UsersLoaded { ticket, result })
            .map_err(|_| anyhow!("user list channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    pub confirm_delete: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            confirm_delete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    UsersLoaded {
        ticket: FetchTicket,
        result: Result<Vec<User>, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormRow {
    Username,
    Email,
    Password,
    Toggle(PlatformKey),
    Field(PlatformKey, FieldSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormUiState {
    form: UserForm,
    cursor: usize,
    // Raw text of list fields while typing; the stored list drops the
    // separators a user is still in the middle of entering.
    list_buffers: BTreeMap<(PlatformKey, &'static str), String>,
}

impl FormUiState {
    fn new(form: UserForm) -> Self {
        Self {
            form,
            cursor: 0,
            list_buffers: BTreeMap::new(),
        }
    }

    fn rows(&self) -> Vec<FormRow> {
        form_rows(&self.form)
    }

    fn clamp_cursor(&mut self) {
        let max = self.rows().len().saturating_sub(1);
        self.cursor = self.cursor.min(max);
    }
}

#[derive(Debug, Default)]
struct ViewData {
    users: UserListSource,
    selected_row: usize,
    search_editing: bool,
    form: Option<FormUiState>,
    alert: Option<String>,
    help_visible: bool,
    status_token: u64,
    options: UiOptions,
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: UiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData {
        options,
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();
    start_list_fetch(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::UsersLoaded { ticket, result } => {
                if view_data
                    .users
                    .complete(ticket, result.map_err(anyhow::Error::msg))
                {
                    clamp_selection(state, view_data);
                }
            }
        }
    }
}

fn start_list_fetch<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let ticket = view_data.users.begin_fetch();
    if let Err(error) = runtime.spawn_list_users(ticket, internal_tx.clone()) {
        view_data.users.complete(ticket, Err(error));
        clamp_selection(state, view_data);
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn arm_status_clear(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    arm_status_clear(view_data, internal_tx);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            view_data.alert = None;
        }
        return false;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match state.mode {
        AppMode::Form(_) => handle_form_key(state, runtime, view_data, internal_tx, key),
        AppMode::ConfirmDelete => handle_confirm_key(state, runtime, view_data, internal_tx, key),
        AppMode::List if view_data.search_editing => handle_search_key(state, view_data, key),
        AppMode::List => return handle_list_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_list_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => return true,
        (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
            move_selection(state, view_data, 1);
        }
        (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
            move_selection(state, view_data, -1);
        }
        (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
            view_data.selected_row = 0;
        }
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
            let count = view_data.users.filtered(&state.search).len();
            view_data.selected_row = count.saturating_sub(1);
        }
        (KeyCode::Char('/'), _) => {
            view_data.search_editing = true;
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => {
            open_form(state, view_data, UserForm::create());
        }
        (KeyCode::Char('e'), KeyModifiers::NONE) | (KeyCode::Enter, _) => {
            match selected_user(state, view_data) {
                Some(user) => open_form(state, view_data, UserForm::edit(&user)),
                None => emit_status(state, view_data, internal_tx, "no user selected"),
            }
        }
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            request_delete(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            start_list_fetch(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, "refreshing users");
        }
        (KeyCode::Char('?'), _) => {
            view_data.help_visible = true;
        }
        (KeyCode::Esc, _) => {
            if state.search.is_empty() {
                state.dispatch(AppCommand::ClearStatus);
            } else {
                state.dispatch(AppCommand::ClearSearch);
                view_data.selected_row = 0;
            }
        }
        _ => {}
    }
    false
}

fn handle_search_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) {
    match key.code {
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut query = state.search.clone();
            query.push(ch);
            state.dispatch(AppCommand::SetSearch(query));
            view_data.selected_row = 0;
        }
        KeyCode::Backspace => {
            let mut query = state.search.clone();
            query.pop();
            state.dispatch(AppCommand::SetSearch(query));
            view_data.selected_row = 0;
        }
        KeyCode::Enter => {
            view_data.search_editing = false;
        }
        KeyCode::Esc => {
            view_data.search_editing = false;
            state.dispatch(AppCommand::ClearSearch);
            view_data.selected_row = 0;
        }
        _ => {}
    }
}

fn move_selection(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let count = view_data.users.filtered(&state.search).len();
    if count == 0 {
        view_data.selected_row = 0;
        return;
    }
    let current = view_data.selected_row.min(count - 1) as isize;
    view_data.selected_row = (current + delta).clamp(0, count as isize - 1) as usize;
}

fn clamp_selection(state: &AppState, view_data: &mut ViewData) {
    let count = view_data.users.filtered(&state.search).len();
    view_data.selected_row = view_data.selected_row.min(count.saturating_sub(1));
}

fn selected_user(state: &AppState, view_data: &ViewData) -> Option<User> {
    view_data
        .users
        .filtered(&state.search)
        .get(view_data.selected_row)
        .map(|user| (*user).clone())
}

fn request_delete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(user) = selected_user(state, view_data) else {
        emit_status(state, view_data, internal_tx, "no user selected");
        return;
    };
    state.dispatch(AppCommand::RequestDelete(user.username));
    if !view_data.options.confirm_delete {
        confirm_delete(state, runtime, view_data, internal_tx);
    }
}

fn handle_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            confirm_delete(state, runtime, view_data, internal_tx);
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            state.dispatch(AppCommand::CancelDelete);
            arm_status_clear(view_data, internal_tx);
        }
        _ => {}
    }
}

fn confirm_delete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    for event in state.dispatch(AppCommand::ConfirmDelete) {
        let AppEvent::DeleteConfirmed(username) = event else {
            continue;
        };
        match runtime.delete_user(&username) {
            Ok(()) => {
                emit_status(state, view_data, internal_tx, format!("deleted {username}"));
                start_list_fetch(state, runtime, view_data, internal_tx);
            }
            Err(err) => {
                error!(username = %username, error = %format!("{err:#}"), "delete user failed");
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("delete of {username} failed; see the log for details"),
                );
            }
        }
    }
}

fn open_form(state: &mut AppState, view_data: &mut ViewData, form: UserForm) {
    let kind = form.mode().kind();
    view_data.form = Some(FormUiState::new(form));
    state.dispatch(AppCommand::OpenForm(kind));
}

fn close_form(state: &mut AppState, view_data: &mut ViewData) {
    view_data.form = None;
    state.dispatch(AppCommand::CloseForm);
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            close_form(state, view_data);
            emit_status(state, view_data, internal_tx, "form cancelled");
        }
        (KeyCode::Enter, _) | (KeyCode::Char('s'), KeyModifiers::CONTROL) => {
            submit_form(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Tab, _) | (KeyCode::Down, _) => move_form_cursor(view_data, 1),
        (KeyCode::BackTab, _) | (KeyCode::Up, _) => move_form_cursor(view_data, -1),
        _ => {
            let Some(form_ui) = view_data.form.as_mut() else {
                return;
            };
            match edit_form_row(form_ui, key) {
                Ok(Some(status)) => emit_status(state, view_data, internal_tx, status),
                Ok(None) => {}
                Err(error) => emit_status(state, view_data, internal_tx, error.to_string()),
            }
        }
    }
}

fn move_form_cursor(view_data: &mut ViewData, delta: isize) {
    let Some(form_ui) = view_data.form.as_mut() else {
        return;
    };
    let len = form_ui.rows().len() as isize;
    if len == 0 {
        return;
    }
    form_ui.cursor = (form_ui.cursor as isize + delta).rem_euclid(len) as usize;
}

fn form_rows(form: &UserForm) -> Vec<FormRow> {
    let mut rows = vec![FormRow::Username, FormRow::Email, FormRow::Password];
    for platform in Platform::ALL {
        let key = PlatformKey::from(platform);
        let selected = form.is_selected(&key);
        rows.push(FormRow::Toggle(key.clone()));
        if selected {
            rows.extend(
                platform_fields(platform)
                    .iter()
                    .map(|spec| FormRow::Field(key.clone(), *spec)),
            );
        }
    }
    rows.extend(
        form.selected()
            .into_iter()
            .filter(|key| key.platform().is_none())
            .map(FormRow::Toggle),
    );
    rows
}

/// Applies a typing key to a text buffer; returns whether it changed.
fn apply_text_key(text: &mut String, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char(ch)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            text.push(ch);
            true
        }
        KeyCode::Backspace => text.pop().is_some(),
        _ => false,
    }
}

fn field_text(form_ui: &FormUiState, key: &PlatformKey, spec: &FieldSpec) -> String {
    if let Some(buffer) = form_ui.list_buffers.get(&(key.clone(), spec.name)) {
        return buffer.clone();
    }
    form_ui
        .form
        .config(key)
        .and_then(|config| config.field(spec.name))
        .map(|value| value.display())
        .unwrap_or_default()
}

fn edit_form_row(form_ui: &mut FormUiState, key: KeyEvent) -> Result<Option<String>> {
    let rows = form_ui.rows();
    let Some(row) = rows.get(form_ui.cursor).cloned() else {
        return Ok(None);
    };

    match row {
        FormRow::Username => {
            apply_text_key(&mut form_ui.form.username, key);
            Ok(None)
        }
        FormRow::Email => {
            apply_text_key(&mut form_ui.form.email, key);
            Ok(None)
        }
        FormRow::Password => {
            apply_text_key(&mut form_ui.form.password, key);
            Ok(None)
        }
        FormRow::Toggle(platform) => {
            if key.code != KeyCode::Char(' ') {
                return Ok(None);
            }
            let selected = form_ui.form.toggle(platform.clone());
            if !selected {
                form_ui.list_buffers.retain(|(owner, _), _| owner != &platform);
            }
            form_ui.clamp_cursor();
            let state = if selected { "on" } else { "off" };
            Ok(Some(format!("{} {state}", platform.label())))
        }
        FormRow::Field(platform, spec) => edit_field(form_ui, &platform, spec, key),
    }
}

fn edit_field(
    form_ui: &mut FormUiState,
    platform: &PlatformKey,
    spec: FieldSpec,
    key: KeyEvent,
) -> Result<Option<String>> {
    match spec.kind {
        FieldKind::ReadOnly => {
            if matches!(key.code, KeyCode::Char(_) | KeyCode::Backspace) {
                return Ok(Some(format!("{} is read-only", spec.label)));
            }
            Ok(None)
        }
        FieldKind::Choice(choices) => {
            let current = field_text(form_ui, platform, &spec);
            let position = choices.iter().position(|choice| *choice == current);
            let next = match key.code {
                KeyCode::Right | KeyCode::Char(' ') | KeyCode::Char('l') => {
                    position.map_or(0, |index| (index + 1) % choices.len())
                }
                KeyCode::Left | KeyCode::Char('h') => position.map_or(0, |index| {
                    (index + choices.len() - 1) % choices.len()
                }),
                KeyCode::Char(ch @ '1'..='9') => {
                    let index = usize::from(ch as u8 - b'1');
                    if index >= choices.len() {
                        return Ok(Some(format!(
                            "{} has {} choices",
                            spec.label,
                            choices.len()
                        )));
                    }
                    index
                }
                _ => return Ok(None),
            };
            let choice = choices[next];
            form_ui
                .form
                .update_field(platform, spec.name, FieldValue::text(choice))?;
            Ok(Some(format!("{}: {choice}", spec.label)))
        }
        FieldKind::Text | FieldKind::List => {
            let mut text = field_text(form_ui, platform, &spec);
            if !apply_text_key(&mut text, key) {
                return Ok(None);
            }
            if spec.kind == FieldKind::List {
                form_ui
                    .list_buffers
                    .insert((platform.clone(), spec.name), text.clone());
            }
            form_ui
                .form
                .update_field(platform, spec.name, FieldValue::Text(text))?;
            Ok(None)
        }
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form_ui) = view_data.form.as_ref() else {
        return;
    };
    let mode = form_ui.form.mode().clone();
    let payload = match form_ui.form.to_payload() {
        Ok(payload) => payload,
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("form invalid: {error}"));
            return;
        }
    };

    let result = match &mode {
        FormMode::Create => runtime.create_user(&payload),
        FormMode::Edit { username } => runtime.update_user(username, &payload),
    };
    if let Err(error) = result {
        let message = format!("{error:#}");
        warn!(username = %payload.username, error = %message, "save user rejected");
        view_data.alert = Some(message);
        return;
    }

    close_form(state, view_data);
    let status = match mode {
        FormMode::Create => format!("created {}", payload.username),
        FormMode::Edit { .. } => format!("updated {}", payload.username),
    };
    emit_status(state, view_data, internal_tx, status);
    start_list_fetch(state, runtime, view_data, internal_tx);
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

    let header = Paragraph::new(render_header_text(state, view_data))
        .block(Block::default().title("roster").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_user_table(frame, layout[1], state, view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if let Some(form_ui) = &view_data.form {
        let area = centered_rect(70, 84, frame.area());
        frame.render_widget(Clear, area);
        let (text, cursor_line) = render_form_text(form_ui);
        let visible = area.height.saturating_sub(2);
        let scroll = (cursor_line as u16).saturating_sub(visible.saturating_sub(1));
        let form = Paragraph::new(text).scroll((scroll, 0)).block(
            Block::default()
                .title(form_ui.form.mode().kind().title())
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(form, area);
    }

    if state.mode == AppMode::ConfirmDelete {
        let area = centered_rect(50, 30, frame.area());
        frame.render_widget(Clear, area);
        let confirm = Paragraph::new(render_confirm_text(state))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title("delete user")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Red)),
            );
        frame.render_widget(confirm, area);
    }

    if let Some(message) = &view_data.alert {
        let area = centered_rect(60, 30, frame.area());
        frame.render_widget(Clear, area);
        let alert = Paragraph::new(format!("{message}\n\nenter/esc dismiss"))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title("error")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Red)),
            );
        frame.render_widget(alert, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_header_text(state: &AppState, view_data: &ViewData) -> String {
    let total = view_data.users.users().len();
    let mut text = format!("Total Users: {total}");
    if view_data.search_editing || !state.search.is_empty() {
        let shown = view_data.users.filtered(&state.search).len();
        let query = if state.search.is_empty() {
            "Search users..."
        } else {
            state.search.as_str()
        };
        let cursor = if view_data.search_editing { "_" } else { "" };
        text.push_str(&format!(" | search: {query}{cursor} ({shown} shown)"));
    } else {
        text.push_str(" | / search");
    }
    text
}

fn empty_table_message(state: &AppState, view_data: &ViewData) -> &'static str {
    let list = view_data.users.state();
    if list.loading {
        "loading users..."
    } else if list.error {
        "could not load users -- check the API and press r to retry"
    } else if !state.search.is_empty() {
        "no users match the search"
    } else {
        "No users found"
    }
}

fn table_title(view_data: &ViewData) -> String {
    let list = view_data.users.state();
    if list.loading {
        "users (loading)".to_owned()
    } else if list.error {
        "users (load failed)".to_owned()
    } else {
        "users".to_owned()
    }
}

fn platform_badges(user: &User) -> Line<'static> {
    let mut spans = Vec::new();
    for key in user.platform_keys() {
        let style = style_for(&key);
        let (red, green, blue) = style.color;
        let label = match key.platform() {
            Some(_) => style.badge.to_owned(),
            None => key.as_str().to_owned(),
        };
        if !spans.is_empty() {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(
            label,
            Style::default()
                .fg(Color::Rgb(red, green, blue))
                .add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn render_user_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let users = view_data.users.filtered(&state.search);
    let block = Block::default()
        .title(table_title(view_data))
        .borders(Borders::ALL);
    if users.is_empty() {
        let empty = Paragraph::new(empty_table_message(state, view_data)).block(block);
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(["", "User", "Email", "Platforms", "Created"].map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let selected = view_data.selected_row.min(users.len() - 1);
    let rows = users.iter().enumerate().map(|(index, user)| {
        let style = if index == selected {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(user.initial()),
            Cell::from(user.username.clone()),
            Cell::from(user.email.clone()),
            Cell::from(platform_badges(user)),
            Cell::from(user.created_label()),
        ])
        .style(style)
    });
    let widths = [
        Constraint::Length(2),
        Constraint::Percentage(22),
        Constraint::Percentage(34),
        Constraint::Percentage(26),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(block);
    let mut table_state = TableState::default().with_selected(Some(selected));
    frame.render_stateful_widget(table, area, &mut table_state);
}

/// Form body plus the line index of the cursor row.
fn render_form_text(form_ui: &FormUiState) -> (String, usize) {
    let form = &form_ui.form;
    let mut lines = Vec::new();
    let mut cursor_line = 0;
    let mut platforms_heading = false;

    for (index, row) in form_ui.rows().iter().enumerate() {
        if matches!(row, FormRow::Toggle(_)) && !platforms_heading {
            lines.push(String::new());
            lines.push("Platforms".to_owned());
            platforms_heading = true;
        }
        let marker = if index == form_ui.cursor {
            cursor_line = lines.len();
            "> "
        } else {
            "  "
        };
        let body = match row {
            FormRow::Username => format!("Username: {}", form.username),
            FormRow::Email => format!("Email: {}", form.email),
            FormRow::Password => {
                let masked = PASSWORD_MASK.to_string().repeat(form.password.chars().count());
                match form.mode() {
                    FormMode::Create => format!("Password: {masked}"),
                    FormMode::Edit { .. } => format!("Password (blank keeps current): {masked}"),
                }
            }
            FormRow::Toggle(key) => {
                let check = if form.is_selected(key) { "[x]" } else { "[ ]" };
                match key.platform() {
                    Some(_) => format!("{check} {} {}", style_for(key).badge, key.label()),
                    None => format!("{check} {} (kept as-is)", key.as_str()),
                }
            }
            FormRow::Field(key, spec) => {
                let value = field_text(form_ui, key, spec);
                let hint = match spec.kind {
                    FieldKind::Choice(choices) => format!(" (←/→ or 1-{})", choices.len()),
                    FieldKind::List => " (comma separated)".to_owned(),
                    FieldKind::ReadOnly => " (read-only)".to_owned(),
                    FieldKind::Text => String::new(),
                };
                format!("    {}: {value}{hint}", spec.label)
            }
        };
        lines.push(format!("{marker}{body}"));
    }

    lines.push(String::new());
    lines.push(format!(
        "enter {} | esc cancel",
        form.mode().kind().submit_label()
    ));
    (lines.join("\n"), cursor_line)
}

fn render_confirm_text(state: &AppState) -> String {
    let username = state.pending_delete.as_deref().unwrap_or("this user");
    format!("Delete {username}?\n\nThis action cannot be undone.\n\ny delete | n cancel")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let (mode, hints) = match state.mode {
        AppMode::List if view_data.search_editing => {
            ("SEARCH", "type to filter | enter keep | esc clear")
        }
        AppMode::List => (
            "LIST",
            "j/k move | / search | a add | e edit | d delete | r refresh | ? help | q quit",
        ),
        AppMode::Form(_) => (
            "FORM",
            "tab/shift+tab field | space toggle | ←/→ 1-9 choose | enter submit | esc cancel",
        ),
        AppMode::ConfirmDelete => ("DELETE", "y confirm | n cancel"),
    };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit\n\
list: j/k or up/down move | g/G first/last | / search | esc clear search\n\
list: a add | e or enter edit | d delete | r refresh | q quit\n\
form: tab/shift+tab field | type to edit | space toggle platform\n\
form: ←/→ or 1-9 choose role | ctrl+s or enter submit | esc cancel\n\
delete: y confirm | n cancel\n\
error: enter/esc dismiss"
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
        AppRuntime, InternalEvent, UiOptions, ViewData, empty_table_message, form_rows,
        handle_key_event, process_internal_events, render, render_confirm_text,
        render_form_text, render_header_text, selected_user, start_list_fetch, status_text,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use roster_app::{AppMode, AppState, FormKind, Platform, PlatformKey, User, UserPayload};
    use roster_testkit::{UserFaker, sample_users};
    use serde_json::json;
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Debug, Default)]
    struct TestRuntime {
        users: Vec<User>,
        fail_list: bool,
        save_error: Option<String>,
        delete_error: Option<String>,
        list_calls: usize,
        created: Vec<UserPayload>,
        updated: Vec<(String, UserPayload)>,
        deleted: Vec<String>,
    }

    impl AppRuntime for TestRuntime {
        fn list_users(&mut self) -> Result<Vec<User>> {
            self.list_calls += 1;
            if self.fail_list {
                return Err(anyhow!("cannot reach http://127.0.0.1:1"));
            }
            Ok(self.users.clone())
        }

        fn create_user(&mut self, payload: &UserPayload) -> Result<()> {
            if let Some(error) = &self.save_error {
                return Err(anyhow!("{error}"));
            }
            self.created.push(payload.clone());
            Ok(())
        }

        fn update_user(&mut self, username: &str, payload: &UserPayload) -> Result<()> {
            if let Some(error) = &self.save_error {
                return Err(anyhow!("{error}"));
            }
            self.updated.push((username.to_owned(), payload.clone()));
            Ok(())
        }

        fn delete_user(&mut self, username: &str) -> Result<()> {
            if let Some(error) = &self.delete_error {
                return Err(anyhow!("{error}"));
            }
            self.users.retain(|user| user.username != username);
            self.deleted.push(username.to_owned());
            Ok(())
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
        fn new(runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                state: AppState::default(),
                runtime,
                view_data: ViewData::default(),
                tx,
                rx,
            }
        }

        fn loaded() -> Result<Self> {
            let mut harness = Self::new(TestRuntime {
                users: sample_users()?,
                ..TestRuntime::default()
            });
            harness.refresh();
            Ok(harness)
        }

        fn refresh(&mut self) {
            start_list_fetch(
                &self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
            );
            self.pump();
        }

        fn pump(&mut self) {
            process_internal_events(&mut self.state, &mut self.view_data, &self.rx);
        }

        fn press_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            );
            self.pump();
            quit
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.press_with(code, KeyModifiers::NONE)
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }

        fn fill_identity(&mut self, username: &str, email: &str, password: &str) {
            self.type_text(username);
            self.press(KeyCode::Tab);
            self.type_text(email);
            self.press(KeyCode::Tab);
            self.type_text(password);
            self.press(KeyCode::Tab);
        }
    }

    #[test]
    fn initial_fetch_loads_users() -> Result<()> {
        let harness = Harness::loaded()?;
        assert_eq!(harness.runtime.list_calls, 1);
        assert_eq!(harness.view_data.users.users().len(), 3);
        assert!(!harness.view_data.users.state().loading);
        assert!(render_header_text(&harness.state, &harness.view_data).contains("Total Users: 3"));
        Ok(())
    }

    #[test]
    fn failed_fetch_shows_empty_list_with_retry_hint() {
        let mut harness = Harness::new(TestRuntime {
            fail_list: true,
            ..TestRuntime::default()
        });
        harness.refresh();

        let list = harness.view_data.users.state();
        assert!(list.users.is_empty());
        assert!(list.error);
        assert!(empty_table_message(&harness.state, &harness.view_data).contains("press r"));
    }

    #[test]
    fn closed_channel_completes_fetch_as_failure() {
        let mut harness = Harness::new(TestRuntime::default());
        let (tx, rx) = mpsc::channel();
        drop(rx);
        start_list_fetch(
            &harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
            &tx,
        );
        assert!(harness.view_data.users.state().error);
        assert!(!harness.view_data.users.state().loading);
    }

    #[test]
    fn stale_list_response_is_ignored() -> Result<()> {
        let mut harness = Harness::new(TestRuntime::default());
        let users = sample_users()?;
        let first = harness.view_data.users.begin_fetch();
        let second = harness.view_data.users.begin_fetch();

        harness.tx.send(InternalEvent::UsersLoaded {
            ticket: second,
            result: Ok(users[..1].to_vec()),
        })?;
        harness.tx.send(InternalEvent::UsersLoaded {
            ticket: first,
            result: Ok(users),
        })?;
        harness.pump();

        assert_eq!(harness.view_data.users.users().len(), 1);
        assert_eq!(harness.view_data.users.users()[0].username, "johndoe");
        Ok(())
    }

    #[test]
    fn create_form_submits_normalized_payload() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('a'));
        assert_eq!(harness.state.mode, AppMode::Form(FormKind::Create));

        harness.fill_identity("alice", "a@x.com", "p");
        harness.press(KeyCode::Char(' '));
        harness.press(KeyCode::Tab);
        harness.type_text("42");
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Right);
        harness.press(KeyCode::Right);
        harness.press(KeyCode::Tab);
        harness.type_text("7, 9");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.created.len(), 1);
        assert_eq!(
            serde_json::to_value(&harness.runtime.created[0])?,
            json!({
                "username": "alice",
                "email": "a@x.com",
                "password": "p",
                "platforms": [
                    {"platform": "gitlab", "role": "Developer", "group_id": "42", "repo_access": [7, 9]}
                ]
            })
        );
        assert_eq!(harness.state.mode, AppMode::List);
        assert!(harness.view_data.form.is_none());
        assert_eq!(harness.runtime.list_calls, 2);
        assert_eq!(harness.state.status_line.as_deref(), Some("created alice"));
        Ok(())
    }

    #[test]
    fn rejected_save_opens_alert_and_keeps_form() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.runtime.save_error = Some("server error (400): Username already exists".to_owned());
        harness.press(KeyCode::Char('a'));
        harness.fill_identity("johndoe", "j@x.com", "secret");
        harness.press(KeyCode::Enter);

        assert_eq!(
            harness.view_data.alert.as_deref(),
            Some("server error (400): Username already exists")
        );
        assert_eq!(harness.state.mode, AppMode::Form(FormKind::Create));

        harness.press(KeyCode::Esc);
        assert!(harness.view_data.alert.is_none());
        let form = harness
            .view_data
            .form
            .as_ref()
            .map(|form_ui| form_ui.form.username.clone());
        assert_eq!(form.as_deref(), Some("johndoe"));
        assert_eq!(harness.runtime.list_calls, 1);
        Ok(())
    }

    #[test]
    fn invalid_form_is_not_submitted() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('a'));
        harness.type_text("bob");
        harness.press(KeyCode::Enter);

        assert!(harness.runtime.created.is_empty());
        assert!(
            harness
                .state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("email is required"))
        );
        Ok(())
    }

    #[test]
    fn edit_form_patches_original_username_without_password() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char('e'));
        assert_eq!(harness.state.mode, AppMode::Form(FormKind::Edit));

        harness.type_text("2");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.updated.len(), 1);
        let (path_username, payload) = &harness.runtime.updated[0];
        assert_eq!(path_username, "janedoe");
        let body = serde_json::to_value(payload)?;
        assert_eq!(body["username"], json!("janedoe2"));
        assert!(body.get("password").is_none());
        assert_eq!(body["platforms"][0]["platform"], json!("nextcloud"));
        Ok(())
    }

    #[test]
    fn toggling_platform_off_drops_its_field_rows() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('a'));
        let base_rows = harness
            .view_data
            .form
            .as_ref()
            .map(|form_ui| form_rows(&form_ui.form).len())
            .unwrap_or_default();

        for _ in 0..3 {
            harness.press(KeyCode::Tab);
        }
        harness.press(KeyCode::Char(' '));
        let Some(form_ui) = harness.view_data.form.as_ref() else {
            panic!("form should be open");
        };
        assert_eq!(form_rows(&form_ui.form).len(), base_rows + 3);
        let (text, _) = render_form_text(form_ui);
        assert!(text.contains("> [x] GL GitLab"));
        assert!(text.contains("Role: Guest"));

        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Tab);
        harness.type_text("3,");
        harness.press(KeyCode::BackTab);
        harness.press(KeyCode::BackTab);
        harness.press(KeyCode::BackTab);
        harness.press(KeyCode::Char(' '));

        let Some(form_ui) = harness.view_data.form.as_ref() else {
            panic!("form should be open");
        };
        assert!(form_ui.form.selected().is_empty());
        assert!(form_ui.list_buffers.is_empty());
        assert_eq!(form_rows(&form_ui.form).len(), base_rows);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("GitLab off")
        );
        Ok(())
    }

    #[test]
    fn drive_share_target_is_seeded_and_read_only() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('a'));
        harness.fill_identity("carol", "c@x.com", "pw");
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Char(' '));

        let drive = PlatformKey::from(Platform::Drive);
        let Some(form_ui) = harness.view_data.form.as_ref() else {
            panic!("form should be open");
        };
        assert_eq!(form_ui.form.selected(), vec![drive.clone()]);
        let (text, _) = render_form_text(form_ui);
        assert!(text.contains("User Email: c@x.com (read-only)"));

        for _ in 0..3 {
            harness.press(KeyCode::Tab);
        }
        harness.press(KeyCode::Char('z'));
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("User Email is read-only")
        );
        Ok(())
    }

    #[test]
    fn choice_digits_pick_directly() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('a'));
        harness.fill_identity("dave", "d@x.com", "pw");
        harness.press(KeyCode::Char(' '));
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Char('5'));
        assert_eq!(harness.state.status_line.as_deref(), Some("Role: Owner"));
        harness.press(KeyCode::Char('9'));
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("Role has 5 choices")
        );
        Ok(())
    }

    #[test]
    fn delete_requires_confirmation() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('d'));
        assert_eq!(harness.state.mode, AppMode::ConfirmDelete);
        assert!(render_confirm_text(&harness.state).contains("cannot be undone"));
        assert!(harness.runtime.deleted.is_empty());

        harness.press(KeyCode::Char('y'));
        assert_eq!(harness.runtime.deleted, vec!["johndoe".to_owned()]);
        assert_eq!(harness.state.mode, AppMode::List);
        assert_eq!(harness.view_data.users.users().len(), 2);
        Ok(())
    }

    #[test]
    fn delete_cancel_keeps_user() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('d'));
        harness.press(KeyCode::Char('n'));
        assert!(harness.runtime.deleted.is_empty());
        assert_eq!(harness.state.mode, AppMode::List);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("delete cancelled")
        );
        Ok(())
    }

    #[test]
    fn delete_failure_is_noted_on_status_line() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.runtime.delete_error = Some("server returned 500".to_owned());
        harness.press(KeyCode::Char('d'));
        harness.press(KeyCode::Enter);

        assert_eq!(harness.state.mode, AppMode::List);
        assert!(
            harness
                .state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("delete of johndoe failed"))
        );
        assert_eq!(harness.view_data.users.users().len(), 3);
        assert!(harness.view_data.alert.is_none());
        Ok(())
    }

    #[test]
    fn delete_without_confirmation_when_disabled() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.view_data.options = UiOptions {
            confirm_delete: false,
        };
        harness.press(KeyCode::Char('G'));
        harness.press(KeyCode::Char('d'));
        assert_eq!(harness.runtime.deleted, vec!["baeeee".to_owned()]);
        assert_eq!(harness.state.mode, AppMode::List);
        Ok(())
    }

    #[test]
    fn navigation_and_search_over_a_large_roster() {
        let users = UserFaker::new(5).users(50);
        let target = users[37].username.clone();
        let mut harness = Harness::new(TestRuntime {
            users,
            ..TestRuntime::default()
        });
        harness.refresh();
        assert!(render_header_text(&harness.state, &harness.view_data).contains("Total Users: 50"));

        harness.press(KeyCode::Char('G'));
        assert_eq!(harness.view_data.selected_row, 49);
        harness.press(KeyCode::Down);
        assert_eq!(harness.view_data.selected_row, 49);
        harness.press(KeyCode::Char('g'));
        harness.press(KeyCode::Up);
        assert_eq!(harness.view_data.selected_row, 0);

        harness.press(KeyCode::Char('/'));
        harness.type_text(&target.to_uppercase());
        harness.press(KeyCode::Enter);
        let matches = harness.view_data.users.filtered(&harness.state.search);
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|user| user.username.contains(&target)));
        assert_eq!(harness.view_data.selected_row, 0);
    }

    #[test]
    fn search_filters_users() -> Result<()> {
        let mut harness = Harness::loaded()?;
        harness.press(KeyCode::Char('/'));
        harness.type_text("jane");
        assert!(status_text(&harness.state, &harness.view_data).starts_with("SEARCH"));
        harness.press(KeyCode::Enter);

        assert_eq!(harness.state.search, "jane");
        assert!(render_header_text(&harness.state, &harness.view_data).contains("(1 shown)"));
        assert_eq!(
            selected_user(&harness.state, &harness.view_data).map(|user| user.username),
            Some("janedoe".to_owned())
        );

        harness.press(KeyCode::Esc);
        assert!(harness.state.search.is_empty());
        Ok(())
    }

    #[test]
    fn quit_keys() -> Result<()> {
        let mut harness = Harness::loaded()?;
        assert!(harness.press_with(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(harness.press(KeyCode::Char('q')));

        harness.press(KeyCode::Char('a'));
        assert!(!harness.press(KeyCode::Char('q')));
        Ok(())
    }

    #[test]
    fn render_draws_user_rows() -> Result<()> {
        let harness = Harness::loaded()?;
        let mut terminal = Terminal::new(TestBackend::new(110, 24))?;
        terminal.draw(|frame| render(frame, &harness.state, &harness.view_data))?;

        let text = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>();
        assert!(text.contains("Total Users: 3"));
        assert!(text.contains("johndoe"));
        assert!(text.contains("2025-07-22"));
        assert!(text.contains("GL MM"));
        Ok(())
    }
}
