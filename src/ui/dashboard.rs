use crate::api::server::rest::{parse_value, AlertClient};
use crate::api::server::ws::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::error::SubmissionError;
use crate::model::{AlertRecord, AlertStatus, Direction, Indicator, NewAlert};
use crate::ui::core::alerts::{AlertStore, Reconciler};
use crate::ui::core::notify::{NotificationKind, Toast, ToastBoard};
use crate::ui::core::pages::{self, AlertsView};
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::layout::Alignment;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction as LayoutDirection, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};
use std::error::Error;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type DynError = Box<dyn Error + Send + Sync>;

const ORANGE: Color = Color::Rgb(255, 165, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Value,
    Direction,
    Indicator,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Value => FormField::Direction,
            FormField::Direction => FormField::Indicator,
            FormField::Indicator => FormField::Value,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Value => FormField::Indicator,
            FormField::Direction => FormField::Value,
            FormField::Indicator => FormField::Direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    None,
    Submit(NewAlert),
    Cancel,
}

/// State of the create-alert popup.
#[derive(Debug, Clone)]
pub struct AlertForm {
    /// Distinguishes this popup from ones opened later, so a slow submission
    /// only updates the form it came from.
    pub generation: u64,
    pub value: String,
    pub direction: Direction,
    pub indicator: Indicator,
    pub focus: FormField,
    pub error: Option<String>,
    pub submitting: bool,
}

impl Default for AlertForm {
    fn default() -> Self {
        Self {
            generation: 0,
            value: String::new(),
            direction: Direction::Up,
            indicator: Indicator::Macd,
            focus: FormField::Value,
            error: None,
            submitting: false,
        }
    }
}

impl AlertForm {
    pub fn handle_key(&mut self, code: KeyCode) -> FormAction {
        match code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.prev(),
            KeyCode::Enter => {
                if self.submitting {
                    return FormAction::None;
                }
                return match parse_value(&self.value) {
                    Ok(value) => {
                        self.error = None;
                        self.submitting = true;
                        FormAction::Submit(NewAlert {
                            value,
                            direction: self.direction,
                            indicator: self.indicator.clone(),
                        })
                    }
                    Err(e) => {
                        self.error = Some(e.to_string());
                        FormAction::None
                    }
                };
            }
            code => match self.focus {
                FormField::Value => match code {
                    KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E') => {
                        self.value.push(c);
                        self.error = None;
                    }
                    KeyCode::Backspace => {
                        self.value.pop();
                        self.error = None;
                    }
                    _ => {}
                },
                FormField::Direction => {
                    if matches!(code, KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')) {
                        self.direction = self.direction.toggle();
                    }
                }
                FormField::Indicator => {
                    if matches!(code, KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')) {
                        self.indicator = self.indicator.next();
                    }
                }
            },
        }
        FormAction::None
    }
}

#[derive(Clone)]
pub struct Dashboard {
    pub reconciler: Arc<Mutex<Reconciler>>,
    pub page: Arc<Mutex<usize>>,
    pub form: Arc<Mutex<Option<AlertForm>>>,
    pub forms_opened: Arc<Mutex<u64>>,
    pub connection_error: Arc<Mutex<Option<String>>>,
    pub last_frame: Arc<Mutex<Option<DateTime<Local>>>>,
    pub running: Arc<Mutex<bool>>,
    pub toasts: ToastBoard,
    pub client: AlertClient,
}

impl Dashboard {
    pub fn new(reconciler: Reconciler, toasts: ToastBoard, client: AlertClient) -> Self {
        Self {
            reconciler: Arc::new(Mutex::new(reconciler)),
            page: Arc::new(Mutex::new(1)),
            form: Arc::new(Mutex::new(None)),
            forms_opened: Arc::new(Mutex::new(0)),
            connection_error: Arc::new(Mutex::new(None)),
            last_frame: Arc::new(Mutex::new(None)),
            running: Arc::new(Mutex::new(true)),
            toasts,
            client,
        }
    }

    pub fn store(&self) -> AlertStore {
        self.reconciler.lock().unwrap().store()
    }

    pub fn view(&self) -> AlertsView {
        let page = *self.page.lock().unwrap();
        pages::project(&self.store(), page)
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    /// Marks the connection as failed. The error screen replaces the alerts.
    pub fn fail(&self, cause: impl Into<String>) {
        *self.connection_error.lock().unwrap() = Some(cause.into());
    }

    /// Connects in the background so the header can show `CONNECTING`
    /// while the handshake runs. A failed connect switches to the error screen.
    pub fn start_connection(
        &self,
        connection: Arc<ConnectionManager>,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> JoinHandle<()> {
        let dashboard = self.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.connect(events).await {
                dashboard.fail(e.to_string());
            }
        })
    }

    pub async fn run(&self, connection: Arc<ConnectionManager>) -> Result<(), DynError> {
        let (event_tx, mut receiver) = mpsc::channel(100);

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let connecting = self.start_connection(connection.clone(), event_tx);
        let result = self.event_loop(&mut terminal, &mut receiver, &connection);

        // A handshake still in flight is abandoned before the socket is released.
        connecting.abort();
        let _ = connecting.await;
        connection.close().await;
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    fn event_loop(
        &self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        receiver: &mut mpsc::Receiver<ConnectionEvent>,
        connection: &ConnectionManager,
    ) -> Result<(), DynError> {
        while self.is_running() {
            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_input(key);
                }
            }

            while let Ok(event) = receiver.try_recv() {
                self.handle_event(event);
            }

            let state = connection.state();
            terminal.draw(|f| {
                let toasts = self.toasts.visible(Instant::now());
                let chunks = Layout::default()
                    .direction(LayoutDirection::Vertical)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Min(5),
                        Constraint::Length(toasts.len() as u16),
                        Constraint::Length(3),
                    ])
                    .split(f.size());

                self.render_header(f, chunks[0], &state);
                self.render_main_content(f, chunks[1]);
                Self::render_toasts(f, chunks[2], &toasts);
                self.render_footer(f, chunks[3]);
            })?;
        }
        Ok(())
    }

    /// Applies one event from the connection, in arrival order.
    pub fn handle_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Frame(frame) => {
                let applied = self.reconciler.lock().unwrap().apply_frame(&frame);
                if applied.is_ok() {
                    *self.last_frame.lock().unwrap() = Some(Local::now());
                    self.clamp_page();
                }
            }
            ConnectionEvent::Failed(e) => {
                log::error!("Alert feed stopped: {}", e);
                self.fail(e.to_string());
            }
        }
    }

    fn clamp_page(&self) {
        let total = pages::total_pages(self.store().count(AlertStatus::Completed));
        let mut page = self.page.lock().unwrap();
        *page = pages::clamp_page(*page, total);
    }

    fn change_page(&self, delta: isize) {
        {
            let mut page = self.page.lock().unwrap();
            *page = page.saturating_add_signed(delta);
        }
        self.clamp_page();
    }

    pub fn handle_key_input(&self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.connection_error.lock().unwrap().is_some() {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                *self.running.lock().unwrap() = false;
            }
            return;
        }

        let action = {
            let mut form = self.form.lock().unwrap();
            form.as_mut()
                .map(|form| (form.handle_key(key.code), form.generation))
        };

        match action {
            Some((FormAction::Cancel, _)) => *self.form.lock().unwrap() = None,
            Some((FormAction::Submit(alert), generation)) => self.submit(alert, generation),
            Some((FormAction::None, _)) => {}
            None => match key.code {
                KeyCode::Char('q') => *self.running.lock().unwrap() = false,
                KeyCode::Char('n') => self.open_form(),
                KeyCode::Left | KeyCode::Char('h') => self.change_page(-1),
                KeyCode::Right | KeyCode::Char('l') => self.change_page(1),
                _ => (),
            },
        }
    }

    fn open_form(&self) {
        let generation = {
            let mut opened = self.forms_opened.lock().unwrap();
            *opened += 1;
            *opened
        };
        *self.form.lock().unwrap() = Some(AlertForm {
            generation,
            ..AlertForm::default()
        });
    }

    fn submit(&self, alert: NewAlert, generation: u64) {
        let dashboard = self.clone();
        tokio::spawn(async move {
            let result = dashboard.client.create(&alert).await;
            dashboard.finish_submission(generation, result);
        });
    }

    /// Reports a finished submission. The form is only reset if it is still
    /// the one that sent the request.
    pub fn finish_submission(&self, generation: u64, result: Result<(), SubmissionError>) {
        if let Some(form) = self.form.lock().unwrap().as_mut() {
            if form.generation == generation {
                form.submitting = false;
                if result.is_ok() {
                    form.value.clear();
                }
            }
        }

        match result {
            Ok(()) => self.toasts.push(NotificationKind::Success, "Alert created successfully!"),
            Err(e) => {
                log::error!("Alert creation failed: {}", e);
                self.toasts.push(NotificationKind::Failure, e.to_string());
            }
        }
    }

    fn render_header(
        &self,
        f: &mut Frame<CrosstermBackend<io::Stdout>>,
        area: Rect,
        state: &ConnectionState,
    ) {
        let store = self.store();

        let status_color = match state {
            ConnectionState::Open => Color::Green,
            ConnectionState::Connecting | ConnectionState::Idle => Color::Yellow,
            ConnectionState::Closed | ConnectionState::Errored(_) => Color::Red,
        };

        let last_frame = self
            .last_frame
            .lock()
            .unwrap()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        let header = Paragraph::new(Text::from(vec![
            Line::from(vec![
                Span::styled(
                    "ALERTDESK ",
                    Style::default()
                        .fg(Color::LightCyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(state.label(), Style::default().fg(status_color)),
            ]),
            Line::from(Span::styled(
                format!(
                    "Last snapshot: {} | Pending: {} | Completed: {}",
                    last_frame,
                    store.count(AlertStatus::Pending),
                    store.count(AlertStatus::Completed)
                ),
                Style::default().fg(Color::Gray),
            )),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));

        f.render_widget(header, area);
    }

    fn render_main_content(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        if let Some(cause) = self.connection_error.lock().unwrap().clone() {
            Self::render_error(f, area, &cause);
            return;
        }

        let view = self.view();
        let page = *self.page.lock().unwrap();

        let chunks = Layout::default()
            .direction(LayoutDirection::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);

        Self::render_alert_table(
            f,
            chunks[0],
            format!("Pending ({})", view.pending.len()),
            &view.pending,
        );
        Self::render_alert_table(
            f,
            chunks[1],
            format!("Completed (page {}/{})", page, view.total_pages),
            &view.completed_page,
        );

        if let Some(form) = self.form.lock().unwrap().as_ref() {
            Self::render_form(f, area, form);
        }
    }

    fn render_alert_table(
        f: &mut Frame<CrosstermBackend<io::Stdout>>,
        area: Rect,
        title: String,
        records: &[AlertRecord],
    ) {
        let block = Block::default().borders(Borders::ALL).title(title);

        let inner_area = block.inner(area);
        f.render_widget(block, area);

        if inner_area.height < 2 || inner_area.width < 30 {
            return;
        }

        if records.is_empty() {
            let empty = Paragraph::new("No alerts")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
            f.render_widget(empty, inner_area);
            return;
        }

        let rows = records.iter().map(|record| {
            Row::new(vec![
                Cell::from(record.id.to_string()),
                Cell::from(
                    record
                        .value
                        .map(|v| format!("{:.2}", v))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(record.direction.map(|d| d.as_str()).unwrap_or("-")),
                Cell::from(
                    record
                        .indicator
                        .as_ref()
                        .map(|i| i.as_str().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(status_badge(record.status)),
            ])
        });

        let table = Table::new(rows)
            .header(
                Row::new(vec!["ID", "Value", "Dir", "Indicator", "Status"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .widths(&[
                Constraint::Length(10),
                Constraint::Length(12),
                Constraint::Length(5),
                Constraint::Length(10),
                Constraint::Length(11),
            ]);

        f.render_widget(table, inner_area);
    }

    fn render_error(f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect, cause: &str) {
        let error = Paragraph::new(Text::from(vec![
            Line::from(Span::styled(
                "Connection lost",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(cause.to_string()),
            Line::from(""),
            Line::from(Span::styled(
                "Restart the dashboard to reconnect.",
                Style::default().fg(Color::Gray),
            )),
        ]))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Error"));

        f.render_widget(error, area);
    }

    fn render_form(f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect, form: &AlertForm) {
        let popup = centered_rect(50, 10, area);

        let field = |label: &str, value: String, focused: bool| {
            let style = if focused {
                Style::default().fg(Color::Black).bg(Color::LightCyan)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{:<11}", label), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(value, style),
            ])
        };

        let mut lines = vec![
            field("Value:", format!("{}_", form.value), form.focus == FormField::Value),
            field(
                "Direction:",
                format!("< {} >", form.direction.as_str()),
                form.focus == FormField::Direction,
            ),
            field(
                "Indicator:",
                format!("< {} >", form.indicator.as_str()),
                form.focus == FormField::Indicator,
            ),
            Line::from(""),
        ];

        if form.submitting {
            lines.push(Line::from(Span::styled("Submitting...", Style::default().fg(Color::Yellow))));
        } else if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        }

        let body = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title("Create Alert"));

        f.render_widget(Clear, popup);
        f.render_widget(body, popup);
    }

    fn render_toasts(f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect, toasts: &[Toast]) {
        if area.height == 0 {
            return;
        }

        let lines: Vec<Line> = toasts
            .iter()
            .map(|toast| {
                let color = match toast.kind {
                    NotificationKind::Success => Color::Green,
                    NotificationKind::Failure => Color::Red,
                };
                Line::from(Span::styled(format!(" ● {}", toast.message), Style::default().fg(color)))
            })
            .collect();

        f.render_widget(Paragraph::new(lines), area);
    }

    fn render_footer(&self, f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect) {
        let key = |k: &'static str| Span::styled(k, Style::default().add_modifier(Modifier::BOLD));

        let controls = if self.connection_error.lock().unwrap().is_some() {
            vec![Span::raw("Controls: "), key("q"), Span::raw(" Quit")]
        } else if self.form.lock().unwrap().is_some() {
            vec![
                Span::raw("Form: "),
                key("Tab"),
                Span::raw(" Next field  "),
                key("←/→"),
                Span::raw(" Toggle  "),
                key("Enter"),
                Span::raw(" Submit  "),
                key("Esc"),
                Span::raw(" Close"),
            ]
        } else {
            vec![
                Span::raw("Controls: "),
                key("←/→"),
                Span::raw(" Page  "),
                key("n"),
                Span::raw(" New alert  "),
                key("q"),
                Span::raw(" Quit"),
            ]
        };

        let footer = Paragraph::new(Line::from(controls))
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));

        f.render_widget(footer, area);
    }
}

fn status_badge(status: AlertStatus) -> Span<'static> {
    let color = match status {
        AlertStatus::Pending => ORANGE,
        AlertStatus::Completed => Color::Green,
        AlertStatus::Unknown => Color::Gray,
    };
    Span::styled(
        status.label(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
