mod help;

use crate::metrics::CampaignTally;
use crate::model::{DialOutcome, OutcomeKind, PhoneNumber, RunState};
use crate::orchestrator::{self, RunController, UiCommand};
use crate::storage::{CampaignStore, FileStore};
use crate::text_summary::{outcome_line, queue_lines};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use help::draw_help;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs},
    Terminal,
};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::warn;

const TAB_TITLES: [&str; 3] = ["Dashboard", "Queue", "Help"];
const HELP_TAB: usize = 2;

/// Static facts about the session shown in the dashboard header.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub backend: &'static str,
    pub pacing: Duration,
}

struct UiState {
    tab: usize,
    info: String,
    session: SessionInfo,
    numbers: Vec<PhoneNumber>,
    dnc: Vec<PhoneNumber>,
    run: RunState,
}

impl UiState {
    fn new(session: SessionInfo) -> Self {
        Self {
            tab: 0,
            info: "Press s to start, ? for help".into(),
            session,
            numbers: Vec::new(),
            dnc: Vec::new(),
            run: RunState::default(),
        }
    }

    fn reload_lists(&mut self, store: &FileStore) -> bool {
        match (store.list_numbers(), store.list_dnc()) {
            (Ok(numbers), Ok(dnc)) => {
                self.numbers = numbers;
                self.dnc = dnc;
                true
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to reload campaign lists");
                self.info = format!("Reload failed: {e}");
                false
            }
        }
    }
}

pub async fn run(controller: RunController, store: Arc<FileStore>, session: SessionInfo) -> Result<()> {
    let (info_tx, info_rx) = mpsc::unbounded_channel::<String>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // Terminal I/O stays on its own thread, off the Tokio workers.
    let ui_controller = controller.clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(ui_controller, store, session, info_rx, cmd_tx));

    orchestrator::run_commands(&controller, info_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }
    Ok(())
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    controller: RunController,
    store: Arc<FileStore>,
    session: SessionInfo,
    mut info_rx: UnboundedReceiver<String>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::new(session);
    state.reload_lists(&store);

    let tick_rate = Duration::from_millis(100);
    let mut last_tick: Option<Instant> = None;

    let res: Result<()> = loop {
        while let Ok(msg) = info_rx.try_recv() {
            state.info = msg;
        }

        if last_tick.map_or(true, |t| t.elapsed() >= tick_rate) {
            state.run = controller.snapshot();
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Some(Instant::now());
        }

        // Short poll keeps the render loop responsive.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('s')) => {
                        state.reload_lists(&store);
                        state.info = "Starting…".into();
                        let _ = cmd_tx.send(UiCommand::Start);
                    }
                    (_, KeyCode::Char('x')) => {
                        state.info = "Stopping…".into();
                        let _ = cmd_tx.send(UiCommand::Stop);
                    }
                    (_, KeyCode::Char('r')) => {
                        if state.reload_lists(&store) {
                            state.info = "Reloaded queue and DNC list".into();
                        }
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % TAB_TITLES.len();
                    }
                    (_, KeyCode::Char('?')) => state.tab = HELP_TAB,
                    (_, KeyCode::Esc) => state.tab = 0,
                    _ => {}
                }
                last_tick = None;
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let tabs = Tabs::new(TAB_TITLES.iter().map(|t| Line::from(*t)).collect::<Vec<_>>())
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("outbound-dialer"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_dashboard(chunks[1], f, state),
        1 => draw_queue(chunks[1], f, state),
        _ => draw_help(chunks[1], f),
    }

    let footer = Paragraph::new(Line::from(state.info.clone()))
        .block(Block::default().borders(Borders::ALL).title("Info"));
    f.render_widget(footer, chunks[2]);
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)].as_ref())
        .split(area);

    let status = Paragraph::new(status_lines(state))
        .block(Block::default().borders(Borders::ALL).title("Campaign"));
    f.render_widget(status, rows[0]);

    let recent = CampaignTally::from_outcomes(&state.run.recent_outcomes);
    let outcomes = List::new(outcome_items(&state.run.recent_outcomes)).block(
        Block::default().borders(Borders::ALL).title(format!(
            "Recent outcomes: {} initiated, {} skipped, {} errors",
            recent.initiated, recent.skipped, recent.errors
        )),
    );
    f.render_widget(outcomes, rows[1]);
}

fn draw_queue(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let lines: Vec<Line> = queue_lines(&state.numbers, &state.dnc)
        .into_iter()
        .map(Line::from)
        .collect();
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Queue ({} on DNC)", state.dnc.len())),
    );
    f.render_widget(p, area);
}

fn status_lines(state: &UiState) -> Vec<Line<'static>> {
    let run = &state.run;
    let (label, color) = if run.running {
        ("RUNNING", Color::Green)
    } else {
        ("IDLE", Color::DarkGray)
    };
    let current = run
        .current_number
        .as_ref()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".into());
    vec![
        Line::from(vec![
            Span::raw("Status:  "),
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(format!("Current: {current}")),
        Line::from(format!(
            "Call:    {}",
            run.current_status.as_deref().unwrap_or("-")
        )),
        Line::from(format!(
            "Queue:   {} number(s), {} on DNC",
            state.numbers.len(),
            state.dnc.len()
        )),
        Line::from(format!(
            "Backend: {}, pacing {}",
            state.session.backend,
            humantime::format_duration(state.session.pacing)
        )),
    ]
}

fn outcome_color(kind: OutcomeKind) -> Color {
    match kind {
        OutcomeKind::Initiated => Color::Green,
        OutcomeKind::Skipped => Color::Yellow,
        OutcomeKind::Error => Color::Red,
    }
}

fn outcome_items(outcomes: &[DialOutcome]) -> Vec<ListItem<'static>> {
    if outcomes.is_empty() {
        return vec![ListItem::new(Line::from(Span::styled(
            "No calls yet",
            Style::default().fg(Color::DarkGray),
        )))];
    }
    outcomes
        .iter()
        .map(|o| {
            ListItem::new(Line::from(Span::styled(
                outcome_line(o),
                Style::default().fg(outcome_color(o.kind)),
            )))
        })
        .collect()
}
