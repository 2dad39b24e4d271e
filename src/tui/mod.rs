mod help;
mod state;

use crate::cli::{build_config, Cli};
use crate::engine::{ClassificationService, HttpClassifier};
use crate::error::SubmitError;
use crate::model::{ClassificationResult, SubmissionEvent, SubmissionId, SubmissionStatus};
use crate::orchestrator::{self, Resolution, SubmissionController, ABANDONED};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use state::{submit_label, Focus, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::debug;

type Outcome = (SubmissionId, Result<ClassificationResult, SubmitError>);

pub async fn run(args: Cli) -> Result<()> {
    let service: Arc<dyn ClassificationService> =
        Arc::new(HttpClassifier::new(&build_config(&args))?);
    let runtime = Handle::current();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(args, service, runtime));

    match tokio::task::spawn_blocking(move || ui_handle.join()).await {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(anyhow::anyhow!("TUI join failed: {e}")),
    }
}

/// Delivers the outcome of one request back to the UI thread, or an
/// abandonment if the task is dropped first.
struct PendingReply {
    id: SubmissionId,
    tx: Option<UnboundedSender<Outcome>>,
}

impl PendingReply {
    fn send(mut self, outcome: Result<ClassificationResult, SubmitError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send((self.id, outcome));
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send((self.id, Err(SubmitError::Interrupted(ABANDONED.into()))));
        }
    }
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(args: Cli, service: Arc<dyn ClassificationService>, runtime: Handle) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SubmissionEvent>();
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcome>();
    // The controller is owned by the UI thread only; request tasks report back by id.
    let mut controller = SubmissionController::new(Some(event_tx));

    let mut state = UiState {
        file_path: args
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        target_column: args.target_column.clone().unwrap_or_default(),
        endpoint: args.endpoint.clone(),
        image_dir: args.image_dir.clone(),
        ..Default::default()
    };

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        while let Ok((id, outcome)) = outcome_rx.try_recv() {
            if controller.resolve(id, outcome) == Resolution::Applied {
                state.refresh_results(&controller);
            }
            dirty = true;
        }
        while let Ok(ev) = event_rx.try_recv() {
            state.info = ev.to_message();
            dirty = true;
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal
                .draw(|f| draw(f.area(), f, &state, &controller))
                .ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if !event::poll(Duration::from_millis(20)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(k)) = event::read() else {
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }
        dirty = true;
        match (k.modifiers, k.code) {
            (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => break Ok(()),
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => state.clear_focused(),
            (_, KeyCode::F(1)) => state.show_help = !state.show_help,
            (_, KeyCode::Tab) | (_, KeyCode::BackTab) | (_, KeyCode::Up) | (_, KeyCode::Down) => {
                state.toggle_focus()
            }
            (_, KeyCode::Backspace) => state.backspace(),
            (_, KeyCode::Enter) => {
                submit(&mut state, &mut controller, &service, &runtime, &outcome_tx)
            }
            (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => state.push_char(c),
            _ => {}
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Handle the submit control. Does nothing while a request is outstanding.
fn submit(
    state: &mut UiState,
    controller: &mut SubmissionController,
    service: &Arc<dyn ClassificationService>,
    runtime: &Handle,
    outcome_tx: &UnboundedSender<Outcome>,
) {
    if controller.is_in_flight() {
        debug!("submit pressed while processing");
        return;
    }
    state.sync_input(controller);
    // Refusals are reported by the controller through its event channel.
    let Ok(request) = controller.begin() else {
        return;
    };
    state.result_lines.clear();

    let service = Arc::clone(service);
    let reply = PendingReply {
        id: request.id,
        tx: Some(outcome_tx.clone()),
    };
    runtime.spawn(async move {
        let outcome = orchestrator::execute(service.as_ref(), &request).await;
        reply.send(outcome);
    });
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, controller: &SubmissionController) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled("Upload de Dataset", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(state.endpoint.as_str(), Style::default().fg(Color::Gray)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("dataset-classify"));
    f.render_widget(header, chunks[0]);

    let file_title = match state.file_error.as_deref() {
        Some(err) => format!("Arquivo (CSV) - {err}"),
        None => "Arquivo (CSV)".to_string(),
    };
    draw_field(
        chunks[1],
        f,
        &file_title,
        &state.file_path,
        state.focus == Focus::File,
        state.file_error.is_some(),
    );
    draw_field(
        chunks[2],
        f,
        "Coluna alvo (ex: comprou)",
        &state.target_column,
        state.focus == Focus::Target,
        false,
    );

    let in_flight = controller.is_in_flight();
    let button_style = if in_flight {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Black).bg(Color::Blue)
    };
    let button = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {} ", submit_label(in_flight)), button_style),
        Span::raw("  "),
        Span::styled("F1 ajuda", Style::default().fg(Color::Gray)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(button, chunks[3]);

    if state.show_help {
        help::draw_help(chunks[4], f);
    } else {
        draw_results(chunks[4], f, state, controller);
    }

    let status = Paragraph::new(state.info.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[5]);
}

fn draw_field(
    area: Rect,
    f: &mut ratatui::Frame,
    title: &str,
    value: &str,
    focused: bool,
    error: bool,
) {
    let border = match (error, focused) {
        (true, _) => Style::default().fg(Color::Red),
        (false, true) => Style::default().fg(Color::Yellow),
        (false, false) => Style::default(),
    };
    let mut spans = vec![Span::raw(value.to_string())];
    if focused {
        spans.push(Span::styled("▏", Style::default().fg(Color::Yellow)));
    }
    let p = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title.to_string()),
    );
    f.render_widget(p, area);
}

fn draw_results(
    area: Rect,
    f: &mut ratatui::Frame,
    state: &UiState,
    controller: &SubmissionController,
) {
    let lines: Vec<Line> = match controller.status() {
        SubmissionStatus::Idle => vec![Line::styled(
            "Nenhum resultado ainda.",
            Style::default().fg(Color::Gray),
        )],
        SubmissionStatus::Submitting { id } => vec![Line::styled(
            format!("Processando... ({id})"),
            Style::default().fg(Color::Yellow),
        )],
        SubmissionStatus::Failed(reason) => vec![
            Line::styled(
                crate::model::FAILURE_NOTICE,
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Line::styled(reason.clone(), Style::default().fg(Color::Red)),
        ],
        SubmissionStatus::Succeeded(_) => state
            .result_lines
            .iter()
            .map(|l| Line::from(l.clone()))
            .collect(),
    };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Resultado"));
    f.render_widget(p, area);
}
