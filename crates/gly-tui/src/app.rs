//! App: terminal presentation layer.
//!
//! - Renders from `PlayerState` copies taken from the `StateStore` and from
//!   download snapshots read off the `DownloadManager`.
//! - A `tokio::mpsc` channel carries `AppMessage`s in from the key reader
//!   and the broadcast forwarder; the loop redraws only after a message.
//! - Key presses resolve to `Action`s; intents leave as `CoreEvent::Intent`.

use std::collections::HashMap;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use gly_proto::catalog::Episode;
use gly_proto::protocol::{
    Command, DownloadFailure, DownloadSnapshot, DownloadState, Notice, PlaybackMode,
};
use gly_proto::state::{CatalogState, PlayerState, StateStore};
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use unicode_width::UnicodeWidthStr;

use crate::action::Action;
use crate::core::CoreEvent;
use crate::download_manager::DownloadManager;
use crate::theme::{
    style_border, style_default, style_live_badge, style_muted, style_playing, style_secondary,
    style_selected, C_ACCENT, C_BG, C_CONNECTING, C_DOWNLOAD, C_ERROR, C_MUTED, C_PLAYING,
};
use crate::transport::Transport;
use crate::widgets::progress_bar::draw_progress;
use crate::widgets::status_bar::{draw_keys_bar, InputMode};
use crate::widgets::toast::{Severity, ToastManager};
use crate::widgets::url_input::{InputAction, UrlInput};
use crate::BroadcastMessage;

type Tui = Terminal<CrosstermBackend<Stdout>>;

const CATALOG_LOADING: &str = "Loading episodes…";

#[derive(Debug)]
enum AppMessage {
    Input(Event),
    StateUpdated(PlayerState),
    DownloadsUpdated,
    Notice(Notice),
}

pub struct App<T: Transport> {
    store: Arc<StateStore>,
    downloads: Arc<DownloadManager<T>>,
    event_tx: mpsc::Sender<CoreEvent>,
    station_name: String,
    /// Sleep-timer menu rows: configured minutes, then 0 for "cancel".
    timer_options: Vec<u32>,
    state: PlayerState,
    download_view: HashMap<String, DownloadSnapshot>,
    selected: usize,
    list_state: ListState,
    mode: InputMode,
    url_input: UrlInput,
    toast: ToastManager,
    should_quit: bool,
}

impl<T: Transport> App<T> {
    pub fn new(
        store: Arc<StateStore>,
        downloads: Arc<DownloadManager<T>>,
        event_tx: mpsc::Sender<CoreEvent>,
        station_name: String,
        timer_choices: &[u32],
    ) -> Self {
        let mut timer_options: Vec<u32> = timer_choices.iter().copied().filter(|m| *m > 0).collect();
        timer_options.push(0);
        Self {
            store,
            downloads,
            event_tx,
            station_name,
            timer_options,
            state: PlayerState::default(),
            download_view: HashMap::new(),
            selected: 0,
            list_state: ListState::default(),
            mode: InputMode::Normal,
            url_input: UrlInput::default(),
            toast: ToastManager::new(),
            should_quit: false,
        }
    }

    pub async fn run(mut self, broadcast_rx: broadcast::Receiver<BroadcastMessage>) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal, broadcast_rx).await;
        restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Tui,
        mut bc_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard events ──────────────────────────────────
        let input_tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            while !input_tx.is_closed() {
                match event::poll(Duration::from_millis(200)) {
                    Ok(true) => match event::read() {
                        Ok(ev) => {
                            if input_tx.blocking_send(AppMessage::Input(ev)).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        });

        // ── Background task: broadcast receiver (Core → AppMessage) ───────────
        let bc_tx = tx.clone();
        let bc_store = Arc::clone(&self.store);
        tokio::spawn(async move {
            loop {
                let msg = match bc_rx.recv().await {
                    Ok(BroadcastMessage::StateUpdated) => {
                        AppMessage::StateUpdated(bc_store.get_state().await)
                    }
                    Ok(BroadcastMessage::DownloadsUpdated) => AppMessage::DownloadsUpdated,
                    Ok(BroadcastMessage::Notice(n)) => AppMessage::Notice(n),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                        AppMessage::StateUpdated(bc_store.get_state().await)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if bc_tx.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let initial = self.store.get_state().await;
        self.apply_state(initial);
        self.download_view = self.downloads.snapshots();

        // Toast expiry + spinner animation.
        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                    // Coalesce bursts (download progress) into one frame.
                    while let Ok(next) = rx.try_recv() {
                        needs_redraw |= self.handle_message(next).await;
                    }
                }
                _ = toast_tick.tick() => {
                    needs_redraw = !self.toast.is_empty();
                    self.toast.tick();
                }
            }
        }
        info!("App: quitting");
        Ok(())
    }

    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Input(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                for action in self.handle_key(key) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Input(Event::Resize(_, _)) => true,
            AppMessage::Input(_) => false,
            AppMessage::StateUpdated(state) => {
                self.apply_state(state);
                true
            }
            AppMessage::DownloadsUpdated => {
                self.download_view = self.downloads.snapshots();
                true
            }
            AppMessage::Notice(notice) => {
                self.toast.notice(&notice);
                true
            }
        }
    }

    fn apply_state(&mut self, state: PlayerState) {
        if state.rev < self.state.rev {
            return;
        }
        match state.catalog {
            CatalogState::Loading => self.toast.spinner(CATALOG_LOADING),
            _ => self.toast.dismiss_spinner(),
        }
        let len = state.catalog.episodes().len();
        self.selected = self.selected.min(len.saturating_sub(1));
        self.state = state;
    }

    fn selected_episode(&self) -> Option<&Episode> {
        self.state.catalog.episodes().get(self.selected)
    }

    // ── keys ──────────────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return vec![Action::Quit];
        }

        match self.mode {
            InputMode::UrlInput => match self.url_input.handle_key(key) {
                InputAction::Submitted(url) => {
                    vec![Action::CloseOverlay, Action::Send(Command::SetCatalogUrl { url })]
                }
                InputAction::Cancelled => vec![Action::CloseOverlay],
                InputAction::Editing => vec![],
            },

            InputMode::TimerMenu(row) => match key.code {
                KeyCode::Up | KeyCode::Char('k') => vec![Action::TimerMenuMove(-1)],
                KeyCode::Down | KeyCode::Char('j') => vec![Action::TimerMenuMove(1)],
                KeyCode::Enter => {
                    let minutes = self.timer_options.get(row).copied().unwrap_or(0);
                    vec![Action::CloseOverlay, Action::Send(Command::ArmTimer { minutes })]
                }
                KeyCode::Esc | KeyCode::Char('t') | KeyCode::Char('q') => vec![Action::CloseOverlay],
                _ => vec![],
            },

            InputMode::Normal => match key.code {
                KeyCode::Char('q') => vec![Action::Quit],
                KeyCode::Char(' ') => vec![Action::Send(Command::TogglePause)],
                KeyCode::Char('l') => vec![Action::Send(Command::PlayLive)],
                KeyCode::Char('r') => vec![Action::Send(Command::RefreshCatalog)],
                KeyCode::Char('t') => vec![Action::OpenTimerMenu],
                KeyCode::Char('u') => vec![Action::OpenUrlInput],
                KeyCode::Up | KeyCode::Char('k') => vec![Action::SelectUp],
                KeyCode::Down | KeyCode::Char('j') => vec![Action::SelectDown],
                KeyCode::Home | KeyCode::Char('g') => vec![Action::SelectFirst],
                KeyCode::End | KeyCode::Char('G') => vec![Action::SelectLast],
                KeyCode::Enter | KeyCode::Char('d') => {
                    let Some(ep) = self.selected_episode().cloned() else {
                        return vec![];
                    };
                    if !ep.is_playable() {
                        debug!("App: \"{}\" has no stream URL", ep.title);
                        self.toast.push("This episode has no audio link", Severity::Warning);
                        return vec![];
                    }
                    let cmd = if key.code == KeyCode::Enter {
                        Command::PlayOnDemand {
                            title: ep.display_title(),
                            url: ep.url,
                        }
                    } else {
                        Command::ToggleDownload {
                            url: ep.url,
                            title: ep.title,
                            date: ep.date,
                        }
                    };
                    vec![Action::Send(cmd)]
                }
                _ => vec![],
            },
        }
    }

    async fn dispatch(&mut self, action: Action) {
        let len = self.state.catalog.episodes().len();
        match action {
            Action::Send(cmd) => {
                if self.event_tx.send(CoreEvent::Intent(cmd)).await.is_err() {
                    error!("App: core loop is gone");
                    self.should_quit = true;
                }
            }
            Action::SelectUp => self.selected = self.selected.saturating_sub(1),
            Action::SelectDown => self.selected = (self.selected + 1).min(len.saturating_sub(1)),
            Action::SelectFirst => self.selected = 0,
            Action::SelectLast => self.selected = len.saturating_sub(1),
            Action::OpenTimerMenu => self.mode = InputMode::TimerMenu(0),
            Action::TimerMenuMove(delta) => {
                if let InputMode::TimerMenu(row) = self.mode {
                    let last = self.timer_options.len().saturating_sub(1);
                    let row = row.saturating_add_signed(delta).min(last);
                    self.mode = InputMode::TimerMenu(row);
                }
            }
            Action::OpenUrlInput => {
                self.url_input.open(&self.state.catalog_url);
                self.mode = InputMode::UrlInput;
            }
            Action::CloseOverlay => self.mode = InputMode::Normal,
            Action::Quit => self.should_quit = true,
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(5),
                Constraint::Length(1),
            ])
            .split(area);

        self.draw_header(frame, outer[0]);
        self.draw_episodes(frame, outer[1]);
        self.draw_player(frame, outer[2]);

        match self.mode {
            InputMode::UrlInput => self.url_input.draw(frame, outer[3]),
            mode => draw_keys_bar(frame, outer[3], mode),
        }
        if let InputMode::TimerMenu(row) = self.mode {
            self.draw_timer_menu(frame, area, row);
        }

        self.toast.draw(frame, area);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled(" gly ", Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)),
            Span::styled(self.station_name.clone(), style_default()),
        ];
        if self.state.session.is_live_stream() {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(" LIVE ", style_live_badge()));
        }
        let active = self.downloads.active_count();
        if active > 0 {
            spans.push(Span::styled(
                format!("  ↓{}", active),
                Style::default().fg(C_DOWNLOAD),
            ));
        }
        let left = Line::from(spans);
        let source = Line::from(Span::styled(self.state.catalog_url.clone(), style_muted()));

        let source_w = (self.state.catalog_url.width() as u16).min(area.width / 2);
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(10), Constraint::Length(source_w + 1)])
            .split(area);
        frame.render_widget(Paragraph::new(left), cols[0]);
        frame.render_widget(Paragraph::new(source).alignment(Alignment::Right), cols[1]);
    }

    fn draw_episodes(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style_border())
            .title(Span::styled(episodes_title(&self.state.catalog), style_secondary()));

        let placeholder = match &self.state.catalog {
            CatalogState::Idle | CatalogState::Loading => {
                Some(Line::from(Span::styled(CATALOG_LOADING, style_secondary())))
            }
            CatalogState::Failed { message } => Some(Line::from(Span::styled(
                format!("Could not load episodes: {}  (r to retry, u to change source)", message),
                Style::default().fg(C_ERROR),
            ))),
            CatalogState::Ready { episodes, .. } if episodes.is_empty() => {
                Some(Line::from(Span::styled("No episodes published.", style_secondary())))
            }
            CatalogState::Ready { .. } => None,
        };
        if let Some(line) = placeholder {
            frame.render_widget(
                Paragraph::new(line).block(block).wrap(Wrap { trim: true }),
                area,
            );
            return;
        }

        let current_url = self.state.session.current_url.as_deref();
        let items: Vec<ListItem> = self
            .state
            .catalog
            .episodes()
            .iter()
            .map(|ep| {
                let playing = current_url == Some(ep.url.as_str()) && ep.is_playable();
                episode_item(ep, self.download_view.get(&ep.url), playing)
            })
            .collect();

        self.list_state.select(Some(self.selected));
        let list = List::new(items)
            .block(block)
            .highlight_style(style_selected())
            .highlight_symbol("▸ ");
        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn draw_player(&self, frame: &mut Frame, area: Rect) {
        let session = &self.state.session;
        let mut title = Block::default()
            .borders(Borders::ALL)
            .border_style(style_border())
            .title(Span::styled(format!(" {} ", mode_label(session.mode)), style_secondary()));
        if !self.state.timer.display.is_empty() {
            title = title.title_top(
                Line::from(Span::styled(
                    format!(" ⏾ {} ", self.state.timer.display),
                    Style::default().fg(C_CONNECTING),
                ))
                .right_aligned(),
            );
        }
        let inner = title.inner(area);
        frame.render_widget(title, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(1)])
            .split(inner);

        let label: Vec<Line> = if session.current_title.is_empty() {
            vec![Line::from(Span::styled("Nothing playing", style_muted()))]
        } else {
            session
                .current_title
                .lines()
                .enumerate()
                .map(|(i, l)| {
                    let style = if i == 0 { style_default() } else { style_secondary() };
                    Line::from(Span::styled(l.to_string(), style))
                })
                .collect()
        };
        frame.render_widget(Paragraph::new(label), rows[0]);

        if session.is_live_stream() {
            let color = if session.mode == PlaybackMode::LoadingLive {
                C_CONNECTING
            } else {
                C_PLAYING
            };
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::styled("● ", Style::default().fg(color)),
                    Span::styled("live broadcast", style_secondary()),
                ])),
                rows[1],
            );
        } else if session.mode != PlaybackMode::Stopped {
            draw_progress(
                frame,
                rows[1],
                session.progress().unwrap_or(0.0),
                session.position_display.as_deref(),
                session.duration_display.as_deref(),
                C_PLAYING,
            );
        }
    }

    fn draw_timer_menu(&self, frame: &mut Frame, area: Rect, row: usize) {
        let h = self.timer_options.len() as u16 + 2;
        let w = 24u16.min(area.width);
        let popup = Rect {
            x: area.x + area.width.saturating_sub(w) / 2,
            y: area.y + area.height.saturating_sub(h) / 2,
            width: w,
            height: h.min(area.height),
        };
        let items: Vec<ListItem> = self
            .timer_options
            .iter()
            .map(|m| ListItem::new(timer_option_label(*m)))
            .collect();
        let mut state = ListState::default().with_selected(Some(row));
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(C_CONNECTING))
                    .title(" Sleep timer "),
            )
            .style(Style::default().bg(C_BG))
            .highlight_style(style_selected())
            .highlight_symbol("▸ ");
        frame.render_widget(Clear, popup);
        frame.render_stateful_widget(list, popup, &mut state);
    }
}

fn mode_label(mode: PlaybackMode) -> &'static str {
    match mode {
        PlaybackMode::Stopped => "stopped",
        PlaybackMode::LoadingLive => "connecting",
        PlaybackMode::PlayingLive | PlaybackMode::PlayingOnDemand => "playing",
        PlaybackMode::Paused => "paused",
    }
}

/// Episode panel title, with the fetch time once a catalog is loaded.
fn episodes_title(catalog: &CatalogState) -> String {
    match catalog {
        CatalogState::Ready { fetched_at, .. } => {
            format!(" Episodes · updated {} ", fetched_at.format("%H:%M"))
        }
        _ => " Episodes ".to_string(),
    }
}

fn timer_option_label(minutes: u32) -> String {
    if minutes == 0 {
        "Cancel timer".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}

/// Download status shown at the end of an episode row.
fn download_label(snapshot: &DownloadSnapshot) -> Option<String> {
    match snapshot.state {
        DownloadState::Idle => None,
        DownloadState::Completed => {
            Some(format!("saved → {}", snapshot.target_path.display()))
        }
        _ => Some(snapshot.status_text()),
    }
}

fn episode_item<'a>(ep: &'a Episode, download: Option<&DownloadSnapshot>, playing: bool) -> ListItem<'a> {
    let title_style = if playing {
        style_playing()
    } else if ep.is_playable() {
        style_default()
    } else {
        style_muted()
    };
    let mut spans = vec![
        Span::styled(format!("{:<12}", ep.date), style_secondary()),
        Span::styled(ep.title.as_str(), title_style),
    ];
    if let Some(snap) = download {
        if let Some(label) = download_label(snap) {
            let color = match (snap.state, &snap.failure) {
                (DownloadState::Running, _) => C_DOWNLOAD,
                (DownloadState::Cancelling, _) => C_CONNECTING,
                (DownloadState::Completed, _) => C_PLAYING,
                (_, Some(DownloadFailure::Error(_))) => C_ERROR,
                _ => C_MUTED,
            };
            spans.push(Span::raw("  "));
            spans.push(Span::styled(label, Style::default().fg(color)));
        }
    }
    ListItem::new(Line::from(spans))
}

// ── terminal setup ────────────────────────────────────────────────────────────

fn setup_terminal() -> anyhow::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Tui) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Full-screen error for failures before the app could start.  Waits for a
/// key press.  Errors here mean the terminal itself is unusable.
pub fn show_fatal(message: &str) -> anyhow::Result<()> {
    let mut terminal = setup_terminal()?;
    let drawn = terminal.draw(|frame| {
        let area = frame.area();
        let text = vec![
            Line::from(Span::styled(
                "gly could not start",
                Style::default().fg(C_ERROR).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(message.to_string(), style_default())),
            Line::from(""),
            Line::from(Span::styled("Press any key to exit.", style_muted())),
        ];
        frame.render_widget(
            Paragraph::new(text)
                .wrap(Wrap { trim: false })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(C_ERROR)),
                )
                .style(Style::default().bg(C_BG)),
            area,
        );
    });
    let waited = drawn.map_err(anyhow::Error::from).and_then(|_| loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                break Ok(());
            }
        }
    });
    restore_terminal(&mut terminal)?;
    waited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use chrono::{Local, TimeZone};
    use std::path::PathBuf;

    fn episode(title: &str, url: &str) -> Episode {
        Episode {
            title: title.into(),
            date: "2024-03-05".into(),
            url: url.into(),
        }
    }

    fn app() -> (App<FakeTransport>, mpsc::Receiver<CoreEvent>) {
        let (bcast, _) = broadcast::channel(16);
        let downloads = Arc::new(DownloadManager::new(
            FakeTransport::new(),
            PathBuf::from("/tmp/gly-test"),
            Duration::from_secs(5),
            bcast,
        ));
        let store = Arc::new(StateStore::new("https://site.example/p.json".into()));
        let (tx, rx) = mpsc::channel(16);
        let mut app = App::new(store, downloads, tx, "Station".into(), &[15, 30, 60]);
        app.apply_state(PlayerState {
            rev: 5,
            catalog_url: "https://site.example/p.json".into(),
            catalog: CatalogState::Ready {
                episodes: vec![
                    episode("Morning", "https://cdn.example/m.mp3"),
                    episode("Broken", ""),
                ],
                fetched_at: Local::now(),
            },
            ..Default::default()
        });
        (app, rx)
    }

    async fn press(app: &mut App<FakeTransport>, code: KeyCode) {
        for action in app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)) {
            app.dispatch(action).await;
        }
    }

    fn sent(rx: &mut mpsc::Receiver<CoreEvent>) -> Vec<Command> {
        let mut out = Vec::new();
        while let Ok(CoreEvent::Intent(cmd)) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[tokio::test]
    async fn test_enter_and_d_act_on_selected_episode() {
        let (mut app, mut rx) = app();
        press(&mut app, KeyCode::Enter).await;
        press(&mut app, KeyCode::Char('d')).await;
        assert_eq!(
            sent(&mut rx),
            vec![
                Command::PlayOnDemand {
                    url: "https://cdn.example/m.mp3".into(),
                    title: "2024-03-05 Morning".into(),
                },
                Command::ToggleDownload {
                    url: "https://cdn.example/m.mp3".into(),
                    title: "Morning".into(),
                    date: "2024-03-05".into(),
                },
            ]
        );

        press(&mut app, KeyCode::Down).await;
        press(&mut app, KeyCode::Down).await;
        assert_eq!(app.selected, 1);
        press(&mut app, KeyCode::Enter).await;
        press(&mut app, KeyCode::Char('d')).await;
        assert!(sent(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_timer_menu_choices() {
        let (mut app, mut rx) = app();
        press(&mut app, KeyCode::Char('t')).await;
        assert_eq!(app.mode, InputMode::TimerMenu(0));
        press(&mut app, KeyCode::Down).await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.mode, InputMode::Normal);

        press(&mut app, KeyCode::Char('t')).await;
        for _ in 0..10 {
            press(&mut app, KeyCode::Down).await;
        }
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(
            sent(&mut rx),
            vec![Command::ArmTimer { minutes: 30 }, Command::ArmTimer { minutes: 0 }]
        );
    }

    #[tokio::test]
    async fn test_url_input_submits_new_source() {
        let (mut app, mut rx) = app();
        press(&mut app, KeyCode::Char('u')).await;
        assert_eq!(app.mode, InputMode::UrlInput);
        // 'q' is text while editing, not quit
        press(&mut app, KeyCode::Char('q')).await;
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(
            sent(&mut rx),
            vec![Command::SetCatalogUrl {
                url: "https://site.example/p.jsonq".into()
            }]
        );
        assert_eq!(app.mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_stale_state_is_ignored() {
        let (mut app, _rx) = app();
        app.apply_state(PlayerState {
            rev: 1,
            ..Default::default()
        });
        assert_eq!(app.state.catalog.episodes().len(), 2);
    }

    #[test]
    fn test_episodes_title_shows_fetch_time() {
        let fetched_at = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap();
        let ready = CatalogState::Ready {
            episodes: vec![],
            fetched_at,
        };
        assert_eq!(episodes_title(&ready), " Episodes · updated 14:07 ");
        assert_eq!(episodes_title(&CatalogState::Loading), " Episodes ");
    }

    #[test]
    fn test_completed_download_row_shows_path() {
        let snap = DownloadSnapshot {
            url: "u".into(),
            title: "Morning".into(),
            date: "2024".into(),
            state: DownloadState::Completed,
            bytes_total: Some(10),
            bytes_written: 10,
            target_path: PathBuf::from("/music/2024_Morning.mp3"),
            failure: None,
        };
        assert_eq!(
            download_label(&snap).as_deref(),
            Some("saved → /music/2024_Morning.mp3")
        );
        let idle = DownloadSnapshot {
            state: DownloadState::Idle,
            ..snap
        };
        assert_eq!(download_label(&idle), None);
    }
}
