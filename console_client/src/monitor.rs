use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use console_core::{Console, Inspect};
use crossterm::event::{self, Event, KeyCode};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::connection::{RemoteConsole, RemoteStats};
use crate::logs::LogLines;
use crate::ui::{draw_ui, UiState};

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Show the dashboard until the user leaves it. Stats are polled on the
/// caller's task; the terminal is driven from a blocking thread.
pub async fn run(console: &mut RemoteConsole, logs: LogLines) -> Result<()> {
    let (stats_tx, stats_rx) = mpsc::channel::<RemoteStats>();
    let (command_tx, command_rx) = mpsc::channel::<&'static str>();
    let ui = tokio::task::spawn_blocking(move || -> Result<()> {
        let app = MonitorApp::new(stats_rx, command_tx, logs)?;
        app.run()
    });

    let polled = poll(console, &ui, stats_tx, command_rx).await;
    let shown = ui.await?;
    polled?;
    shown
}

async fn poll(
    console: &mut RemoteConsole,
    ui: &JoinHandle<Result<()>>,
    stats_tx: Sender<RemoteStats>,
    command_rx: Receiver<&'static str>,
) -> Result<()> {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    while !ui.is_finished() {
        interval.tick().await;
        while let Ok(command) = command_rx.try_recv() {
            let reply = console.exchange(command).await?;
            info!(command, reply = reply.trim(), "monitor.command_sent");
        }
        let stats = console.stats().await?;
        if stats_tx.send(stats).is_err() {
            break;
        }
    }
    Ok(())
}

/// Show the dashboard for a console in this process. The terminal is driven
/// from the calling thread, which may hold the stdout lock of a local
/// session; stats are polled from a helper thread.
pub fn run_local<T>(console: &Arc<Console<T>>, logs: LogLines) -> Result<()>
where
    T: Inspect + Send + 'static,
{
    let (stats_tx, stats_rx) = mpsc::channel::<RemoteStats>();
    let (command_tx, command_rx) = mpsc::channel::<&'static str>();
    let poller = {
        let console = Arc::clone(console);
        thread::Builder::new()
            .name("monitor-poll".to_string())
            .spawn(move || poll_local(&console, stats_tx, command_rx))?
    };

    let shown = MonitorApp::new(stats_rx, command_tx, logs).and_then(MonitorApp::run);
    let polled = poller
        .join()
        .map_err(|_| eyre!("monitor poll thread panicked"))?;
    shown?;
    polled
}

fn poll_local<T>(
    console: &Arc<Console<T>>,
    stats_tx: Sender<RemoteStats>,
    command_rx: Receiver<&'static str>,
) -> Result<()>
where
    T: Inspect + Send + 'static,
{
    loop {
        loop {
            match command_rx.try_recv() {
                Ok(command) => {
                    let reply = console.submit(command);
                    info!(command, reply = reply.trim(), "monitor.command_sent");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
        let reply = console.submit("stats-json");
        let stats: RemoteStats = serde_json::from_str(reply.trim())
            .wrap_err_with(|| format!("unexpected stats-json reply: {}", reply.trim()))?;
        if stats_tx.send(stats).is_err() {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }
}

pub struct MonitorApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    stats: Receiver<RemoteStats>,
    command_sender: Sender<&'static str>,
    log_receiver: LogLines,
}

impl MonitorApp {
    pub fn new(
        stats: Receiver<RemoteStats>,
        command_sender: Sender<&'static str>,
        log_receiver: LogLines,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            ui_state: UiState::default(),
            stats,
            command_sender,
            log_receiver,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let result = self.event_loop();
        self.terminal.clear()?;
        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        result
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut last_draw = Instant::now();

        loop {
            loop {
                match self.stats.try_recv() {
                    Ok(stats) => self.ui_state.push_stats(stats, Instant::now()),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        warn!("monitor.stats_stream_closed");
                        return Ok(());
                    }
                }
            }

            if let Ok(logs) = self.log_receiver.lock() {
                while let Ok(line) = logs.try_recv() {
                    self.ui_state.push_log(line);
                }
            }

            if last_draw.elapsed() >= Duration::from_millis(100) {
                self.terminal.draw(|frame| draw_ui(frame, &self.ui_state))?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('p') | KeyCode::Char('P') => self.send("pause"),
                        KeyCode::Char('r') | KeyCode::Char('R') => self.send("resume"),
                        KeyCode::Char('s') | KeyCode::Char('S') => self.send("shrink"),
                        _ => {}
                    }
                }
            }
        }
    }

    fn send(&mut self, command: &'static str) {
        if let Err(err) = self.command_sender.send(command) {
            error!("Failed to queue {} command: {}", command, err);
        } else {
            self.ui_state.push_log(format!("Requested {command}"));
        }
    }
}
