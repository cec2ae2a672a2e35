use std::collections::VecDeque;
use std::time::Instant;

use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Sparkline, Table, Wrap};
use ratatui::Frame;

use crate::connection::RemoteStats;

/// One `stats-json` poll.
#[derive(Debug, Clone)]
pub struct Sample {
    pub at: Instant,
    pub ticks: u64,
    pub entities: u64,
}

pub struct UiState {
    pub samples: VecDeque<Sample>,
    pub tick_rates: VecDeque<u64>,
    pub max_history: usize,
    pub latest: Option<RemoteStats>,
    pub logs: VecDeque<String>,
    pub max_logs: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            samples: VecDeque::new(),
            tick_rates: VecDeque::new(),
            max_history: 120,
            latest: None,
            logs: VecDeque::new(),
            max_logs: 8,
        }
    }
}

impl UiState {
    pub fn push_stats(&mut self, stats: RemoteStats, at: Instant) {
        let sample = Sample {
            at,
            ticks: stats.ticks,
            entities: stats.stats["entities"].as_u64().unwrap_or(0),
        };
        if let Some(previous) = self.samples.back() {
            let elapsed = sample.at.duration_since(previous.at).as_secs_f64();
            if elapsed > 0.0 {
                let rate = sample.ticks.saturating_sub(previous.ticks) as f64 / elapsed;
                self.tick_rates.push_back(rate.round() as u64);
            }
        }
        self.samples.push_back(sample);
        while self.samples.len() > self.max_history {
            self.samples.pop_front();
        }
        while self.tick_rates.len() > self.max_history {
            self.tick_rates.pop_front();
        }
        self.latest = Some(stats);
    }

    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }

    pub fn tick_rate(&self) -> u64 {
        self.tick_rates.back().copied().unwrap_or(0)
    }

    pub fn entity_history(&self) -> Vec<u64> {
        self.samples.iter().map(|sample| sample.entities).collect()
    }

    /// Key/value rows of the latest stats object, ticks first.
    pub fn stat_rows(&self) -> Vec<(String, String)> {
        let Some(latest) = &self.latest else {
            return Vec::new();
        };
        let mut rows = vec![("ticks".to_string(), latest.ticks.to_string())];
        match latest.stats.as_object() {
            Some(fields) => rows.extend(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_string())),
            ),
            None => rows.push(("stats".to_string(), latest.stats.to_string())),
        }
        rows
    }
}

pub fn draw_ui(frame: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Min(5),
            Constraint::Length(10),
        ])
        .split(frame.size());

    draw_header(frame, chunks[0]);
    draw_sparkline(
        frame,
        chunks[1],
        &format!("Ticks/s {}", state.tick_rate()),
        &state.tick_rates.iter().copied().collect::<Vec<_>>(),
        Color::Green,
    );
    draw_sparkline(
        frame,
        chunks[2],
        &format!(
            "Entities {}",
            state.samples.back().map_or(0, |sample| sample.entities)
        ),
        &state.entity_history(),
        Color::Cyan,
    );
    draw_stats(frame, chunks[3], state);
    draw_logs(frame, chunks[4], state);
}

fn draw_header(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Live Console Monitor");
    let line = Line::from(vec![
        Span::styled("p", Style::default().fg(Color::Yellow)),
        Span::raw(" pause | "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" resume | "),
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(" shrink | "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw("/Esc back to the prompt"),
    ]);
    let text = Paragraph::new(line).wrap(Wrap { trim: true });
    frame.render_widget(block, area);
    frame.render_widget(
        text,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_sparkline(frame: &mut Frame, area: Rect, title: &str, data: &[u64], color: Color) {
    // Keep the newest samples when the history is wider than the pane.
    let width = area.width.saturating_sub(2) as usize;
    let visible = &data[data.len().saturating_sub(width)..];
    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .data(visible)
        .style(Style::default().fg(color));
    frame.render_widget(sparkline, area);
}

fn draw_stats(frame: &mut Frame, area: Rect, state: &UiState) {
    let rows: Vec<Row> = state
        .stat_rows()
        .into_iter()
        .map(|(key, value)| Row::new(vec![key, value]))
        .collect();
    let table = Table::new(rows, [Constraint::Length(16), Constraint::Min(10)])
        .block(Block::default().borders(Borders::ALL).title("Stats"))
        .style(Style::default().fg(Color::White));
    frame.render_widget(table, area);
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Logs");
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}
