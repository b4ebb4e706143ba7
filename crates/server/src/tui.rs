use std::collections::VecDeque;

use crossterm::event::KeyCode;
use glam::Vec3;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};

use brickface::{BalanceMode, CharacterId, ConnectionId};

use crate::server::ServerStats;

const MAX_LOG_LINES: usize = 500;

#[derive(Debug, Clone)]
pub struct CharacterInfo {
    pub id: CharacterId,
    pub owner: ConnectionId,
    pub name: String,
    pub balance_mode: BalanceMode,
    pub on_floor: bool,
    pub moving: bool,
    pub snapshots_sent: u64,
    pub position: Vec3,
}

#[derive(Debug, Clone)]
struct LogLine {
    level: log::Level,
    message: String,
}

#[derive(Debug, Default)]
pub struct TuiState {
    logs: VecDeque<LogLine>,
    /// Lines scrolled up from the bottom.
    scroll: usize,
}

impl TuiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, level: log::Level, message: impl Into<String>) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(LogLine {
            level,
            message: message.into(),
        });
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.log(log::Level::Info, message);
    }

    /// Applies one key press. Returns true when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::PageUp => self.scroll_up(),
            KeyCode::PageDown => self.scroll_down(),
            KeyCode::End => self.scroll_to_bottom(),
            _ => {}
        }
        false
    }

    pub fn scroll_up(&mut self) {
        self.scroll = (self.scroll + 5).min(self.logs.len().saturating_sub(1));
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_sub(5);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &ServerStats, characters: &[CharacterInfo]) {
    let character_rows = (characters.len().max(1) + 3) as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(character_rows.min(14)),
            Constraint::Length(7),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_status(frame, chunks[1], stats);
    render_characters(frame, chunks[2], characters);
    render_network(frame, chunks[3], stats);
    render_logs(frame, chunks[4], state);
    render_help(frame, chunks[5]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let uptime = format_duration(stats.uptime_secs);
    let title = format!(" Brickface Server - Uptime: {} ", uptime);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "Tick: {}  |  Clients: {}  |  Characters: {}  |  Rejected: {}",
        stats.tick, stats.client_count, stats.character_count, stats.rejected
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let max = stats.max_clients.max(1);
    let client_ratio = stats.client_count as f64 / max as f64;
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(client_ratio.min(1.0))
        .label(format!("{}/{} clients", stats.client_count, max));

    frame.render_widget(gauge, area);
}

fn render_characters(frame: &mut Frame, area: Rect, characters: &[CharacterInfo]) {
    let block = Block::default()
        .title(" Characters ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let header = Line::from(Span::styled(
        format!(
            "{:>4} {:>5} {:<16} {:<18} {:<6} {:<6} {:>8}  {}",
            "id", "owner", "name", "balance", "floor", "move", "snaps", "torso"
        ),
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::BOLD),
    ));

    let mut lines = vec![header];
    if characters.is_empty() {
        lines.push(Line::from(Span::styled(
            "no characters",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for c in characters {
        let floor_style = if c.on_floor {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::Yellow)
        };
        lines.push(Line::from(vec![
            Span::raw(format!(
                "{:>4} {:>5} {:<16} {:<18} ",
                c.id,
                c.owner,
                truncate(&c.name, 16),
                c.balance_mode.as_str()
            )),
            Span::styled(
                format!("{:<6} ", if c.on_floor { "yes" } else { "air" }),
                floor_style,
            ),
            Span::raw(format!(
                "{:<6} {:>8}  ({:.2}, {:.2}, {:.2})",
                if c.moving { "yes" } else { "no" },
                c.snapshots_sent,
                c.position.x,
                c.position.y,
                c.position.z
            )),
        ]));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_network(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let net = &stats.network_stats;
    let lines = vec![
        Line::from(vec![
            Span::styled("Packets: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} sent / {} recv", net.packets_sent, net.packets_received),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Bytes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {} recv",
                    format_bytes(net.bytes_sent),
                    format_bytes(net.bytes_received)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Simulated: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} dropped / {} delayed",
                    net.packets_dropped, stats.delayed_packets
                ),
                Style::default().fg(if net.packets_dropped > 0 {
                    Color::Red
                } else {
                    Color::White
                }),
            ),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn render_logs(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let end = state.logs.len().saturating_sub(state.scroll);
    let start = end.saturating_sub(visible);

    let lines: Vec<Line> = state
        .logs
        .iter()
        .skip(start)
        .take(end - start)
        .map(|line| {
            let color = match line.level {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                _ => Color::White,
            };
            Line::from(vec![
                Span::styled(
                    format!("{:<5} ", line.level),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(line.message.clone(), Style::default().fg(color)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("q/ESC quit  |  PgUp/PgDn scroll log  |  End follow log")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );

    frame.render_widget(text, area);
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max.saturating_sub(1)).chain(['~']).collect()
    }
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded() {
        let mut state = TuiState::new();
        for i in 0..MAX_LOG_LINES + 10 {
            state.log_info(format!("line {i}"));
        }
        assert_eq!(state.logs.len(), MAX_LOG_LINES);
        assert_eq!(state.logs.front().map(|l| l.message.as_str()), Some("line 10"));
    }

    #[test]
    fn scrolling_stays_in_range() {
        let mut state = TuiState::new();
        state.scroll_up();
        assert_eq!(state.scroll, 0);
        for _ in 0..3 {
            state.log_info("x");
        }
        state.scroll_up();
        assert_eq!(state.scroll, 2);
        state.scroll_down();
        assert_eq!(state.scroll, 0);
    }

    #[test]
    fn quit_keys() {
        let mut state = TuiState::new();
        assert!(state.handle_key(KeyCode::Char('q')));
        assert!(state.handle_key(KeyCode::Esc));
        assert!(!state.handle_key(KeyCode::PageUp));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("Ada", 16), "Ada");
        assert_eq!(truncate("abcdefgh", 4), "abc~");
    }

    #[test]
    fn byte_units() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
    }
}
