use super::View;
use crate::app::AppCommand;
use crate::replay::bookmarks::Bookmarks;
use crate::replay::player::{PlaybackClock, PlaybackState};
use crate::session::Session;
use common::team_name;
use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
};
use std::cell::Cell;

/// Seconds moved by the coarse skip keys
const SKIP_SECONDS: f64 = 5.0;
/// Kill feed lines kept on screen
const KILL_FEED_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
enum LayoutMode {
    SingleColumn,
    TwoColumn,
}

impl LayoutMode {
    fn from_dimensions(width: u16, height: u16) -> Self {
        const MIN_WIDTH_FOR_TWO_COLUMN: u16 = 100;
        const ASPECT_RATIO_THRESHOLD: f32 = 1.8;

        let aspect_ratio = width as f32 / height.max(1) as f32;
        if width >= MIN_WIDTH_FOR_TWO_COLUMN && aspect_ratio >= ASPECT_RATIO_THRESHOLD {
            LayoutMode::TwoColumn
        } else {
            LayoutMode::SingleColumn
        }
    }
}

fn team_color(team: i32) -> Color {
    match team {
        0 => Color::Red,
        1 => Color::Blue,
        2 => Color::Green,
        3 => Color::Yellow,
        _ => Color::Gray,
    }
}

fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0);
    let minutes = (total / 60.0).floor();
    format!("{:02}:{:05.2}", minutes as u64, total - minutes * 60.0)
}

pub struct SessionViewerState {
    kill_scroll: u16,
    /// Inner area of the timeline bar from the last frame, for mouse hits
    timeline_area: Cell<Rect>,
}

impl Default for SessionViewerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionViewerState {
    pub fn new() -> Self {
        Self {
            kill_scroll: 0,
            timeline_area: Cell::new(Rect::default()),
        }
    }

    /// Timeline time under terminal column `column`, if the column is on the bar
    fn time_at_column(&self, clock: &PlaybackClock, column: u16, row: u16) -> Option<f64> {
        let area = self.timeline_area.get();
        if area.width == 0 || row != area.y || column < area.x || column >= area.x + area.width {
            return None;
        }
        let fraction = if area.width > 1 {
            (column - area.x) as f64 / (area.width - 1) as f64
        } else {
            0.0
        };
        Some(clock.min() + fraction * (clock.max() - clock.min()))
    }

    fn render_header(&self, session: &Session) -> Paragraph<'static> {
        let title = match session.clock() {
            Some(clock) => format!(
                "Replay | {} / {} | Speed: {}x | {}",
                format_clock(clock.current() - clock.min()),
                format_clock(clock.max() - clock.min()),
                clock.speed(),
                match clock.state() {
                    PlaybackState::Playing => "▶ Playing",
                    PlaybackState::Paused => "⏸ Paused",
                    PlaybackState::Stopped => "■ Stopped",
                }
            ),
            None => match session.local_addr() {
                Some(addr) => format!("Live | listening on {} | {} players", addr, session.player_names().len()),
                None => "Not listening".to_string(),
            },
        };

        Paragraph::new(title)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
    }

    fn render_timeline(&self, frame: &mut Frame, area: Rect, session: &Session) {
        let block = Block::default().title("Timeline").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.timeline_area.set(Rect { height: 1, ..inner });

        let Some(clock) = session.clock() else {
            frame.render_widget(
                Paragraph::new("Live feed: no timeline").style(Style::default().fg(Color::DarkGray)),
                inner,
            );
            return;
        };

        let width = inner.width as usize;
        if width == 0 {
            return;
        }
        let span = clock.max() - clock.min();
        let column_of = |t: f64| -> usize {
            if span <= 0.0 {
                return 0;
            }
            (((t - clock.min()) / span).clamp(0.0, 1.0) * (width - 1) as f64).round() as usize
        };

        let cursor = column_of(clock.current());
        let marks = clock.bookmarks();
        let start = marks.start().map(column_of);
        let end = marks.end().map(column_of);
        let loop_color = if marks.is_looping() { Color::Magenta } else { Color::Yellow };

        let spans: Vec<Span> = (0..width)
            .map(|column| {
                if column == cursor {
                    Span::styled("●", Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
                } else if Some(column) == start {
                    Span::styled("A", Style::default().fg(loop_color))
                } else if Some(column) == end {
                    Span::styled("B", Style::default().fg(loop_color))
                } else if column < cursor {
                    Span::styled("━", Style::default().fg(Color::Cyan))
                } else {
                    Span::styled("─", Style::default().fg(Color::DarkGray))
                }
            })
            .collect();

        let markers = match *marks {
            Bookmarks::NoMarks => "no markers".to_string(),
            Bookmarks::StartOnly { start } => format!("A {}", format_clock(start - clock.min())),
            Bookmarks::BothSet { start, end, looping } => format!(
                "A {} B {}{}",
                format_clock(start - clock.min()),
                format_clock(end - clock.min()),
                if looping { " (looping)" } else { "" }
            ),
        };

        let lines = vec![
            Line::from(spans),
            Line::from(Span::styled(
                format!("point {}/{} | {}", clock.index() + 1, clock.point_count(), markers),
                Style::default().fg(Color::DarkGray),
            )),
        ];
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn render_scoreboard(&self, frame: &mut Frame, area: Rect, session: &Session) {
        let followed = session.followed();
        let rows: Vec<Row> = session
            .scoreboard()
            .into_iter()
            .map(|line| {
                let state = session.player_state(&line.name);
                let status = if line.disconnected {
                    "disconnected".to_string()
                } else {
                    match &state {
                        Some(state) if state.dead => "dead".to_string(),
                        Some(state) => state.weapon.clone(),
                        None => String::new(),
                    }
                };
                let position = state
                    .as_ref()
                    .map(|state| state.position.to_string())
                    .unwrap_or_default();
                let marker = if followed == Some(line.name.as_str()) { "▶" } else { " " };

                let mut style = Style::default().fg(team_color(line.team));
                if line.disconnected {
                    style = style.add_modifier(Modifier::DIM);
                }
                Row::new(vec![
                    format!("{}{}", marker, line.name),
                    team_name(line.team).to_string(),
                    line.kills.to_string(),
                    line.deaths.to_string(),
                    status,
                    position,
                ])
                .style(style)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Min(14),
                Constraint::Length(7),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(14),
                Constraint::Min(20),
            ],
        )
        .header(
            Row::new(vec!["Player", "Team", "K", "D", "Status", "Position"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().title("Scoreboard").borders(Borders::ALL));

        frame.render_widget(table, area);
    }

    fn render_kill_feed(&self, frame: &mut Frame, area: Rect, session: &Session) {
        let kills = session.kill_feed();
        let lines: Vec<Line> = kills
            .iter()
            .rev()
            .take(KILL_FEED_LINES)
            .map(|kill| {
                Line::from(vec![
                    Span::styled(format!("{:>8.2} ", kill.timestamp), Style::default().fg(Color::DarkGray)),
                    Span::styled(kill.killer.clone(), Style::default().fg(team_color(kill.killer_team))),
                    Span::raw(format!(" [{}] ", kill.weapon)),
                    Span::styled(kill.victim.clone(), Style::default().fg(team_color(kill.victim_team))),
                ])
            })
            .collect();

        let feed = Paragraph::new(lines)
            .block(Block::default().title(format!("Kills ({})", kills.len())).borders(Borders::ALL))
            .scroll((self.kill_scroll, 0));
        frame.render_widget(feed, area);
    }

    fn render_status(&self, session: &Session) -> Paragraph<'static> {
        let follow = match session.follow_target() {
            Some(target) => format!(
                "Following {} at {} facing {:.0}°",
                target.name,
                target.position,
                target.yaw.to_degrees()
            ),
            None => match session.followed() {
                Some(name) => format!("Following {} (no view)", name),
                None => "Free camera".to_string(),
            },
        };

        let estimator = session.estimator();
        let respawn = match estimator.average() {
            Some(average) => format!(
                "Respawn avg {:.1}s over {} | {} disconnected",
                average,
                estimator.sample_count(),
                estimator.disconnected().count()
            ),
            None => "Respawn avg unknown".to_string(),
        };

        let source = match session.replay() {
            Some(replay) => {
                let metadata = &replay.metadata;
                format!(
                    "{} {} | {} rows, {} skipped{}",
                    metadata.map.as_deref().unwrap_or("unknown map"),
                    metadata.game_type.as_deref().unwrap_or(""),
                    metadata.rows_accepted,
                    metadata.rows_skipped,
                    if metadata.complete { "" } else { " | partial load" }
                )
            }
            None => format!("{} players known", session.player_names().len()),
        };

        Paragraph::new(vec![Line::from(follow), Line::from(format!("{} | {}", respawn, source))])
            .block(Block::default().borders(Borders::ALL))
    }

    fn render_controls(&self, session: &Session) -> Paragraph<'static> {
        let lines = if session.clock().is_some() {
            vec![
                Line::from("Space: Play/Pause | r: Reset | h/l: ±5s | j/k: ±1 point | s: Speed | +/-: Faster/Slower"),
                Line::from("b: Bookmark | o: Loop | Tab/Shift+Tab: Follow | f: Free camera | Click: Scrub | Right-click: Marker | q: Back"),
            ]
        } else {
            vec![
                Line::from("Tab/Shift+Tab: Follow | f: Free camera | PageUp/Down: Scroll kills"),
                Line::from("q: Stop listening and go back"),
            ]
        };

        Paragraph::new(lines)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
    }

    fn render_single_column(&self, frame: &mut Frame, session: &Session) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(4),
                Constraint::Min(8),
                Constraint::Length(8),
                Constraint::Length(4),
                Constraint::Length(4),
            ])
            .split(frame.area());

        frame.render_widget(self.render_header(session), chunks[0]);
        self.render_timeline(frame, chunks[1], session);
        self.render_scoreboard(frame, chunks[2], session);
        self.render_kill_feed(frame, chunks[3], session);
        frame.render_widget(self.render_status(session), chunks[4]);
        frame.render_widget(self.render_controls(session), chunks[5]);
    }

    fn render_two_column(&self, frame: &mut Frame, session: &Session) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(4),
                Constraint::Min(10),
                Constraint::Length(4),
                Constraint::Length(4),
            ])
            .split(frame.area());

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[2]);

        frame.render_widget(self.render_header(session), rows[0]);
        self.render_timeline(frame, rows[1], session);
        self.render_scoreboard(frame, columns[0], session);
        self.render_kill_feed(frame, columns[1], session);
        frame.render_widget(self.render_status(session), rows[3]);
        frame.render_widget(self.render_controls(session), rows[4]);
    }
}

impl View for SessionViewerState {
    fn handle_input(&mut self, key: KeyEvent, session: &mut Session) -> Option<AppCommand> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(AppCommand::BackToSelector),
            KeyCode::Char(' ') => session.toggle_play(),
            KeyCode::Char('r') => session.reset(),
            KeyCode::Char('h') | KeyCode::Left => session.skip_seconds(-SKIP_SECONDS),
            KeyCode::Char('l') | KeyCode::Right => session.skip_seconds(SKIP_SECONDS),
            KeyCode::Char('j') => session.skip_ticks(1),
            KeyCode::Char('k') => session.skip_ticks(-1),
            KeyCode::Char('s') => session.cycle_speed(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                if let Some(speed) = session.clock().map(PlaybackClock::speed) {
                    session.set_speed(speed * 2.0);
                }
            }
            KeyCode::Char('-') => {
                if let Some(speed) = session.clock().map(PlaybackClock::speed) {
                    session.set_speed(speed / 2.0);
                }
            }
            KeyCode::Char('b') => session.mark(),
            KeyCode::Char('o') => session.toggle_loop(),
            KeyCode::Tab => session.cycle_follow(true),
            KeyCode::BackTab => session.cycle_follow(false),
            KeyCode::Char('f') => session.follow(None),
            KeyCode::PageUp => self.kill_scroll = self.kill_scroll.saturating_sub(5),
            KeyCode::PageDown => self.kill_scroll = self.kill_scroll.saturating_add(5),
            _ => {}
        }
        None
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, session: &mut Session) -> Option<AppCommand> {
        let at = session
            .clock()
            .and_then(|clock| self.time_at_column(clock, mouse.column, mouse.row))?;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left) => session.scrub(at),
            MouseEventKind::Down(MouseButton::Right) => session.set_marker_at(at),
            _ => {}
        }
        None
    }

    fn render(&self, frame: &mut Frame, session: &Session) {
        match LayoutMode::from_dimensions(frame.area().width, frame.area().height) {
            LayoutMode::SingleColumn => self.render_single_column(frame, session),
            LayoutMode::TwoColumn => self.render_two_column(frame, session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00.00");
        assert_eq!(format_clock(75.5), "01:15.50");
        assert_eq!(format_clock(-3.0), "00:00.00");
    }

    #[test]
    fn test_time_at_column_maps_bar_to_timeline() {
        let viewer = SessionViewerState::new();
        viewer.timeline_area.set(Rect::new(10, 5, 11, 1));
        let clock = PlaybackClock::new(vec![0.0, 100.0], 0.0, 100.0);

        assert_eq!(viewer.time_at_column(&clock, 10, 5), Some(0.0));
        assert_eq!(viewer.time_at_column(&clock, 15, 5), Some(50.0));
        assert_eq!(viewer.time_at_column(&clock, 20, 5), Some(100.0));
        assert_eq!(viewer.time_at_column(&clock, 21, 5), None);
        assert_eq!(viewer.time_at_column(&clock, 15, 6), None);
    }

    #[test]
    fn test_layout_mode() {
        assert_eq!(LayoutMode::from_dimensions(200, 50), LayoutMode::TwoColumn);
        assert_eq!(LayoutMode::from_dimensions(80, 50), LayoutMode::SingleColumn);
    }
}
