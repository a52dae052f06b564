use super::View;
use crate::app::AppCommand;
use crate::replay::reader::HistoryReader;
use crate::session::Session;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct HistorySelectorState {
    history_dir: PathBuf,
    history_files: Vec<PathBuf>,
    selected_index: usize,
    message: Option<String>,
}

impl HistorySelectorState {
    pub fn new(history_dir: PathBuf) -> Result<Self> {
        let history_files = HistoryReader::list_histories(&history_dir)?;
        Ok(Self {
            history_dir,
            history_files,
            selected_index: 0,
            message: None,
        })
    }

    /// Show a one-line notice (e.g. a failed load) above the help bar
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    fn refresh(&mut self) {
        match HistoryReader::list_histories(&self.history_dir) {
            Ok(files) => {
                self.history_files = files;
                self.selected_index = self.selected_index.min(self.history_files.len().saturating_sub(1));
                self.message = None;
            }
            Err(e) => self.message = Some(format!("Cannot list {:?}: {}", self.history_dir, e)),
        }
    }

    fn move_selection_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    fn move_selection_down(&mut self) {
        if self.selected_index + 1 < self.history_files.len() {
            self.selected_index += 1;
        }
    }
}

fn describe_file(path: &Path) -> String {
    let Ok(metadata) = path.metadata() else {
        return String::new();
    };
    let size = metadata.len();
    let size_str = if size < 1024 {
        format!("{} B", size)
    } else if size < 1024 * 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
    };

    let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| {
            let age = now.saturating_sub(d.as_secs());
            if age < 60 {
                "just now".to_string()
            } else if age < 3600 {
                format!("{}m ago", age / 60)
            } else if age < 86400 {
                format!("{}h ago", age / 3600)
            } else {
                format!("{}d ago", age / 86400)
            }
        })
        .unwrap_or_else(|| "unknown".to_string());

    format!(" ({}, {})", size_str, modified)
}

impl View for HistorySelectorState {
    fn handle_input(&mut self, key: KeyEvent, _session: &mut Session) -> Option<AppCommand> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(AppCommand::Quit),
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection_down();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection_up();
                None
            }
            KeyCode::Char('r') => {
                self.refresh();
                None
            }
            KeyCode::Char('L') => Some(AppCommand::StartLive),
            KeyCode::Enter => self
                .history_files
                .get(self.selected_index)
                .cloned()
                .map(AppCommand::OpenHistory),
            _ => None,
        }
    }

    fn render(&self, frame: &mut Frame, session: &Session) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let title = Paragraph::new("Match Telemetry")
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, chunks[0]);

        let list_area = chunks[1];
        let visible_height = list_area.height.saturating_sub(2) as usize;
        let scroll_offset = (self.selected_index + 1).saturating_sub(visible_height);

        let items: Vec<ListItem> = self
            .history_files
            .iter()
            .enumerate()
            .skip(scroll_offset)
            .take(visible_height)
            .map(|(i, path)| {
                let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("Unknown");
                let style = if i == self.selected_index {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };

                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:>3} ", i + 1), Style::default().fg(Color::DarkGray)),
                    Span::styled(filename.to_string(), style),
                    Span::styled(describe_file(path), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .title(format!("History logs in {}", self.history_dir.display()))
                .borders(Borders::ALL),
        );
        frame.render_widget(list, list_area);

        let notice = match &self.message {
            Some(message) => Span::styled(message.clone(), Style::default().fg(Color::Red)),
            None => Span::styled(
                format!("Live listener will bind {}", session.config().socket_addr()),
                Style::default().fg(Color::DarkGray),
            ),
        };
        frame.render_widget(
            Paragraph::new(Line::from(notice))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL)),
            chunks[2],
        );

        let help_text = if self.history_files.is_empty() {
            "No history logs found | L: Listen live | r: Rescan | q: Quit"
        } else {
            "↑/k: Up | ↓/j: Down | Enter: Open | L: Listen live | r: Rescan | q: Quit"
        };
        let help = Paragraph::new(help_text)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, chunks[3]);
    }
}
