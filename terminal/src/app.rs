use anyhow::Result;
use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::Frame;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use crate::session::Session;
use crate::views::{HistorySelectorState, SessionViewerState, View};

#[derive(Debug)]
pub enum AppCommand {
    Quit,
    BackToSelector,
    OpenHistory(PathBuf),
    StartLive,
}

pub enum AppState {
    HistorySelector(Box<HistorySelectorState>),
    SessionViewer(Box<SessionViewerState>),
}

pub struct App {
    pub state: AppState,
    pub history_dir: PathBuf,
    pub session: Session,
}

impl App {
    pub fn new(history_dir: PathBuf, session: Session) -> Result<Self> {
        let selector = HistorySelectorState::new(history_dir.clone())?;
        Ok(Self {
            state: AppState::HistorySelector(Box::new(selector)),
            history_dir,
            session,
        })
    }

    /// Open straight into the viewer, for sessions started from the command line
    pub fn viewing(history_dir: PathBuf, session: Session) -> Self {
        Self {
            state: AppState::SessionViewer(Box::new(SessionViewerState::new())),
            history_dir,
            session,
        }
    }

    pub fn handle_input(&mut self, key: KeyEvent) -> Option<AppCommand> {
        match &mut self.state {
            AppState::HistorySelector(selector) => selector.handle_input(key, &mut self.session),
            AppState::SessionViewer(viewer) => viewer.handle_input(key, &mut self.session),
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> Option<AppCommand> {
        match &mut self.state {
            AppState::HistorySelector(selector) => selector.handle_mouse(mouse, &mut self.session),
            AppState::SessionViewer(viewer) => viewer.handle_mouse(mouse, &mut self.session),
        }
    }

    pub fn update(&mut self, dt: Duration) {
        self.session.update(dt);
    }

    pub fn render(&self, frame: &mut Frame) {
        match &self.state {
            AppState::HistorySelector(selector) => selector.render(frame, &self.session),
            AppState::SessionViewer(viewer) => viewer.render(frame, &self.session),
        }
    }

    pub fn handle_command(&mut self, command: AppCommand) -> Result<()> {
        match command {
            AppCommand::OpenHistory(path) => match self.session.load_history(&path) {
                Ok(()) => self.state = AppState::SessionViewer(Box::new(SessionViewerState::new())),
                Err(e) => {
                    error!("{:#}", e);
                    self.show_selector(Some(format!("{:#}", e)))?;
                }
            },
            AppCommand::StartLive => match self.session.start_listening() {
                Ok(addr) => {
                    info!("Listening for telemetry on {}", addr);
                    self.state = AppState::SessionViewer(Box::new(SessionViewerState::new()));
                }
                Err(e) => {
                    error!("{:#}", e);
                    self.show_selector(Some(format!("{:#}", e)))?;
                }
            },
            AppCommand::BackToSelector => {
                self.session.stop_listening();
                self.show_selector(None)?;
            }
            AppCommand::Quit => {
                // Handled in main loop
            }
        }
        Ok(())
    }

    fn show_selector(&mut self, message: Option<String>) -> Result<()> {
        let mut selector = HistorySelectorState::new(self.history_dir.clone())?;
        if let Some(message) = message {
            selector.set_message(message);
        }
        self.state = AppState::HistorySelector(Box::new(selector));
        Ok(())
    }
}
