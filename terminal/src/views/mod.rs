pub mod history_selector;
pub mod session_viewer;

pub use history_selector::HistorySelectorState;
pub use session_viewer::SessionViewerState;

use crate::app::AppCommand;
use crate::session::Session;
use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::Frame;

pub trait View {
    fn handle_input(&mut self, key: KeyEvent, session: &mut Session) -> Option<AppCommand>;
    fn handle_mouse(&mut self, _mouse: MouseEvent, _session: &mut Session) -> Option<AppCommand> {
        None
    }
    fn render(&self, frame: &mut Frame, session: &Session);
}
