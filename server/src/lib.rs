pub mod config;
pub mod listener;
pub mod roster;

pub use config::ListenerConfig;
pub use listener::{DualListener, ListenerError};
pub use roster::{Roster, RosterEvent};
