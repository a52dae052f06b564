pub mod app;
pub mod pov;
pub mod replay;
pub mod session;
pub mod views;

pub use pov::FollowTarget;
pub use replay::ReplayData;
pub use replay::bookmarks::Bookmarks;
pub use replay::player::{PlaybackClock, PlaybackState, TickOutcome};
pub use replay::reader::{HistoryError, HistoryReader};
pub use session::{PlayerState, ScoreLine, Session};
