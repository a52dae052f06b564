use common::TELEPORT_THRESHOLD;
use std::collections::BTreeMap;
use tracing::trace;

use super::{PathPoint, PathSegment};

/// How a point was placed by [`Segmenter::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First point seen for the player
    FirstLife,
    /// Appended to the open segment
    Continued,
    /// Closed the open segment and started a new one
    Respawned,
    /// Timestamp did not advance; dropped
    Dropped,
}

/// Splits each player's points into lives. A new life starts on a teleport
/// (jump farther than the threshold) or a dead→alive transition.
#[derive(Debug, Default)]
pub struct Segmenter {
    players: BTreeMap<String, Vec<PathSegment>>,
}

impl Segmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, player: &str, point: PathPoint) -> Placement {
        let Some(segments) = self.players.get_mut(player) else {
            self.players
                .insert(player.to_string(), vec![PathSegment::new(point)]);
            return Placement::FirstLife;
        };
        // Only the last segment of a player is ever open
        let Some(open) = segments.last_mut() else {
            segments.push(PathSegment::new(point));
            return Placement::FirstLife;
        };

        let previous = open.last();
        if point.timestamp <= previous.timestamp {
            trace!(player, timestamp = point.timestamp, "Dropping out-of-order point");
            return Placement::Dropped;
        }

        let teleported = previous.position.distance(point.position) > TELEPORT_THRESHOLD;
        let revived = previous.dead && !point.dead;
        if teleported || revived {
            trace!(player, timestamp = point.timestamp, teleported, revived, "Respawn");
            segments.push(PathSegment::new(point));
            Placement::Respawned
        } else {
            open.push(point);
            Placement::Continued
        }
    }

    pub fn finish(self) -> BTreeMap<String, Vec<PathSegment>> {
        self.players
    }
}
