use common::Vec3;
use serde::Serialize;
use server::Roster;

use crate::replay::{PathPoint, ReplayData};

/// Where the camera should sit when following a player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowTarget {
    pub name: String,
    pub position: Vec3,
    /// Radians
    pub yaw: f32,
}

/// Live feed: the roster entry, or nothing while the player is dead.
pub fn resolve_live(roster: &Roster, name: &str) -> Option<FollowTarget> {
    let snapshot = roster.get(name)?;
    if snapshot.dead {
        return None;
    }
    Some(FollowTarget {
        name: snapshot.name,
        position: snapshot.position,
        yaw: snapshot.yaw,
    })
}

/// Replay: the latest point at or before `at` across every life, preferring
/// the latest alive point even when a dead point is more recent.
pub fn resolve_replay(replay: &ReplayData, name: &str, at: f64) -> Option<FollowTarget> {
    let mut latest_dead: Option<&PathPoint> = None;

    for segment in replay.segments(name).iter().rev() {
        let points = segment.points();
        let reached = &points[..points.partition_point(|point| point.timestamp <= at)];
        if let Some(alive) = reached.iter().rev().find(|point| !point.dead) {
            return Some(target(name, alive));
        }
        if latest_dead.is_none() {
            latest_dead = reached.last();
        }
    }

    latest_dead.map(|point| target(name, point))
}

fn target(name: &str, point: &PathPoint) -> FollowTarget {
    FollowTarget {
        name: name.to_string(),
        position: point.position,
        yaw: point.yaw,
    }
}
