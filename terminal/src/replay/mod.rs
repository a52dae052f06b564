pub mod bookmarks;
pub mod player;
pub mod reader;
pub mod segmenter;

use common::{KillEvent, Snapshot, Vec3};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The part of a snapshot kept for replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathPoint {
    pub timestamp: f64,
    pub position: Vec3,
    pub team: i32,
    /// Radians
    pub yaw: f32,
    pub weapon: String,
    pub crouching: bool,
    pub airborne: bool,
    pub dead: bool,
    /// Cumulative scoreboard counters as recorded on this row
    pub kills: u32,
    pub deaths: u32,
    pub primary_color: i32,
    pub secondary_color: i32,
    pub emblem_foreground: i32,
    pub emblem_background: i32,
}

impl From<&Snapshot> for PathPoint {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            position: snapshot.position,
            team: snapshot.team,
            yaw: snapshot.yaw,
            weapon: snapshot.weapon.clone(),
            crouching: snapshot.crouching,
            airborne: snapshot.airborne,
            dead: snapshot.dead,
            kills: snapshot.kills,
            deaths: snapshot.deaths,
            primary_color: snapshot.primary_color,
            secondary_color: snapshot.secondary_color,
            emblem_foreground: snapshot.emblem_foreground,
            emblem_background: snapshot.emblem_background,
        }
    }
}

/// One continuous life of a player: a non-empty run of points with strictly
/// increasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSegment {
    points: Vec<PathPoint>,
}

impl PathSegment {
    pub fn new(first: PathPoint) -> Self {
        Self {
            points: vec![first],
        }
    }

    /// Append a point. Returns false (and drops the point) when its timestamp
    /// does not advance past the last one.
    pub fn push(&mut self, point: PathPoint) -> bool {
        if point.timestamp <= self.last().timestamp {
            return false;
        }
        self.points.push(point);
        true
    }

    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    pub fn first(&self) -> &PathPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &PathPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn start(&self) -> f64 {
        self.first().timestamp
    }

    pub fn end(&self) -> f64 {
        self.last().timestamp
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Latest point at or before `at`
    pub fn latest_at(&self, at: f64) -> Option<&PathPoint> {
        let index = self.points.partition_point(|point| point.timestamp <= at);
        index.checked_sub(1).map(|i| &self.points[i])
    }

    /// State at `at`: the latest point at or before it, with the position
    /// blended linearly toward the following point of this segment.
    pub fn sample(&self, at: f64) -> Option<PathPoint> {
        let index = self.points.partition_point(|point| point.timestamp <= at);
        let before = self.points.get(index.checked_sub(1)?)?;
        let mut sampled = before.clone();
        if let Some(after) = self.points.get(index) {
            let span = after.timestamp - before.timestamp;
            let t = ((at - before.timestamp) / span) as f32;
            sampled.position = before.position.lerp(after.position, t);
            sampled.timestamp = at;
        }
        Some(sampled)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryMetadata {
    pub source: Option<PathBuf>,
    pub map: Option<String>,
    pub game_type: Option<String>,
    pub rows_accepted: usize,
    pub rows_skipped: usize,
    /// False when reading stopped early on an I/O error
    pub complete: bool,
}

/// Everything loaded from one history file.
#[derive(Debug, Clone, Default)]
pub struct ReplayData {
    pub metadata: HistoryMetadata,
    /// Segments per player, in time order
    pub players: BTreeMap<String, Vec<PathSegment>>,
    /// Reconstructed kills, in file order
    pub kills: Vec<KillEvent>,
    pub min_timestamp: f64,
    pub max_timestamp: f64,
}

impl ReplayData {
    pub fn player_names(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    pub fn segments(&self, player: &str) -> &[PathSegment] {
        self.players.get(player).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every recorded point timestamp, sorted and deduplicated. This is the
    /// discrete timeline the playback clock steps through.
    pub fn timeline(&self) -> Vec<f64> {
        let mut timestamps: Vec<f64> = self
            .players
            .values()
            .flatten()
            .flat_map(|segment| segment.points().iter().map(|point| point.timestamp))
            .collect();
        timestamps.sort_by(f64::total_cmp);
        timestamps.dedup();
        timestamps
    }

    /// State of `player` at `at`, blended within the segment that covers it.
    /// Between lives the last point of the previous segment holds.
    pub fn state_at(&self, player: &str, at: f64) -> Option<PathPoint> {
        let segments = self.segments(player);
        let index = segments.partition_point(|segment| segment.start() <= at);
        segments.get(index.checked_sub(1)?)?.sample(at)
    }

    /// Kills that happened at or before `at`
    pub fn kills_until(&self, at: f64) -> Vec<KillEvent> {
        self.kills
            .iter()
            .filter(|kill| kill.timestamp <= at)
            .cloned()
            .collect()
    }

    pub fn point_count(&self) -> usize {
        self.players.values().flatten().map(PathSegment::len).sum()
    }

    pub fn summary(&self) -> HistorySummary {
        let players = self
            .players
            .iter()
            .map(|(name, segments)| {
                let last = segments.last().map(PathSegment::last);
                PlayerSummary {
                    name: name.clone(),
                    team: last.map(|point| point.team).unwrap_or(common::UNKNOWN_TEAM),
                    segments: segments.len(),
                    points: segments.iter().map(PathSegment::len).sum(),
                    // Final scoreboard counters, not only the kills that were paired
                    kills: last.map(|point| point.kills).unwrap_or_default(),
                    deaths: last.map(|point| point.deaths).unwrap_or_default(),
                }
            })
            .collect();

        HistorySummary {
            metadata: self.metadata.clone(),
            min_timestamp: self.min_timestamp,
            max_timestamp: self.max_timestamp,
            duration: self.max_timestamp - self.min_timestamp,
            players,
            kills: self.kills.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub name: String,
    pub team: i32,
    pub segments: usize,
    pub points: usize,
    pub kills: u32,
    pub deaths: u32,
}

/// Serializable overview of a loaded history
#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub metadata: HistoryMetadata,
    pub min_timestamp: f64,
    pub max_timestamp: f64,
    pub duration: f64,
    pub players: Vec<PlayerSummary>,
    pub kills: Vec<KillEvent>,
}
