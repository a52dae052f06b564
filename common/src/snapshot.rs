use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn lerp(self, other: Vec3, t: f32) -> Vec3 {
        Vec3 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// One player's instantaneous telemetry, as carried by a single record.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    // Match metadata
    pub map: String,
    pub game_type: String,

    // Identity
    pub name: String,
    pub player_index: i32,
    pub platform_id: Option<String>,
    pub machine_id: Option<String>,
    /// -1 when unknown or free-for-all
    pub team: i32,

    // Emblem and colors
    pub emblem_foreground: i32,
    pub emblem_background: i32,
    pub primary_color: i32,
    pub secondary_color: i32,

    /// Seconds; wall-clock for live feeds, log time for history files
    pub timestamp: f64,

    pub position: Vec3,
    pub velocity: Vec3,
    pub speed: f32,

    /// Radians
    pub yaw: f32,
    /// Radians
    pub pitch: f32,
    pub yaw_degrees: f32,
    pub pitch_degrees: f32,

    pub health: f32,
    pub shield: f32,

    pub crouching: bool,
    pub crouch_blend: f32,
    pub airborne: bool,
    pub airborne_ticks: i32,

    pub weapon_slot: i32,
    pub weapon: String,
    pub frag_grenades: i32,
    pub plasma_grenades: i32,

    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,

    pub respawn_timer: f32,
    /// Always true while `respawn_timer > 0`
    pub dead: bool,

    pub event: String,
}

impl Snapshot {
    pub fn is_alive(&self) -> bool {
        !self.dead
    }
}

/// A kill derived from counter increments. Never mutated once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    pub timestamp: f64,
    pub killer: String,
    pub killer_team: i32,
    pub victim: String,
    pub victim_team: i32,
    pub weapon: String,
}

impl fmt::Display for KillEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weapon.is_empty() {
            write!(f, "{} killed {}", self.killer, self.victim)
        } else {
            write!(f, "{} [{}] {}", self.killer, self.weapon, self.victim)
        }
    }
}

/// Display name of a team value
pub fn team_name(team: i32) -> &'static str {
    match team {
        0 => "Red",
        1 => "Blue",
        2 => "Green",
        3 => "Orange",
        _ => "-",
    }
}
