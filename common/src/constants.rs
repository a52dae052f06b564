/// Port shared by the UDP socket and the TCP listener
pub const DEFAULT_TELEMETRY_PORT: u16 = 2222;

/// Straight-line distance between two samples that counts as a teleport (respawn)
pub const TELEPORT_THRESHOLD: f32 = 10.0;

/// Spacing between samples of a history file that carries no timestamp column
pub const AUTO_TIMESTAMP_STEP: f64 = 0.1;

/// Deaths older than this (relative to the newest sample) are no longer kill candidates
pub const RECENT_DEATH_WINDOW: f64 = 2.0;

/// Maximum distance in time between a kill increment and the matched death
pub const KILL_MATCH_WINDOW: f64 = 1.0;

/// Victim name used when no death could be matched to a kill
pub const UNKNOWN_VICTIM: &str = "Unknown";

/// Team value for free-for-all or unparseable teams
pub const UNKNOWN_TEAM: i32 = -1;

/// Respawn durations at or above this are discarded from the running average
pub const MAX_RESPAWN_SAMPLE: f64 = 60.0;

/// Number of respawn durations kept for the running average
pub const RESPAWN_SAMPLE_CAPACITY: usize = 50;

/// A player dead for longer than this multiple of the average respawn time is considered gone
pub const DISCONNECT_FACTOR: f64 = 2.0;
