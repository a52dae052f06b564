use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

use crate::constants::{DISCONNECT_FACTOR, MAX_RESPAWN_SAMPLE, RESPAWN_SAMPLE_CAPACITY};

/// Learns the typical respawn duration from observed dead→alive transitions
/// and flags players who stay dead far longer than that as disconnected.
#[derive(Debug, Default)]
pub struct RespawnEstimator {
    /// Last observed life state per player
    dead: HashMap<String, bool>,
    /// Time each currently-dead player was first seen dead
    death_times: HashMap<String, f64>,
    samples: VecDeque<f64>,
    average: f64,
    disconnected: HashSet<String>,
}

impl RespawnEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the life state of `player` at time `now`.
    pub fn observe(&mut self, player: &str, dead: bool, now: f64) {
        let was_dead = self.dead.insert(player.to_string(), dead).unwrap_or(false);

        if dead {
            let died_at = *self.death_times.entry(player.to_string()).or_insert(now);
            if self.samples.is_empty() {
                return;
            }
            let elapsed = now - died_at;
            if elapsed > DISCONNECT_FACTOR * self.average && self.disconnected.insert(player.to_string()) {
                info!(player, elapsed, average = self.average, "Player presumed disconnected");
            }
            return;
        }

        if was_dead {
            if let Some(died_at) = self.death_times.remove(player) {
                self.record_sample(now - died_at);
            }
        }
        self.death_times.remove(player);
        self.disconnected.remove(player);
    }

    fn record_sample(&mut self, elapsed: f64) {
        if !(elapsed > 0.0 && elapsed < MAX_RESPAWN_SAMPLE) {
            debug!(elapsed, "Discarding respawn sample");
            return;
        }
        if self.samples.len() == RESPAWN_SAMPLE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
        self.average = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
    }

    /// Mean of the retained respawn durations, if any were observed
    pub fn average(&self) -> Option<f64> {
        (!self.samples.is_empty()).then_some(self.average)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_disconnected(&self, player: &str) -> bool {
        self.disconnected.contains(player)
    }

    pub fn disconnected(&self) -> impl Iterator<Item = &str> {
        self.disconnected.iter().map(String::as_str)
    }

    /// Drop per-player transition state but keep the learned average. Used when
    /// time jumps backwards (scrub, loop) so stale death times are not reused.
    pub fn clear_transitions(&mut self) {
        self.dead.clear();
        self.death_times.clear();
        self.disconnected.clear();
    }

    pub fn reset(&mut self) {
        self.clear_transitions();
        self.samples.clear();
        self.average = 0.0;
    }
}
