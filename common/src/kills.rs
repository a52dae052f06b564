use std::collections::HashMap;
use tracing::debug;

use crate::constants::{KILL_MATCH_WINDOW, RECENT_DEATH_WINDOW, UNKNOWN_TEAM, UNKNOWN_VICTIM};
use crate::snapshot::{KillEvent, Snapshot};

#[derive(Debug, Clone, Copy)]
struct Counters {
    kills: u32,
    deaths: u32,
}

#[derive(Debug, Clone)]
struct RecentDeath {
    timestamp: f64,
    name: String,
    team: i32,
}

/// Reconstructs kill events from cumulative kill/death counters.
///
/// Each death increment is remembered for a short window. A kill increment is
/// paired with the most recent remembered death of another player close in
/// time; with no such death the victim is reported as unknown. The pairing is
/// a heuristic: simultaneous deaths can be attributed to the wrong killer.
#[derive(Debug, Default)]
pub struct KillTracker {
    counters: HashMap<String, Counters>,
    recent_deaths: Vec<RecentDeath>,
    first_sighting_is_baseline: bool,
}

impl KillTracker {
    /// Tracker for a recorded match: unseen players start from zero counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker for a live feed that may be joined mid-match. The first
    /// snapshot of a player only sets the baseline, so counters accumulated
    /// before the listener started are not reported as kills.
    pub fn for_live_feed() -> Self {
        Self {
            first_sighting_is_baseline: true,
            ..Self::default()
        }
    }

    /// Feed one snapshot and return the kills it reveals.
    ///
    /// A counter that goes down (rejoin, new round) resets the baseline
    /// without events.
    pub fn observe(&mut self, snapshot: &Snapshot) -> Vec<KillEvent> {
        let now = snapshot.timestamp;
        self.recent_deaths
            .retain(|death| now - death.timestamp <= RECENT_DEATH_WINDOW);

        let current = Counters {
            kills: snapshot.kills,
            deaths: snapshot.deaths,
        };
        let previous = match self.counters.insert(snapshot.name.clone(), current) {
            Some(previous) => previous,
            None if self.first_sighting_is_baseline => return Vec::new(),
            None => Counters { kills: 0, deaths: 0 },
        };

        if current.deaths > previous.deaths {
            self.recent_deaths.push(RecentDeath {
                timestamp: now,
                name: snapshot.name.clone(),
                team: snapshot.team,
            });
        }

        let new_kills = current.kills.saturating_sub(previous.kills);
        (0..new_kills)
            .map(|_| self.attribute_kill(snapshot))
            .collect()
    }

    fn attribute_kill(&mut self, killer: &Snapshot) -> KillEvent {
        let now = killer.timestamp;
        let matched = self
            .recent_deaths
            .iter()
            .enumerate()
            .filter(|(_, death)| {
                death.name != killer.name && (now - death.timestamp).abs() <= KILL_MATCH_WINDOW
            })
            .max_by(|(_, a), (_, b)| a.timestamp.total_cmp(&b.timestamp))
            .map(|(index, _)| index);
        let victim = matched.map(|index| self.recent_deaths.remove(index));

        let (victim, victim_team) = match victim {
            Some(death) => (death.name, death.team),
            None => {
                debug!(killer = %killer.name, timestamp = now, "No death matched kill");
                (UNKNOWN_VICTIM.to_string(), UNKNOWN_TEAM)
            }
        };

        KillEvent {
            timestamp: now,
            killer: killer.name.clone(),
            killer_team: killer.team,
            victim,
            victim_team,
            weapon: killer.weapon.clone(),
        }
    }

    /// Forget all counters and pending deaths
    pub fn reset(&mut self) {
        self.counters.clear();
        self.recent_deaths.clear();
    }
}
