use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info};

use common::{KillEvent, KillTracker, Snapshot};

/// Capacity of the roster notification channel. Slow consumers see `Lagged`
/// and re-read the player list.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Kills kept for the live kill feed; older ones are dropped first
pub const MAX_KILL_HISTORY: usize = 512;

/// Notifications published by the roster. They originate on ingestion tasks;
/// consumers drain them on their own thread.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterEvent {
    /// The set of known player names changed (sorted)
    PlayersChanged(Vec<String>),
    /// A kill was reconstructed from the live feed
    Kill(KillEvent),
    /// The roster was emptied by a listener stop
    Cleared,
}

struct RosterState {
    players: HashMap<String, Snapshot>,
    kill_tracker: KillTracker,
    kills: VecDeque<KillEvent>,
}

impl RosterState {
    fn new() -> Self {
        Self {
            players: HashMap::new(),
            // The listener can start mid-match
            kill_tracker: KillTracker::for_live_feed(),
            kills: VecDeque::new(),
        }
    }

    fn record_kills(&mut self, kills: &[KillEvent]) {
        self.kills.extend(kills.iter().cloned());
        let overflow = self.kills.len().saturating_sub(MAX_KILL_HISTORY);
        self.kills.drain(..overflow);
    }
}

/// Latest snapshot per player for the live feed.
///
/// This is the only state shared between the ingestion tasks and the
/// consumer. The lock is held for a single insert or copy, never across
/// parsing or rendering.
#[derive(Clone)]
pub struct Roster {
    state: Arc<Mutex<RosterState>>,
    events: broadcast::Sender<RosterEvent>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(RosterState::new())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RosterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to roster notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.events.subscribe()
    }

    /// Store `snapshot` as the latest state of its player. Returns the kills
    /// this update revealed.
    pub fn apply(&self, snapshot: Snapshot) -> Vec<KillEvent> {
        let (names, kills) = {
            let mut state = self.lock();
            let kills = state.kill_tracker.observe(&snapshot);
            state.record_kills(&kills);
            let is_new = state
                .players
                .insert(snapshot.name.clone(), snapshot)
                .is_none();
            let names = is_new.then(|| sorted_names(&state.players));
            (names, kills)
        };

        if let Some(names) = names {
            debug!(players = names.len(), "Roster changed");
            // No receivers is fine
            let _ = self.events.send(RosterEvent::PlayersChanged(names));
        }
        for kill in &kills {
            let _ = self.events.send(RosterEvent::Kill(kill.clone()));
        }
        kills
    }

    /// Copy of the latest snapshot for `name`
    pub fn get(&self, name: &str) -> Option<Snapshot> {
        self.lock().players.get(name).cloned()
    }

    /// Known player names, sorted
    pub fn names(&self) -> Vec<String> {
        sorted_names(&self.lock().players)
    }

    /// Copies of every player's latest snapshot, sorted by name
    pub fn snapshots(&self) -> Vec<Snapshot> {
        let mut snapshots: Vec<Snapshot> = self.lock().players.values().cloned().collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Kills reconstructed since the roster was last cleared, oldest first,
    /// capped at [`MAX_KILL_HISTORY`]
    pub fn kills(&self) -> Vec<KillEvent> {
        self.lock().kills.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every player, their counters and the kill list
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            state.players.clear();
            state.kill_tracker.reset();
            state.kills.clear();
        }
        info!("Roster cleared");
        let _ = self.events.send(RosterEvent::Cleared);
    }
}

fn sorted_names(players: &HashMap<String, Snapshot>) -> Vec<String> {
    let mut names: Vec<String> = players.keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str, timestamp: f64, kills: u32, deaths: u32) -> Snapshot {
        Snapshot {
            name: name.to_string(),
            timestamp,
            kills,
            deaths,
            ..Default::default()
        }
    }

    #[test]
    fn test_latest_snapshot_wins() {
        let roster = Roster::new();
        roster.apply(snapshot("Alpha", 1.0, 0, 0));
        roster.apply(snapshot("Alpha", 2.0, 0, 0));

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("Alpha").unwrap().timestamp, 2.0);
        assert!(roster.get("Bravo").is_none());
    }

    #[test]
    fn test_change_notification_only_for_new_names() {
        let roster = Roster::new();
        let mut events = roster.subscribe();

        roster.apply(snapshot("Bravo", 1.0, 0, 0));
        roster.apply(snapshot("Bravo", 2.0, 0, 0));
        roster.apply(snapshot("Alpha", 2.0, 0, 0));

        assert_eq!(
            events.try_recv().unwrap(),
            RosterEvent::PlayersChanged(vec!["Bravo".to_string()])
        );
        assert_eq!(
            events.try_recv().unwrap(),
            RosterEvent::PlayersChanged(vec!["Alpha".to_string(), "Bravo".to_string()])
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_kills_are_reconstructed() {
        let roster = Roster::new();
        let mut events = roster.subscribe();
        roster.apply(snapshot("Alpha", 4.0, 0, 0));
        roster.apply(snapshot("Bravo", 4.0, 0, 0));
        roster.apply(snapshot("Bravo", 5.0, 0, 1));
        let kills = roster.apply(snapshot("Alpha", 5.2, 1, 0));

        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].victim, "Bravo");
        assert_eq!(roster.kills(), kills);

        let kill_events: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|event| matches!(event, RosterEvent::Kill(_)))
            .collect();
        assert_eq!(kill_events.len(), 1);
    }

    #[test]
    fn test_first_sighting_counters_are_baseline() {
        let roster = Roster::new();
        assert!(roster.apply(snapshot("Alpha", 1.0, 9, 4)).is_empty());
        assert_eq!(roster.apply(snapshot("Alpha", 2.0, 10, 4)).len(), 1);
    }

    #[test]
    fn test_kill_history_is_capped() {
        let roster = Roster::new();
        roster.apply(snapshot("Alpha", 0.0, 0, 0));
        let total = MAX_KILL_HISTORY as u32 + 10;
        for kills in 1..=total {
            roster.apply(snapshot("Alpha", kills as f64, kills, 0));
        }

        let kept = roster.kills();
        assert_eq!(kept.len(), MAX_KILL_HISTORY);
        assert_eq!(kept[0].timestamp, 11.0);
        assert_eq!(kept.last().unwrap().timestamp, total as f64);
    }

    #[test]
    fn test_clear_empties_everything() {
        let roster = Roster::new();
        roster.apply(snapshot("Alpha", 1.0, 0, 0));
        roster.apply(snapshot("Alpha", 2.0, 1, 0));
        roster.clear();

        assert!(roster.is_empty());
        assert!(roster.kills().is_empty());
        assert!(roster.names().is_empty());
    }

    #[test]
    fn test_concurrent_writers() {
        let roster = Roster::new();
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let roster = roster.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        roster.apply(snapshot(&format!("P{}", worker), i as f64, 0, 0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(roster.names(), vec!["P0", "P1", "P2", "P3"]);
        assert!(roster.snapshots().iter().all(|s| s.timestamp == 99.0));
    }
}
