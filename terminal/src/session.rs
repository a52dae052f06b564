use anyhow::{Context, Result};
use common::{KillEvent, RespawnEstimator, Vec3};
use serde::Serialize;
use server::{DualListener, ListenerConfig, Roster, RosterEvent};
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::pov::{self, FollowTarget};
use crate::replay::player::{PlaybackClock, TickOutcome};
use crate::replay::reader::HistoryReader;
use crate::replay::ReplayData;

/// Current state of one player, whichever source it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    pub name: String,
    pub team: i32,
    pub position: Vec3,
    pub yaw: f32,
    pub dead: bool,
    pub weapon: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreLine {
    pub name: String,
    pub team: i32,
    pub kills: u32,
    pub deaths: u32,
    pub disconnected: bool,
}

struct LiveSource {
    listener: DualListener,
    events: broadcast::Receiver<RosterEvent>,
    started: Instant,
}

struct ReplaySource {
    data: ReplayData,
    clock: PlaybackClock,
}

enum Source {
    Idle,
    Live(Box<LiveSource>),
    Replay(Box<ReplaySource>),
}

/// Owner of everything the frame loop reads: the active source (live listener
/// or loaded history), the respawn estimator and the follow selection.
///
/// Single-threaded. Live data arrives through the roster's notification
/// channel and is drained once per [`Session::update`].
pub struct Session {
    runtime: Handle,
    config: ListenerConfig,
    source: Source,
    estimator: RespawnEstimator,
    follow: Option<String>,
    players: Vec<String>,
}

impl Session {
    pub fn new(runtime: Handle, config: ListenerConfig) -> Self {
        Self {
            runtime,
            config,
            source: Source::Idle,
            estimator: RespawnEstimator::new(),
            follow: None,
            players: Vec::new(),
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn mode(&self) -> &'static str {
        match self.source {
            Source::Idle => "idle",
            Source::Live(_) => "live",
            Source::Replay(_) => "replay",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.source, Source::Live(_))
    }

    /// Bind the listener and switch to the live feed. Drops any loaded
    /// history.
    pub fn start_listening(&mut self) -> Result<SocketAddr> {
        self.stop_listening();

        let roster = Roster::new();
        let events = roster.subscribe();
        let mut listener = DualListener::new(roster);
        let addr = self
            .runtime
            .block_on(listener.start(&self.config))
            .with_context(|| format!("Failed to listen on {}", self.config.socket_addr()))?;

        self.reset_views();
        self.source = Source::Live(Box::new(LiveSource {
            listener,
            events,
            started: Instant::now(),
        }));
        Ok(addr)
    }

    /// Stop the listener if it is running. The session goes idle.
    pub fn stop_listening(&mut self) {
        if let Source::Live(live) = &mut self.source {
            self.runtime.block_on(live.listener.stop());
            self.source = Source::Idle;
            self.reset_views();
        }
    }

    pub fn load_history(&mut self, path: &Path) -> Result<()> {
        let data = HistoryReader::load_history(path)
            .with_context(|| format!("Failed to load history {:?}", path))?;
        self.open_replay(data);
        Ok(())
    }

    /// Switch to an already-parsed history
    pub fn open_replay(&mut self, data: ReplayData) {
        if self.is_live() {
            self.stop_listening();
        }
        self.reset_views();
        self.players = data.player_names();
        let clock = PlaybackClock::for_replay(&data);
        self.source = Source::Replay(Box::new(ReplaySource { data, clock }));
    }

    fn reset_views(&mut self) {
        self.estimator.reset();
        self.players.clear();
        if self.follow.is_some() {
            debug!("Follow target cleared");
        }
        self.follow = None;
    }

    /// Per-frame step: marshal roster notifications, advance the clock and
    /// feed the respawn estimator.
    pub fn update(&mut self, dt: Duration) {
        match &mut self.source {
            Source::Idle => {}
            Source::Live(live) => {
                loop {
                    match live.events.try_recv() {
                        Ok(RosterEvent::PlayersChanged(names)) => self.players = names,
                        Ok(RosterEvent::Kill(kill)) => info!("{}", kill),
                        Ok(RosterEvent::Cleared) => self.players.clear(),
                        Err(TryRecvError::Lagged(skipped)) => {
                            warn!(skipped, "Roster notifications lagged; resyncing");
                            self.players = live.listener.roster().names();
                        }
                        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                    }
                }

                let now = live.started.elapsed().as_secs_f64();
                for snapshot in live.listener.roster().snapshots() {
                    self.estimator.observe(&snapshot.name, snapshot.dead, now);
                }
            }
            Source::Replay(replay) => {
                if replay.clock.tick(dt) == TickOutcome::Looped {
                    self.estimator.clear_transitions();
                }
                Self::observe_replay(&mut self.estimator, replay);
            }
        }
    }

    fn observe_replay(estimator: &mut RespawnEstimator, replay: &ReplaySource) {
        let at = replay.clock.current();
        for name in replay.data.players.keys() {
            if let Some(point) = replay.data.state_at(name, at) {
                estimator.observe(name, point.dead, at);
            }
        }
    }

    /// Apply a clock mutation. Jumping backwards invalidates the estimator's
    /// pending death times.
    fn with_clock(&mut self, change: impl FnOnce(&mut PlaybackClock)) {
        if let Source::Replay(replay) = &mut self.source {
            let before = replay.clock.current();
            change(&mut replay.clock);
            if replay.clock.current() < before {
                self.estimator.clear_transitions();
            }
        }
    }

    pub fn toggle_play(&mut self) {
        self.with_clock(PlaybackClock::toggle_play);
    }

    pub fn reset(&mut self) {
        self.with_clock(PlaybackClock::reset);
    }

    pub fn skip_seconds(&mut self, delta: f64) {
        self.with_clock(|clock| clock.skip_seconds(delta));
    }

    pub fn skip_ticks(&mut self, ticks: i64) {
        self.with_clock(|clock| clock.skip_ticks(ticks));
    }

    pub fn scrub(&mut self, at: f64) {
        self.with_clock(|clock| clock.scrub(at));
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.with_clock(|clock| clock.set_speed(speed));
    }

    pub fn cycle_speed(&mut self) {
        self.with_clock(|clock| {
            clock.cycle_speed();
        });
    }

    /// Set the next bookmark at the current time, or clear both
    pub fn mark(&mut self) {
        self.with_clock(PlaybackClock::mark);
    }

    pub fn set_marker_at(&mut self, at: f64) {
        self.with_clock(|clock| clock.set_marker_at(at));
    }

    pub fn toggle_loop(&mut self) {
        self.with_clock(|clock| {
            clock.toggle_loop();
        });
    }

    /// Follow `name`, or stop following with `None`
    pub fn follow(&mut self, name: Option<String>) {
        debug!(player = ?name, "Follow target selected");
        self.follow = name;
    }

    /// Step the follow selection through the known players, ending on none
    pub fn cycle_follow(&mut self, forward: bool) {
        let players = self.visible_players();
        if players.is_empty() {
            self.follow(None);
            return;
        }
        let current = self
            .follow
            .as_ref()
            .and_then(|name| players.iter().position(|p| p == name));
        let next = match (current, forward) {
            (None, true) => Some(0),
            (None, false) => Some(players.len() - 1),
            (Some(i), true) => (i + 1 < players.len()).then_some(i + 1),
            (Some(i), false) => i.checked_sub(1),
        };
        self.follow(next.map(|i| players[i].clone()));
    }

    pub fn followed(&self) -> Option<&str> {
        self.follow.as_deref()
    }

    pub fn clock(&self) -> Option<&PlaybackClock> {
        match &self.source {
            Source::Replay(replay) => Some(&replay.clock),
            _ => None,
        }
    }

    pub fn replay(&self) -> Option<&ReplayData> {
        match &self.source {
            Source::Replay(replay) => Some(&replay.data),
            _ => None,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.source {
            Source::Live(live) => live.listener.local_addr(),
            _ => None,
        }
    }

    pub fn estimator(&self) -> &RespawnEstimator {
        &self.estimator
    }

    /// Known player names, sorted
    pub fn player_names(&self) -> &[String] {
        &self.players
    }

    /// Players to draw: known players minus those presumed disconnected
    pub fn visible_players(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|name| !self.estimator.is_disconnected(name))
            .cloned()
            .collect()
    }

    /// Live snapshot, or replay state at the current playback time
    pub fn player_state(&self, name: &str) -> Option<PlayerState> {
        match &self.source {
            Source::Idle => None,
            Source::Live(live) => live.listener.roster().get(name).map(|s| PlayerState {
                name: s.name,
                team: s.team,
                position: s.position,
                yaw: s.yaw,
                dead: s.dead,
                weapon: s.weapon,
                timestamp: s.timestamp,
            }),
            Source::Replay(replay) => {
                let point = replay.data.state_at(name, replay.clock.current())?;
                Some(PlayerState {
                    name: name.to_string(),
                    team: point.team,
                    position: point.position,
                    yaw: point.yaw,
                    dead: point.dead,
                    weapon: point.weapon,
                    timestamp: point.timestamp,
                })
            }
        }
    }

    /// Kills and deaths per player, including disconnected players
    pub fn scoreboard(&self) -> Vec<ScoreLine> {
        let mut lines: Vec<ScoreLine> = match &self.source {
            Source::Idle => Vec::new(),
            Source::Live(live) => live
                .listener
                .roster()
                .snapshots()
                .into_iter()
                .map(|s| ScoreLine {
                    disconnected: self.estimator.is_disconnected(&s.name),
                    name: s.name,
                    team: s.team,
                    kills: s.kills,
                    deaths: s.deaths,
                })
                .collect(),
            Source::Replay(replay) => {
                let at = replay.clock.current();
                replay
                    .data
                    .players
                    .keys()
                    .filter_map(|name| {
                        // Counters as of the latest recorded row, held between lives
                        let point = replay.data.state_at(name, at)?;
                        Some(ScoreLine {
                            name: name.clone(),
                            team: point.team,
                            kills: point.kills,
                            deaths: point.deaths,
                            disconnected: self.estimator.is_disconnected(name),
                        })
                    })
                    .collect()
            }
        };
        lines.sort_by(|a, b| b.kills.cmp(&a.kills).then(a.deaths.cmp(&b.deaths)).then(a.name.cmp(&b.name)));
        lines
    }

    /// Kills so far: the roster's live kill list, or up to the playback time
    pub fn kill_feed(&self) -> Vec<KillEvent> {
        match &self.source {
            Source::Idle => Vec::new(),
            Source::Live(live) => live.listener.roster().kills(),
            Source::Replay(replay) => replay.data.kills_until(replay.clock.current()),
        }
    }

    pub fn follow_target(&self) -> Option<FollowTarget> {
        let name = self.follow.as_deref()?;
        match &self.source {
            Source::Idle => None,
            Source::Live(live) => pov::resolve_live(live.listener.roster(), name),
            Source::Replay(replay) => pov::resolve_replay(&replay.data, name, replay.clock.current()),
        }
    }
}
