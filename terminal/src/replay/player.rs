use super::bookmarks::Bookmarks;
use super::*;
use std::time::Duration;
use tracing::debug;

/// Speed multipliers offered by [`PlaybackClock::cycle_speed`]
pub const SPEED_PRESETS: [f64; 5] = [0.25, 0.5, 1.0, 2.0, 4.0];

const MIN_SPEED: f64 = 0.05;
const MAX_SPEED: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// What a call to [`PlaybackClock::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing changed
    Idle,
    Advanced,
    /// Reached the loop end and jumped back to the loop start
    Looped,
    /// Reached the end of the timeline and paused
    Finished,
}

/// Replay clock over the recorded timeline.
///
/// `current` is continuous time; `index` is the latest recorded point at or
/// before it. Wall-clock deltas are scaled by `speed` while playing.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    timeline: Vec<f64>,
    index: usize,
    current: f64,
    accumulator: f64,
    min: f64,
    max: f64,
    state: PlaybackState,
    speed: f64,
    bookmarks: Bookmarks,
}

impl PlaybackClock {
    /// Clock over the given point timestamps (sorted ascending) and bounds
    pub fn new(timeline: Vec<f64>, min: f64, max: f64) -> Self {
        Self {
            timeline,
            index: 0,
            current: min,
            accumulator: min,
            min,
            max,
            state: PlaybackState::Stopped,
            speed: 1.0,
            bookmarks: Bookmarks::default(),
        }
    }

    pub fn for_replay(replay: &ReplayData) -> Self {
        Self::new(replay.timeline(), replay.min_timestamp, replay.max_timestamp)
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn point_count(&self) -> usize {
        self.timeline.len()
    }

    pub fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    /// Fraction of the timeline already played, for progress bars
    pub fn progress(&self) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.current - self.min) / span).clamp(0.0, 1.0)
    }

    fn at_end(&self) -> bool {
        self.current >= self.max
    }

    fn is_last_point(&self) -> bool {
        self.index + 1 >= self.timeline.len()
    }

    /// Move to `at` without changing the playback state
    fn seek(&mut self, at: f64) {
        self.current = at.clamp(self.min, self.max.max(self.min));
        self.accumulator = self.current;
        self.index = self
            .timeline
            .partition_point(|&t| t <= self.current)
            .saturating_sub(1);
    }

    /// Play↔pause. Resuming at the end of the timeline restarts from the start.
    pub fn toggle_play(&mut self) {
        self.state = match self.state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused | PlaybackState::Stopped => {
                if self.at_end() {
                    self.seek(self.min);
                }
                self.accumulator = self.current;
                PlaybackState::Playing
            }
        };
        debug!(state = ?self.state, at = self.current, "Playback toggled");
    }

    /// Back to the start, stopped
    pub fn reset(&mut self) {
        self.seek(self.min);
        self.index = 0;
        self.state = PlaybackState::Stopped;
    }

    pub fn skip_seconds(&mut self, delta: f64) {
        self.seek(self.current + delta);
    }

    /// Move by `ticks` recorded points rather than by time
    pub fn skip_ticks(&mut self, ticks: i64) {
        if self.timeline.is_empty() {
            return;
        }
        let last = (self.timeline.len() - 1) as i64;
        self.index = (self.index as i64 + ticks).clamp(0, last) as usize;
        self.current = self.timeline[self.index];
        self.accumulator = self.current;
    }

    /// Jump straight to `at`, e.g. from a click on the timeline bar
    pub fn scrub(&mut self, at: f64) {
        self.seek(at);
    }

    /// Change the rate of timeline time per wall-clock second
    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() {
            self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        }
    }

    /// Step to the next speed preset, wrapping around
    pub fn cycle_speed(&mut self) -> f64 {
        let next = SPEED_PRESETS
            .iter()
            .copied()
            .find(|&preset| preset > self.speed + f64::EPSILON)
            .unwrap_or(SPEED_PRESETS[0]);
        self.set_speed(next);
        self.speed
    }

    /// Set the next loop marker at the current time (or clear both)
    pub fn mark(&mut self) {
        let at = self.current;
        self.bookmarks.mark(at);
    }

    /// Set the next loop marker at an arbitrary time
    pub fn set_marker_at(&mut self, at: f64) {
        self.bookmarks.mark(at.clamp(self.min, self.max.max(self.min)));
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.bookmarks.toggle_loop()
    }

    /// Advance by one frame's wall-clock delta while playing.
    pub fn tick(&mut self, wall_delta: Duration) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::Idle;
        }

        self.accumulator += wall_delta.as_secs_f64() * self.speed;
        while self.index + 1 < self.timeline.len() && self.timeline[self.index + 1] <= self.accumulator {
            self.index += 1;
        }
        self.current = self.accumulator;

        if let Some((start, end)) = self.bookmarks.loop_range() {
            if self.current >= end {
                self.seek(start);
                return TickOutcome::Looped;
            }
        }

        if self.at_end() || self.is_last_point() {
            self.current = self.current.min(self.max);
            self.accumulator = self.current;
            self.state = PlaybackState::Paused;
            return TickOutcome::Finished;
        }

        TickOutcome::Advanced
    }
}
