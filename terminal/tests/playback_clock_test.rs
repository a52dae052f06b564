use std::time::Duration;
use terminal::replay::player::{PlaybackClock, PlaybackState, TickOutcome};
use terminal::replay::reader::HistoryReader;

/// One player sampled every 0.5s from 0 to 30
fn clock() -> PlaybackClock {
    let mut text = String::from("timestamp,playername,posx,posy,posz\n");
    for i in 0..=60 {
        text.push_str(&format!("{},Alpha,{},0,0\n", i as f64 * 0.5, i as f64 * 0.1));
    }
    PlaybackClock::for_replay(&HistoryReader::parse_history(&text))
}

#[test]
fn test_clock_spans_history() {
    let clock = clock();
    assert_eq!(clock.min(), 0.0);
    assert_eq!(clock.max(), 30.0);
    assert_eq!(clock.point_count(), 61);
    assert_eq!(clock.state(), PlaybackState::Stopped);
}

#[test]
fn test_loop_lands_on_start_marker() {
    let mut clock = clock();
    clock.set_marker_at(10.0);
    clock.set_marker_at(20.0);
    clock.toggle_loop();

    clock.scrub(19.0);
    clock.toggle_play();
    // 19.0 + 1.5 would land on 20.5
    assert_eq!(clock.tick(Duration::from_millis(1500)), TickOutcome::Looped);
    assert_eq!(clock.current(), 10.0);
    assert!(clock.is_playing());
}

#[test]
fn test_loop_off_plays_through() {
    let mut clock = clock();
    clock.set_marker_at(10.0);
    clock.set_marker_at(20.0);

    clock.scrub(19.0);
    clock.toggle_play();
    assert_eq!(clock.tick(Duration::from_millis(1500)), TickOutcome::Advanced);
    assert_eq!(clock.current(), 20.5);
}

#[test]
fn test_scrub_then_play_resumes_from_scrub_point() {
    let mut clock = clock();
    clock.toggle_play();
    clock.tick(Duration::from_secs(3));
    clock.toggle_play();

    clock.scrub(22.0);
    clock.toggle_play();
    assert_eq!(clock.current(), 22.0);
    clock.tick(Duration::from_millis(250));
    assert_eq!(clock.current(), 22.25);
    assert_eq!(clock.index(), 44);
}

#[test]
fn test_playing_to_the_end_pauses() {
    let mut clock = clock();
    clock.set_speed(4.0);
    clock.toggle_play();

    let mut outcome = TickOutcome::Advanced;
    for _ in 0..100 {
        outcome = clock.tick(Duration::from_millis(100));
        if outcome == TickOutcome::Finished {
            break;
        }
    }
    assert_eq!(outcome, TickOutcome::Finished);
    assert_eq!(clock.state(), PlaybackState::Paused);
    assert_eq!(clock.current(), 30.0);
    assert_eq!(clock.tick(Duration::from_secs(1)), TickOutcome::Idle);
}

#[test]
fn test_third_marker_clears_loop() {
    let mut clock = clock();
    clock.set_marker_at(20.0);
    clock.set_marker_at(10.0);
    assert_eq!(clock.bookmarks().start(), Some(10.0));
    assert!(clock.toggle_loop());

    clock.set_marker_at(5.0);
    assert!(clock.bookmarks().loop_range().is_none());
    assert!(clock.bookmarks().start().is_none());
}
