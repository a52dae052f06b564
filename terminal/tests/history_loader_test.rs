use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use terminal::replay::reader::HistoryReader;

const HEADER: &str = "timestamp,map,gametype,playername,team,posx,posy,posz,isdead,kills,deaths,weapon";

fn row(timestamp: f64, name: &str, team: &str, x: f32, dead: bool, kills: u32, deaths: u32) -> String {
    format!(
        "{},Lockout,Slayer,{},{},{},0,0,{},{},{},Battle Rifle",
        timestamp, name, team, x, dead as u8, kills, deaths
    )
}

fn history(rows: &[String]) -> String {
    let mut text = String::from(HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("telemetry-{}-{}", std::process::id(), name))
}

#[test]
fn test_teleport_opens_new_segment() {
    let data = HistoryReader::parse_history(&history(&[
        row(0.0, "Alpha", "red", 0.0, false, 0, 0),
        row(1.0, "Alpha", "red", 5.0, false, 0, 0),
        row(2.0, "Alpha", "red", 20.0, false, 0, 0),
    ]));

    let segments = data.segments("Alpha");
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].len(), 2);
    assert_eq!(segments[1].first().position.x, 20.0);
    assert_eq!(data.min_timestamp, 0.0);
    assert_eq!(data.max_timestamp, 2.0);
    assert_eq!(data.metadata.map.as_deref(), Some("Lockout"));
    assert_eq!(data.metadata.game_type.as_deref(), Some("Slayer"));
}

#[test]
fn test_kill_attributed_to_recent_death() {
    let data = HistoryReader::parse_history(&history(&[
        row(4.0, "Alpha", "red", 0.0, false, 0, 0),
        row(4.0, "Bravo", "blue", 50.0, false, 0, 0),
        row(5.0, "Bravo", "blue", 50.0, true, 0, 1),
        row(5.2, "Alpha", "red", 0.0, false, 1, 0),
    ]));

    assert_eq!(data.kills.len(), 1);
    let kill = &data.kills[0];
    assert_eq!(kill.killer, "Alpha");
    assert_eq!(kill.killer_team, 0);
    assert_eq!(kill.victim, "Bravo");
    assert_eq!(kill.victim_team, 1);
    assert_eq!(kill.timestamp, 5.2);
    assert_eq!(kill.weapon, "Battle Rifle");

    assert!(data.kills_until(5.1).is_empty());
    assert_eq!(data.kills_until(6.0).len(), 1);
}

#[test]
fn test_first_row_death_is_attributed() {
    // Bravo's first recorded row is the dying row
    let data = HistoryReader::parse_history(&history(&[
        row(0.0, "Alpha", "red", 0.0, false, 0, 0),
        row(5.0, "Bravo", "blue", 50.0, true, 0, 1),
        row(5.2, "Alpha", "red", 0.0, false, 1, 0),
    ]));

    assert_eq!(data.kills.len(), 1);
    assert_eq!(data.kills[0].killer, "Alpha");
    assert_eq!(data.kills[0].victim, "Bravo");
    assert_eq!(data.kills[0].victim_team, 1);
}

#[test]
fn test_first_row_kills_are_not_dropped() {
    let data = HistoryReader::parse_history(&history(&[row(3.0, "Alpha", "red", 0.0, false, 2, 0)]));

    assert_eq!(data.kills.len(), 2);
    assert!(data.kills.iter().all(|kill| kill.victim == common::UNKNOWN_VICTIM));
}

#[test]
fn test_unmatched_kill_has_unknown_victim() {
    let data = HistoryReader::parse_history(&history(&[
        row(1.0, "Alpha", "red", 0.0, false, 0, 0),
        row(9.0, "Alpha", "red", 0.0, false, 1, 0),
    ]));

    assert_eq!(data.kills.len(), 1);
    assert_eq!(data.kills[0].victim, common::UNKNOWN_VICTIM);
    assert_eq!(data.kills[0].victim_team, common::UNKNOWN_TEAM);
}

#[test]
fn test_gzip_history_matches_plain() -> Result<()> {
    let text = history(&[
        row(0.0, "Alpha", "red", 0.0, false, 0, 0),
        row(0.5, "Alpha", "red", 1.0, false, 0, 0),
        row(0.5, "Bravo", "green", 9.0, false, 0, 0),
    ]);

    let plain_path = temp_path("plain.csv");
    fs::write(&plain_path, &text)?;

    let gz_path = temp_path("compressed.csv.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&gz_path)?, Compression::default());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()?;

    let plain = HistoryReader::load_history(&plain_path)?;
    let compressed = HistoryReader::load_history(&gz_path)?;

    assert_eq!(plain.players, compressed.players);
    assert_eq!(compressed.player_names(), vec!["Alpha", "Bravo"]);
    assert_eq!(compressed.metadata.source.as_deref(), Some(gz_path.as_path()));
    assert!(compressed.metadata.complete);

    fs::remove_file(plain_path)?;
    fs::remove_file(gz_path)?;
    Ok(())
}

/// Yields its text once, then fails every read
struct FailingReader {
    inner: io::Cursor<Vec<u8>>,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "disk went away"));
        }
        Ok(n)
    }
}

impl BufRead for FailingReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.inner.position() as usize >= self.inner.get_ref().len() {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "disk went away"));
        }
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

#[test]
fn test_read_error_keeps_partial_data() {
    let text = history(&[
        row(1.0, "Alpha", "red", 0.0, false, 0, 0),
        row(2.0, "Alpha", "red", 1.0, false, 0, 0),
    ]);
    let data = HistoryReader::read_history(FailingReader {
        inner: io::Cursor::new(text.into_bytes()),
    });

    assert!(!data.metadata.complete);
    assert_eq!(data.point_count(), 2);
    assert_eq!(data.max_timestamp, 2.0);
}

#[test]
fn test_malformed_rows_are_skipped() {
    let mut text = history(&[row(1.0, "Alpha", "red", 0.0, false, 0, 0)]);
    text.push_str(",,,,\n");
    text.push_str("3.0,Lockout,Slayer,,red,0,0,0,0,0,0,Magnum\n");
    text.push_str(&row(4.0, "Alpha", "red", 1.0, false, 0, 0));

    let data = HistoryReader::parse_history(&text);
    assert_eq!(data.point_count(), 2);
    assert_eq!(data.metadata.rows_skipped, 1);
}

#[test]
fn test_list_histories_filters_extensions() -> Result<()> {
    let dir = temp_path("listing");
    fs::create_dir_all(dir.join("nested"))?;
    fs::write(dir.join("match.csv"), HEADER)?;
    fs::write(dir.join("nested").join("older.log"), HEADER)?;
    fs::write(dir.join("notes.md"), "not a log")?;

    let mut names: Vec<String> = HistoryReader::list_histories(&dir)?
        .iter()
        .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
        .collect();
    names.sort();
    assert_eq!(names, vec!["match.csv", "older.log"]);

    assert!(HistoryReader::list_histories(&dir.join("missing"))?.is_empty());
    fs::remove_dir_all(dir)?;
    Ok(())
}

#[test]
fn test_summary_serializes() -> Result<()> {
    let data = HistoryReader::parse_history(&history(&[
        row(4.0, "Alpha", "red", 0.0, false, 0, 0),
        row(4.0, "Bravo", "blue", 50.0, false, 0, 0),
        row(5.0, "Bravo", "blue", 50.0, true, 0, 1),
        row(5.2, "Alpha", "red", 0.0, false, 1, 0),
    ]));

    let summary = data.summary();
    let alpha = summary.players.iter().find(|p| p.name == "Alpha").unwrap();
    assert_eq!(alpha.kills, 1);
    assert_eq!(alpha.deaths, 0);

    let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&summary)?)?;
    assert_eq!(json["players"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["kills"][0]["victim"], "Bravo");
    Ok(())
}
