use super::segmenter::{Placement, Segmenter};
use super::*;
use anyhow::Result;
use common::schema::columns;
use common::{AUTO_TIMESTAMP_STEP, Decoded, KillTracker, RecordDecoder, record::parse_float, split_record};
use flate2::read::GzDecoder;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extensions recognised as telemetry history logs
const HISTORY_EXTENSIONS: [&str; 4] = ["csv", "log", "txt", "gz"];

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to open history file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Incremental history scan: schema detection, segmentation and kill
/// reconstruction over rows in file order.
#[derive(Debug, Default)]
pub struct HistoryBuilder {
    decoder: RecordDecoder,
    segmenter: Segmenter,
    kill_tracker: KillTracker,
    kills: Vec<KillEvent>,
    bounds: Option<(f64, f64)>,
    metadata: HistoryMetadata,
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        let fields = split_record(line);
        let mut snapshot = match self.decoder.decode_fields(&fields) {
            Decoded::Record(snapshot) => snapshot,
            Decoded::Rejected => {
                self.metadata.rows_skipped += 1;
                return;
            }
            Decoded::Header | Decoded::Blank => return,
        };

        let (has_position, has_timestamp) = match self.decoder.columns() {
            Some(columns) => (
                columns.has(columns::POS_X) || columns.has(columns::POS_Y) || columns.has(columns::POS_Z),
                columns.has(columns::TIMESTAMP),
            ),
            None => (false, false),
        };
        if !has_position && fields.len() >= 3 {
            snapshot.position = Vec3::new(
                parse_float(fields[0]),
                parse_float(fields[1]),
                parse_float(fields[2]),
            );
        }
        if !has_timestamp {
            snapshot.timestamp = self.metadata.rows_accepted as f64 * AUTO_TIMESTAMP_STEP;
        }

        if self.metadata.map.is_none() && !snapshot.map.is_empty() {
            self.metadata.map = Some(snapshot.map.clone());
        }
        if self.metadata.game_type.is_none() && !snapshot.game_type.is_empty() {
            self.metadata.game_type = Some(snapshot.game_type.clone());
        }

        let kills = self.kill_tracker.observe(&snapshot);
        self.kills.extend(kills);

        let timestamp = snapshot.timestamp;
        match self.segmenter.push(&snapshot.name, PathPoint::from(&snapshot)) {
            Placement::Dropped => self.metadata.rows_skipped += 1,
            _ => {
                self.metadata.rows_accepted += 1;
                self.bounds = Some(match self.bounds {
                    Some((min, max)) => (min.min(timestamp), max.max(timestamp)),
                    None => (timestamp, timestamp),
                });
            }
        }
    }

    pub fn finish(self, complete: bool) -> ReplayData {
        let (min_timestamp, max_timestamp) = self.bounds.unwrap_or((0.0, 0.0));
        ReplayData {
            metadata: HistoryMetadata {
                complete,
                ..self.metadata
            },
            players: self.segmenter.finish(),
            kills: self.kills,
            min_timestamp,
            max_timestamp,
        }
    }
}

pub struct HistoryReader;

impl HistoryReader {
    /// Load a history file. Files ending in `.gz` are decompressed.
    ///
    /// Only a failure to open is an error. A read error partway through keeps
    /// everything parsed so far and marks the metadata incomplete.
    pub fn load_history(path: &Path) -> Result<ReplayData, HistoryError> {
        let file = File::open(path).map_err(|source| HistoryError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let reader: Box<dyn Read> = if path.extension() == Some(OsStr::new("gz")) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut data = Self::read_history(BufReader::new(reader));
        data.metadata.source = Some(path.to_path_buf());
        info!(
            "Loaded history {:?}: {} players, {} points, {} kills, {:.1}s",
            path,
            data.players.len(),
            data.point_count(),
            data.kills.len(),
            data.max_timestamp - data.min_timestamp
        );
        Ok(data)
    }

    /// Scan rows from any buffered reader. Invalid UTF-8 is replaced rather
    /// than rejected.
    pub fn read_history<R: BufRead>(mut reader: R) -> ReplayData {
        let mut builder = HistoryBuilder::new();
        let mut line = Vec::new();
        let mut line_number = 0usize;

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => return builder.finish(true),
                Ok(_) => {
                    line_number += 1;
                    builder.push_line(&String::from_utf8_lossy(&line));
                }
                Err(e) => {
                    warn!("History read failed after line {}: {}", line_number, e);
                    return builder.finish(false);
                }
            }
        }
    }

    /// Parse history text already in memory
    pub fn parse_history(text: &str) -> ReplayData {
        Self::read_history(text.as_bytes())
    }

    pub fn list_histories(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut histories = Vec::new();

        fn find_history_files(dir: &Path, histories: &mut Vec<PathBuf>) -> Result<()> {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();

                if path.is_dir() {
                    if let Err(e) = find_history_files(&path, histories) {
                        debug!("Skipping {:?}: {}", path, e);
                    }
                } else if path
                    .extension()
                    .and_then(OsStr::to_str)
                    .is_some_and(|ext| HISTORY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                {
                    histories.push(path);
                }
            }
            Ok(())
        }

        find_history_files(dir, &mut histories)?;

        // Newest first
        histories.sort_by_key(|path| {
            std::cmp::Reverse(
                path.metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH),
            )
        });

        Ok(histories)
    }
}
