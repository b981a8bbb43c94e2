//! Recorded position traces (JSON lines, optionally gzipped).
//!
//! Each non-empty line is either a `Position` or `{"error": LocationError}`.

use super::{LocationError, PositionSource, PositionUpdate, Subscription};
use crate::error::NavResult;
use crate::types::Position;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TraceRecord {
    Fix(Position),
    Failure { error: LocationError },
}

pub fn read_trace(reader: impl BufRead) -> Result<Vec<PositionUpdate>, TraceError> {
    let mut updates = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: TraceRecord = serde_json::from_str(trimmed).map_err(|source| {
            TraceError::Parse {
                line: idx + 1,
                source,
            }
        })?;

        updates.push(match record {
            TraceRecord::Fix(position) => Ok(position),
            TraceRecord::Failure { error } => Err(error),
        });
    }

    Ok(updates)
}

/// Open a `.jsonl` or `.jsonl.gz` trace
pub fn open_trace(path: impl AsRef<Path>) -> Result<Vec<PositionUpdate>, TraceError> {
    let path = path.as_ref();
    let file = File::open(path)?;

    if path.extension().map(|ext| ext == "gz").unwrap_or(false) {
        read_trace(BufReader::new(GzDecoder::new(file)))
    } else {
        read_trace(BufReader::new(file))
    }
}

/// Source that replays a fixed list of updates once, then closes
pub struct ReplayPositionSource {
    updates: Option<Vec<PositionUpdate>>,
}

impl ReplayPositionSource {
    pub fn new(updates: Vec<PositionUpdate>) -> Self {
        ReplayPositionSource {
            updates: Some(updates),
        }
    }
}

impl PositionSource for ReplayPositionSource {
    fn subscribe(&mut self) -> NavResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let updates = self.updates.take().unwrap_or_default();
        log::debug!("Replaying {} recorded updates", updates.len());

        for update in updates {
            if tx.send(update).is_err() {
                break;
            }
        }
        // Dropping the sender closes the stream after the last update
        Ok(Subscription::new(rx, || {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::LocationErrorKind;
    use crate::types::GeoPoint;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    const TRACE: &str = r#"
# walk around the block
{"point":{"latitude":51.5,"longitude":-0.1},"timestamp":"2024-05-01T12:00:00Z"}
{"error":{"kind":"timeout","message":"no fix"}}

{"point":{"latitude":51.5001,"longitude":-0.1},"timestamp":"2024-05-01T12:00:02Z"}
"#;

    #[test]
    fn test_read_trace() {
        let updates = read_trace(Cursor::new(TRACE)).unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(
            updates[0].as_ref().unwrap().point,
            GeoPoint::new(51.5, -0.1)
        );
        assert_eq!(
            updates[1].as_ref().unwrap_err().kind,
            LocationErrorKind::Timeout
        );
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = read_trace(Cursor::new("{\"point\": 3}\n")).unwrap_err();
        assert!(matches!(err, TraceError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_open_gzipped_trace() {
        let dir = std::env::temp_dir().join(format!("nav_trace_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("walk.jsonl.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(TRACE.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let updates = open_trace(&path).unwrap();
        assert_eq!(updates.len(), 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_replay_source_closes_after_last_update() {
        let updates = read_trace(Cursor::new(TRACE)).unwrap();
        let mut source = ReplayPositionSource::new(updates);
        let mut sub = source.subscribe().unwrap();

        let mut count = 0;
        while sub.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);

        // Second subscription replays nothing
        let mut again = source.subscribe().unwrap();
        assert!(again.recv().await.is_none());
    }
}
