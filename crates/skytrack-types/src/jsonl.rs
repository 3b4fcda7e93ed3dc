//! Line-delimited JSON helpers shared by every log producer and consumer.
//!
//! The core's durability rules live here: a missing or not-yet-created log
//! is "no data" rather than an error, and a malformed line is skipped so log
//! corruption can never halt the control loop.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::TrackError;

/// Read every parseable record from a JSONL file.
///
/// Returns an empty vector when the file does not exist or cannot be opened.
/// Blank and unparsable lines are skipped silently.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let mut records = Vec::new();
    // Split on raw bytes: a line of invalid UTF-8 is just another malformed
    // line to skip, not the end of the file.
    for line in BufReader::new(file).split(b'\n') {
        let Ok(bytes) = line else { break };
        let Ok(line) = std::str::from_utf8(&bytes) else {
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str::<T>(line) {
            records.push(record);
        }
    }
    records
}

/// Append one record to a JSONL file, creating it if necessary.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<(), TrackError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, &e))?;
    let line = serde_json::to_string(record).map_err(|e| io_err(path, &e))?;
    writeln!(file, "{line}").map_err(|e| io_err(path, &e))?;
    Ok(())
}

/// Truncate (or create) a JSONL file, returning the writable handle.
pub fn create_truncated(path: &Path) -> Result<File, TrackError> {
    File::create(path).map_err(|e| io_err(path, &e))
}

/// Append one serialized record to an already-open JSONL handle.
pub fn write_record<T: Serialize>(
    file: &mut File,
    path: &Path,
    record: &T,
) -> Result<(), TrackError> {
    let line = serde_json::to_string(record).map_err(|e| io_err(path, &e))?;
    writeln!(file, "{line}").map_err(|e| io_err(path, &e))?;
    Ok(())
}

/// Build a [`TrackError::Io`] for `path`.
pub fn io_err(path: &Path, details: &dyn std::fmt::Display) -> TrackError {
    TrackError::Io {
        path: path.display().to_string(),
        details: details.to_string(),
    }
}
