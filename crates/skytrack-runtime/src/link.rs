//! [`LinkMonitor`] – telemetry-link health feed for the command gate.
//!
//! The telemetry bridge appends its own JSONL log; only the newest record's
//! `link_status` matters here.  A missing or empty log retains the previous
//! value, and a monitor that has never seen a record reports `OK` — link
//! policy is the gate's job, this is just the feed.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use skytrack_types::{LinkStatus, jsonl};

/// File name of the telemetry log inside a run directory.
pub const TELEMETRY_LOG: &str = "telemetry.jsonl";

#[derive(Debug, Deserialize)]
struct TelemetryRecord {
    link_status: LinkStatus,
}

/// Tracks the newest reported [`LinkStatus`] of one run.
pub struct LinkMonitor {
    path: PathBuf,
    current: LinkStatus,
}

impl LinkMonitor {
    pub fn new(run_dir: &Path) -> Self {
        Self {
            path: run_dir.join(TELEMETRY_LOG),
            current: LinkStatus::Ok,
        }
    }

    /// Re-read the telemetry log and return the newest known status.
    pub fn poll(&mut self) -> LinkStatus {
        if let Some(record) = jsonl::read_records::<TelemetryRecord>(&self.path)
            .into_iter()
            .last()
        {
            self.current = record.link_status;
        }
        self.current
    }

    /// Newest known status without re-reading the log.
    pub fn current(&self) -> LinkStatus {
        self.current
    }
}
