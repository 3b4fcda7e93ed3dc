//! [`FusionTailer`] – live merge of the per-source observation logs.
//!
//! Each sensor producer is an independent single writer of its own
//! append-only log; the tailer is the matching many-reader.  It polls every
//! log on a fixed interval, retains the latest value per source until
//! overwritten, and emits one merged record on its own separate timer — so
//! fusion latency is bounded by poll interval plus emit interval, and a fast
//! sensor can never starve a slow one.
//!
//! Shutdown is cooperative: the driving future finishes the tick in flight
//! and stops pulling input; there is no mid-step cancellation.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use skytrack_types::{
    ObsStatus, Observation, RECORD_VERSION, SourceId, TimeBase, TrackError, jsonl,
};
use tracing::{info, warn};

use crate::batch::FUSED_LOG;
use crate::fusion::fuse;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Timing policy for the live tailer.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// How often each per-source log is polled for new lines.
    pub poll_interval: Duration,
    /// How often a merged record is emitted from the retained values.
    pub emit_interval: Duration,
    /// When set, a synthetic `NO_SIGNAL` record is emitted at most once per
    /// this interval while no candidate exists.  `None` disables the policy.
    pub no_signal_interval: Option<Duration>,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            emit_interval: Duration::from_millis(200),
            no_signal_interval: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LogTail
// ────────────────────────────────────────────────────────────────────────────

/// Byte-offset reader over one append-only JSONL log.
///
/// Only complete (newline-terminated) lines are consumed; a partially
/// written trailing line stays in the file until its writer finishes it.  A
/// file that does not exist yet is "no data".  A file that shrank below the
/// remembered offset is read again from the start.
pub struct LogTail {
    path: PathBuf,
    offset: u64,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    /// Return every parseable record appended since the previous poll.
    pub fn poll(&mut self) -> Vec<Observation> {
        let Ok(mut file) = File::open(&self.path) else {
            return Vec::new();
        };
        if let Ok(meta) = file.metadata() {
            if meta.len() < self.offset {
                self.offset = 0;
            }
        }
        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return Vec::new();
        }

        let mut buf = Vec::new();
        if file.read_to_end(&mut buf).is_err() {
            return Vec::new();
        }

        let mut records = Vec::new();
        let mut consumed = 0usize;
        for line in buf.split_inclusive(|&b| b == b'\n') {
            if line.last() != Some(&b'\n') {
                break;
            }
            // A complete line is consumed whether or not it parses: one
            // corrupt line must never stall the tail.
            consumed += line.len();
            let Ok(line) = std::str::from_utf8(line) else {
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Observation>(line) {
                Ok(record) => records.push(record),
                Err(_) => continue,
            }
        }
        self.offset += consumed as u64;
        records
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FusionTailer
// ────────────────────────────────────────────────────────────────────────────

/// Polls the vision/thermal/audio logs of one run and appends merged records
/// to `fused.jsonl`.
pub struct FusionTailer {
    config: TailerConfig,
    tails: Vec<(SourceId, LogTail)>,
    latest: HashMap<SourceId, Observation>,
    out_path: PathBuf,
    timebase: TimeBase,
    last_no_signal: Option<Instant>,
}

impl FusionTailer {
    /// Tail the conventional per-source logs under `obs_dir`.
    pub fn new(obs_dir: &Path, config: TailerConfig) -> Self {
        let tails = [
            (SourceId::Vision, "vision.jsonl"),
            (SourceId::Thermal, "thermal.jsonl"),
            (SourceId::Audio, "audio.jsonl"),
        ]
        .into_iter()
        .map(|(src, name)| (src, LogTail::new(obs_dir.join(name))))
        .collect();

        Self {
            config,
            tails,
            latest: HashMap::new(),
            out_path: obs_dir.join(FUSED_LOG),
            timebase: TimeBase::new(),
            last_no_signal: None,
        }
    }

    /// Drain every tail once, retaining the newest record per source.
    pub fn poll_once(&mut self) {
        for (source, tail) in &mut self.tails {
            if let Some(record) = tail.poll().into_iter().last() {
                self.latest.insert(*source, record);
            }
        }
    }

    /// Merge the retained values and append the result to `fused.jsonl`.
    ///
    /// With no candidate the configured `NO_SIGNAL` policy applies.  Returns
    /// the record written, if any.
    pub fn emit_once(&mut self) -> Result<Option<Observation>, TrackError> {
        let fused = fuse(
            self.latest.get(&SourceId::Vision),
            self.latest.get(&SourceId::Thermal),
            self.latest.get(&SourceId::Audio),
        );

        let record = match fused {
            Some(record) => record,
            None => match self.synthetic_no_signal() {
                Some(record) => record,
                None => return Ok(None),
            },
        };

        jsonl::append_record(&self.out_path, &record)?;
        Ok(Some(record))
    }

    /// Run poll and emit timers until `shutdown` resolves.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), TrackError> {
        let mut poll_tick = tokio::time::interval(self.config.poll_interval);
        let mut emit_tick = tokio::time::interval(self.config.emit_interval);
        tokio::pin!(shutdown);

        info!(path = %self.out_path.display(), "fusion tailer started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = poll_tick.tick() => self.poll_once(),
                _ = emit_tick.tick() => {
                    if let Err(e) = self.emit_once() {
                        // The output log must not take the tailer down with it.
                        warn!(error = %e, "failed to append fused record");
                    }
                }
            }
        }
        info!("fusion tailer stopped");
        Ok(())
    }

    /// Rate-limited synthetic record for "all sources silent".
    fn synthetic_no_signal(&mut self) -> Option<Observation> {
        let interval = self.config.no_signal_interval?;
        if let Some(last) = self.last_no_signal {
            if last.elapsed() < interval {
                return None;
            }
        }
        self.last_no_signal = Some(Instant::now());
        Some(Observation {
            version: Some(RECORD_VERSION.to_string()),
            time: self.timebase.now(),
            source: SourceId::Fusion,
            bearing_deg: None,
            roi: None,
            confidence: None,
            status: ObsStatus::NoSignal,
            extras: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skytrack_types::TimeStamp;

    fn obs(source: SourceId, mono_ms: i64, bearing: f64) -> Observation {
        Observation {
            version: None,
            time: TimeStamp {
                mono_ms,
                epoch_ms: mono_ms,
            },
            source,
            bearing_deg: Some(bearing),
            roi: None,
            confidence: Some(0.7),
            status: ObsStatus::Ok,
            extras: None,
        }
    }

    // ------------------------------------------------------------------ LogTail

    #[test]
    fn tail_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut tail = LogTail::new(dir.path().join("vision.jsonl"));
        assert!(tail.poll().is_empty());
    }

    #[test]
    fn tail_consumes_each_line_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vision.jsonl");
        let mut tail = LogTail::new(&path);

        jsonl::append_record(&path, &obs(SourceId::Vision, 1, 10.0)).unwrap();
        assert_eq!(tail.poll().len(), 1);
        assert!(tail.poll().is_empty());

        jsonl::append_record(&path, &obs(SourceId::Vision, 2, 11.0)).unwrap();
        jsonl::append_record(&path, &obs(SourceId::Vision, 3, 12.0)).unwrap();
        let records = tail.poll();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].time.mono_ms, 3);
    }

    #[test]
    fn tail_leaves_partial_lines_for_the_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.jsonl");
        std::fs::write(
            &path,
            "{\"time\":{\"mono_ms\":1},\"source\":\"audio\",\"bearing_deg\":5.0,\"status\":\"OK\"}\n{\"time\":{\"mono_ms\":2",
        )
        .unwrap();

        let mut tail = LogTail::new(&path);
        assert_eq!(tail.poll().len(), 1);

        // Writer finishes the second line.
        let mut existing = std::fs::read_to_string(&path).unwrap();
        existing.push_str(",\"epoch_ms\":0},\"source\":\"audio\",\"bearing_deg\":6.0,\"status\":\"OK\"}\n");
        std::fs::write(&path, existing).unwrap();

        let records = tail.poll();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time.mono_ms, 2);
    }

    #[test]
    fn tail_survives_non_utf8_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thermal.jsonl");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"{\"time\":{\"mono_ms\":1},\"source\":\"thermal\",\"bearing_deg\":3.0,\"status\":\"OK\"}\n",
        );
        bytes.extend_from_slice(b"\xff\xfe corrupt bytes\n");
        std::fs::write(&path, bytes).unwrap();

        let mut tail = LogTail::new(&path);
        assert_eq!(tail.poll().len(), 1);

        // The corrupt line is consumed, so records appended afterwards still
        // come through.
        jsonl::append_record(&path, &obs(SourceId::Thermal, 2, 4.0)).unwrap();
        let records = tail.poll();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time.mono_ms, 2);
    }

    #[test]
    fn tail_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vision.jsonl");
        std::fs::write(
            &path,
            "junk\n{\"time\":{\"mono_ms\":9},\"source\":\"vision\",\"bearing_deg\":1.0,\"status\":\"OK\"}\n",
        )
        .unwrap();

        let mut tail = LogTail::new(&path);
        let records = tail.poll();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time.mono_ms, 9);
    }

    // ------------------------------------------------------------------ FusionTailer

    #[test]
    fn poll_then_emit_produces_a_merged_record() {
        let dir = tempfile::tempdir().unwrap();
        jsonl::append_record(
            &dir.path().join("vision.jsonl"),
            &obs(SourceId::Vision, 100, 40.0),
        )
        .unwrap();
        jsonl::append_record(
            &dir.path().join("audio.jsonl"),
            &obs(SourceId::Audio, 110, 50.0),
        )
        .unwrap();

        let mut tailer = FusionTailer::new(dir.path(), TailerConfig::default());
        tailer.poll_once();
        let emitted = tailer.emit_once().unwrap().unwrap();
        assert_eq!(emitted.status, ObsStatus::Ok);
        assert_eq!(emitted.source, SourceId::Fusion);

        let written: Vec<Observation> = jsonl::read_records(&dir.path().join(FUSED_LOG));
        assert_eq!(written.len(), 1);
    }

    #[test]
    fn latest_value_per_source_persists_between_emits() {
        let dir = tempfile::tempdir().unwrap();
        jsonl::append_record(
            &dir.path().join("audio.jsonl"),
            &obs(SourceId::Audio, 50, 20.0),
        )
        .unwrap();

        let mut tailer = FusionTailer::new(dir.path(), TailerConfig::default());
        tailer.poll_once();

        // Audio goes quiet, vision keeps producing: the retained audio value
        // still contributes to every later emit.
        jsonl::append_record(
            &dir.path().join("vision.jsonl"),
            &obs(SourceId::Vision, 60, 30.0),
        )
        .unwrap();
        tailer.poll_once();

        let emitted = tailer.emit_once().unwrap().unwrap();
        assert_eq!(emitted.status, ObsStatus::Ok);
        assert_eq!(
            emitted.extras.unwrap().sources,
            vec![SourceId::Vision, SourceId::Audio]
        );
    }

    #[test]
    fn no_candidates_and_no_policy_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = FusionTailer::new(dir.path(), TailerConfig::default());
        tailer.poll_once();
        assert!(tailer.emit_once().unwrap().is_none());
        assert!(!dir.path().join(FUSED_LOG).exists());
    }

    #[test]
    fn synthetic_no_signal_is_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = FusionTailer::new(
            dir.path(),
            TailerConfig {
                no_signal_interval: Some(Duration::from_millis(50)),
                ..TailerConfig::default()
            },
        );

        let first = tailer.emit_once().unwrap();
        assert_eq!(first.unwrap().status, ObsStatus::NoSignal);
        // Immediately again: suppressed by the rate limit.
        assert!(tailer.emit_once().unwrap().is_none());

        std::thread::sleep(Duration::from_millis(60));
        assert!(tailer.emit_once().unwrap().is_some());
    }

    #[tokio::test]
    async fn run_polls_and_emits_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        jsonl::append_record(
            &dir.path().join("vision.jsonl"),
            &obs(SourceId::Vision, 10, 15.0),
        )
        .unwrap();

        let tailer = FusionTailer::new(
            dir.path(),
            TailerConfig {
                poll_interval: Duration::from_millis(5),
                emit_interval: Duration::from_millis(10),
                no_signal_interval: None,
            },
        );
        tailer
            .run(tokio::time::sleep(Duration::from_millis(60)))
            .await
            .unwrap();

        let written: Vec<Observation> = jsonl::read_records(&dir.path().join(FUSED_LOG));
        assert!(!written.is_empty());
        assert_eq!(written[0].status, ObsStatus::Degraded);
    }
}
