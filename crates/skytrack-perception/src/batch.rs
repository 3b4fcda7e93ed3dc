//! Offline batch fusion over a recorded run.
//!
//! [`fuse_run`] replays every per-source observation log of a run directory
//! in monotonic-time order, retaining the latest record per source and
//! emitting one fused record per input step, exactly as the live tailer
//! would have — with one addition: a cross-source staleness window.  When
//! both a vision and an audio candidate are present but their monotonic
//! timestamps differ by more than `max_gap_ms`, the step is dropped instead
//! of fused, so a stale cached reading from one source is never merged with
//! a much fresher reading from the other.

use std::collections::HashMap;
use std::path::Path;

use skytrack_types::{Observation, SourceId, TrackError, jsonl};
use tracing::{debug, info};

use crate::fusion::fuse;

/// Name of the merged output log inside the observations directory.
pub const FUSED_LOG: &str = "fused.jsonl";

/// Batch-pass policy.
#[derive(Debug, Clone)]
pub struct BatchFusionConfig {
    /// Maximum allowed |vision.mono_ms − audio.mono_ms| before a step is
    /// dropped rather than fused.
    pub max_gap_ms: i64,
}

impl Default for BatchFusionConfig {
    fn default() -> Self {
        Self { max_gap_ms: 200 }
    }
}

/// Fuse every observation log under `obs_dir` into `fused.jsonl`.
///
/// Reads all `*.jsonl` files except the output itself; malformed lines are
/// skipped, a missing file is simply an absent source.  The output is
/// rewritten from scratch.  Returns the number of fused records written.
///
/// # Errors
///
/// [`TrackError::MissingInput`] when the directory holds no parseable
/// observations at all; [`TrackError::Io`] when the output cannot be
/// written.
pub fn fuse_run(obs_dir: &Path, config: &BatchFusionConfig) -> Result<usize, TrackError> {
    let mut records = load_observations(obs_dir);
    if records.is_empty() {
        return Err(TrackError::MissingInput(format!(
            "no observations found under {}",
            obs_dir.display()
        )));
    }
    records.sort_by_key(|o| o.time.mono_ms);

    let out_path = obs_dir.join(FUSED_LOG);
    let mut out = jsonl::create_truncated(&out_path)?;

    let mut latest: HashMap<SourceId, Observation> = HashMap::new();
    let mut written = 0usize;
    for record in records {
        latest.insert(record.source, record);

        let vision = latest.get(&SourceId::Vision);
        let thermal = latest.get(&SourceId::Thermal);
        let audio = latest.get(&SourceId::Audio);

        if let (Some(v), Some(a)) = (vision, audio) {
            let gap = (v.time.mono_ms - a.time.mono_ms).abs();
            if gap > config.max_gap_ms {
                debug!(gap_ms = gap, "dropping stale vision/audio pair");
                continue;
            }
        }

        let Some(fused) = fuse(vision, thermal, audio) else {
            continue;
        };
        jsonl::write_record(&mut out, &out_path, &fused)?;
        written += 1;
    }

    info!(records = written, path = %out_path.display(), "batch fusion complete");
    Ok(written)
}

/// Collect every parseable observation from the run's per-source logs.
fn load_observations(obs_dir: &Path) -> Vec<Observation> {
    let Ok(entries) = std::fs::read_dir(obs_dir) else {
        return Vec::new();
    };
    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some(FUSED_LOG) {
            continue;
        }
        records.extend(jsonl::read_records::<Observation>(&path));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use skytrack_types::{ObsStatus, TimeStamp};

    fn obs(source: SourceId, mono_ms: i64, bearing: f64, conf: f64) -> Observation {
        Observation {
            version: None,
            time: TimeStamp {
                mono_ms,
                epoch_ms: mono_ms,
            },
            source,
            bearing_deg: Some(bearing),
            roi: None,
            confidence: Some(conf),
            status: ObsStatus::Ok,
            extras: None,
        }
    }

    fn write_log(dir: &Path, name: &str, records: &[Observation]) {
        let path = dir.join(name);
        for record in records {
            jsonl::append_record(&path, record).unwrap();
        }
    }

    #[test]
    fn empty_directory_is_a_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = fuse_run(dir.path(), &BatchFusionConfig::default());
        assert!(matches!(result, Err(TrackError::MissingInput(_))));
    }

    #[test]
    fn interleaved_sources_fuse_in_time_order() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "vision.jsonl",
            &[
                obs(SourceId::Vision, 100, 40.0, 0.8),
                obs(SourceId::Vision, 300, 42.0, 0.8),
            ],
        );
        write_log(
            dir.path(),
            "audio.jsonl",
            &[obs(SourceId::Audio, 150, 50.0, 0.4)],
        );

        let written = fuse_run(dir.path(), &BatchFusionConfig::default()).unwrap();
        assert_eq!(written, 3);

        let fused: Vec<Observation> = jsonl::read_records(&dir.path().join(FUSED_LOG));
        assert_eq!(fused.len(), 3);
        // First step has only vision.
        assert_eq!(fused[0].status, ObsStatus::Degraded);
        assert_eq!(fused[0].bearing_deg, Some(40.0));
        // Second step merges both; reference example math.
        assert_eq!(fused[1].status, ObsStatus::Ok);
        assert_eq!(fused[1].bearing_deg, Some(43.33));
        // Third step reuses the retained audio reading (gap 150 ms ≤ 200 ms).
        assert_eq!(fused[2].status, ObsStatus::Ok);
    }

    #[test]
    fn stale_pairs_are_dropped_not_fused() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "vision.jsonl",
            &[obs(SourceId::Vision, 0, 40.0, 0.8)],
        );
        write_log(
            dir.path(),
            "audio.jsonl",
            &[obs(SourceId::Audio, 1000, 50.0, 0.4)],
        );

        let written = fuse_run(
            dir.path(),
            &BatchFusionConfig {
                max_gap_ms: 200,
            },
        )
        .unwrap();

        // Step 1: vision alone fuses.  Step 2: vision is 1000 ms older than
        // audio, so the pair is dropped.
        assert_eq!(written, 1);
        let fused: Vec<Observation> = jsonl::read_records(&dir.path().join(FUSED_LOG));
        assert_eq!(fused[0].status, ObsStatus::Degraded);
    }

    #[test]
    fn thermal_contributes_to_the_batch_pass() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "thermal.jsonl",
            &[obs(SourceId::Thermal, 100, 60.0, 0.5)],
        );
        write_log(
            dir.path(),
            "vision.jsonl",
            &[obs(SourceId::Vision, 120, 40.0, 0.5)],
        );

        let written = fuse_run(dir.path(), &BatchFusionConfig::default()).unwrap();
        assert_eq!(written, 2);
        let fused: Vec<Observation> = jsonl::read_records(&dir.path().join(FUSED_LOG));
        assert_eq!(fused[1].status, ObsStatus::Ok);
        assert_eq!(
            fused[1].extras.as_ref().unwrap().sources,
            vec![SourceId::Vision, SourceId::Thermal]
        );
    }

    #[test]
    fn rerun_rewrites_the_output() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "vision.jsonl",
            &[obs(SourceId::Vision, 100, 40.0, 0.8)],
        );

        fuse_run(dir.path(), &BatchFusionConfig::default()).unwrap();
        fuse_run(dir.path(), &BatchFusionConfig::default()).unwrap();

        // The previous fused.jsonl must not be re-read as input or appended to.
        let fused: Vec<Observation> = jsonl::read_records(&dir.path().join(FUSED_LOG));
        assert_eq!(fused.len(), 1);
    }

    #[test]
    fn corrupt_lines_do_not_halt_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vision.jsonl"),
            "garbage\n{\"time\":{\"mono_ms\":5},\"source\":\"vision\",\"bearing_deg\":12.0,\"status\":\"OK\"}\n",
        )
        .unwrap();

        let written = fuse_run(dir.path(), &BatchFusionConfig::default()).unwrap();
        assert_eq!(written, 1);
    }
}
