//! Confidence-weighted observation fusion.
//!
//! [`fuse`] merges up to three concurrent per-sensor observations into one
//! `source = fusion` record:
//!
//! - bearing = weighted arithmetic mean of the candidate bearings, where
//!   each weight is the clamped confidence ([`weight`]);
//! - confidence = the maximum candidate weight;
//! - status = `OK` with ≥ 2 contributors, `DEGRADED` with exactly 1, and no
//!   record at all with 0.
//!
//! The bearing mean is **linear, not circular**: two candidates straddling
//! the 0°/360° wrap average to the numerically wrong side.  This matches the
//! behavior every downstream consumer was tuned against and must not be
//! switched to vector averaging without re-validating those consumers.
//!
//! # Example
//!
//! ```
//! use skytrack_perception::fuse;
//! use skytrack_types::{ObsStatus, Observation, SourceId, TimeStamp};
//!
//! let vision = Observation {
//!     version: None,
//!     time: TimeStamp { mono_ms: 100, epoch_ms: 0 },
//!     source: SourceId::Vision,
//!     bearing_deg: Some(40.0),
//!     roi: None,
//!     confidence: Some(0.8),
//!     status: ObsStatus::Ok,
//!     extras: None,
//! };
//! let audio = Observation {
//!     source: SourceId::Audio,
//!     bearing_deg: Some(50.0),
//!     confidence: Some(0.4),
//!     ..vision.clone()
//! };
//!
//! let fused = fuse(Some(&vision), None, Some(&audio)).unwrap();
//! assert_eq!(fused.bearing_deg, Some(43.33));
//! assert_eq!(fused.status, ObsStatus::Ok);
//! ```

use skytrack_types::{ObsExtras, ObsStatus, Observation, RECORD_VERSION, SourceId};

/// Clamped fusion weight of a confidence value.
///
/// Absent confidence is treated as a neutral 0.5; present values are clamped
/// to `[0.05, 1.0]` so no single source can be zeroed out or dominate past
/// full trust.
pub fn weight(confidence: Option<f64>) -> f64 {
    confidence.unwrap_or(0.5).clamp(0.05, 1.0)
}

/// Merge up to three concurrent observations into one fused record.
///
/// Candidates are the inputs with a present bearing; with none, no record is
/// produced.  Time is copied from the first candidate in fixed priority
/// order vision > thermal > audio (not from whichever is freshest), and the
/// ROI from vision if present, else thermal — never from audio, whose pixel
/// frame is meaningless.
pub fn fuse(
    vision: Option<&Observation>,
    thermal: Option<&Observation>,
    audio: Option<&Observation>,
) -> Option<Observation> {
    // Priority order is fixed here; everything downstream leans on it.
    let candidates: Vec<(SourceId, &Observation)> = [
        (SourceId::Vision, vision),
        (SourceId::Thermal, thermal),
        (SourceId::Audio, audio),
    ]
    .into_iter()
    .filter_map(|(src, obs)| obs.filter(|o| o.bearing_deg.is_some()).map(|o| (src, o)))
    .collect();

    if candidates.is_empty() {
        return None;
    }

    let total_weight: f64 = candidates.iter().map(|(_, o)| weight(o.confidence)).sum();
    if total_weight <= 0.0 {
        return None;
    }

    let bearing: f64 = candidates
        .iter()
        .map(|(_, o)| o.bearing_deg.unwrap_or(0.0) * weight(o.confidence))
        .sum::<f64>()
        / total_weight;
    let max_weight = candidates
        .iter()
        .map(|(_, o)| weight(o.confidence))
        .fold(f64::MIN, f64::max);

    // Candidates are already in priority order, so the first one carries the
    // timestamp and the first vision/thermal ROI wins.
    let time = candidates[0].1.time;
    let roi = candidates
        .iter()
        .find(|(src, o)| *src != SourceId::Audio && o.roi.is_some())
        .and_then(|(_, o)| o.roi);

    let status = if candidates.len() >= 2 {
        ObsStatus::Ok
    } else {
        ObsStatus::Degraded
    };
    let sources = candidates.iter().map(|(src, _)| *src).collect();

    Some(Observation {
        version: Some(RECORD_VERSION.to_string()),
        time,
        source: SourceId::Fusion,
        bearing_deg: Some(round2(bearing)),
        roi,
        confidence: Some(round3(max_weight)),
        status,
        extras: Some(ObsExtras {
            sources,
            ..Default::default()
        }),
    })
}

/// Legacy two-source variant (vision + audio), identical math restricted to
/// two inputs.  Kept for consumers predating the thermal pipeline.
pub fn fuse_pair(vision: Option<&Observation>, audio: Option<&Observation>) -> Option<Observation> {
    fuse(vision, None, audio)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
