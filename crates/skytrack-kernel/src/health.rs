//! [`SensorHealth`] – per-sensor liveness tracker.
//!
//! The state controller stamps this monitor whenever an observation names
//! vision or audio as a contributor; [`SensorHealth::status`] then compares
//! each sensor's elapsed silence against one shared timeout window.  No
//! history beyond the last timestamp is kept — a sensor that flapped and
//! recovered an instant ago is indistinguishable from one that never dropped.
//!
//! Thermal contributes to fusion but is deliberately not tracked here: it is
//! treated as a non-critical bonus sensor whose loss never degrades the
//! controller.

use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Combined liveness of the two health-tracked sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    AllOk,
    VisionFail,
    AudioFail,
    BothFail,
}

// ────────────────────────────────────────────────────────────────────────────
// SensorHealth
// ────────────────────────────────────────────────────────────────────────────

/// Tracks the last-seen instant of the vision and audio pipelines.
///
/// A sensor that has never reported counts as failed, so a cold start reads
/// [`HealthStatus::BothFail`] until real data arrives.  Pure function of the
/// clock; no other side effects.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use skytrack_kernel::{HealthStatus, SensorHealth};
///
/// let mut health = SensorHealth::new(Duration::from_secs(5));
/// assert_eq!(health.status(), HealthStatus::BothFail);
///
/// health.update_vision();
/// assert_eq!(health.status(), HealthStatus::AudioFail);
///
/// health.update_audio();
/// assert_eq!(health.status(), HealthStatus::AllOk);
/// ```
#[derive(Debug)]
pub struct SensorHealth {
    timeout: Duration,
    last_vision: Option<Instant>,
    last_audio: Option<Instant>,
}

impl SensorHealth {
    /// Create a monitor with one shared `timeout` for both sensors.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_vision: None,
            last_audio: None,
        }
    }

    /// Record that vision reported just now.
    pub fn update_vision(&mut self) {
        self.last_vision = Some(Instant::now());
    }

    /// Record that audio reported just now.
    pub fn update_audio(&mut self) {
        self.last_audio = Some(Instant::now());
    }

    /// `true` when vision has reported within the timeout window.
    pub fn vision_ok(&self) -> bool {
        Self::alive(self.last_vision, self.timeout)
    }

    /// `true` when audio has reported within the timeout window.
    pub fn audio_ok(&self) -> bool {
        Self::alive(self.last_audio, self.timeout)
    }

    /// Combined status derived from both timestamps and the clock.
    pub fn status(&self) -> HealthStatus {
        match (self.vision_ok(), self.audio_ok()) {
            (true, true) => HealthStatus::AllOk,
            (false, true) => HealthStatus::VisionFail,
            (true, false) => HealthStatus::AudioFail,
            (false, false) => HealthStatus::BothFail,
        }
    }

    fn alive(last: Option<Instant>, timeout: Duration) -> bool {
        match last {
            Some(instant) => instant.elapsed() < timeout,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn cold_start_reads_both_fail() {
        let health = SensorHealth::new(Duration::from_secs(1));
        assert_eq!(health.status(), HealthStatus::BothFail);
        assert!(!health.vision_ok());
        assert!(!health.audio_ok());
    }

    #[test]
    fn vision_update_leaves_audio_failed() {
        let mut health = SensorHealth::new(Duration::from_secs(5));
        health.update_vision();
        assert!(health.vision_ok());
        assert!(!health.audio_ok());
        assert_eq!(health.status(), HealthStatus::AudioFail);
    }

    #[test]
    fn audio_update_leaves_vision_failed() {
        let mut health = SensorHealth::new(Duration::from_secs(5));
        health.update_audio();
        assert_eq!(health.status(), HealthStatus::VisionFail);
    }

    #[test]
    fn both_updates_read_all_ok() {
        let mut health = SensorHealth::new(Duration::from_secs(5));
        health.update_vision();
        health.update_audio();
        assert_eq!(health.status(), HealthStatus::AllOk);
    }

    #[test]
    fn sensors_time_out_when_silent() {
        let mut health = SensorHealth::new(Duration::from_millis(20));
        health.update_vision();
        health.update_audio();
        assert_eq!(health.status(), HealthStatus::AllOk);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(health.status(), HealthStatus::BothFail);
    }

    #[test]
    fn update_resets_the_window() {
        let mut health = SensorHealth::new(Duration::from_millis(30));
        health.update_vision();
        thread::sleep(Duration::from_millis(20));
        health.update_vision();
        thread::sleep(Duration::from_millis(20));
        // Still alive thanks to the second update.
        assert!(health.vision_ok());
    }
}
