//! Frame-rate estimation and session counters.

use crate::types::StatsSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Exponentially smoothed frames-per-second tracker.
///
/// Owned exclusively by the video consumer loop; one update per frame
/// delivered to the transport. Monitoring only, no feedback into pacing.
#[derive(Debug, Default)]
pub struct FpsEstimator {
    last_frame: Option<Instant>,
    smoothed: f64,
}

impl FpsEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivered frame at `now` and return the smoothed rate.
    ///
    /// The first frame only records its arrival time: there is no prior frame
    /// to measure against, so the smoothed value stays at 0.0 until the
    /// second frame.
    pub fn update(&mut self, now: Instant) -> f64 {
        if let Some(last) = self.last_frame.replace(now) {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            if elapsed > 0.0 {
                let instantaneous = 1.0 / elapsed;
                self.smoothed = 0.9 * self.smoothed + 0.1 * instantaneous;
            }
        }
        self.smoothed
    }

    pub fn smoothed(&self) -> f64 {
        self.smoothed
    }
}

/// Lock-free counters published by the pipeline loops.
#[derive(Debug, Default)]
pub struct SessionStats {
    frames_sent: AtomicU64,
    samples_sent: AtomicU64,
    smoothed_fps: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_video_frame(&self, smoothed_fps: f64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.smoothed_fps
            .store(smoothed_fps.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn record_audio_frame(&self) {
        self.samples_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_fps(&self) -> f64 {
        f64::from_bits(self.smoothed_fps.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            smoothed_fps: self.current_fps(),
        }
    }
}
