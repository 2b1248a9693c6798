//! Clock and pacing utilities for the export loop.
//!
//! The recording loop never sleeps directly. It asks a [`Pacer`] to wait,
//! which lets production code use real wall-clock delays while tests use a
//! [`LogicalPacer`] that only records the requested durations.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Something that can suspend the current task for a duration.
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    /// Wait for `duration` before returning.
    async fn pause(&self, duration: Duration);
}

/// Pacer backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealtimePacer;

#[async_trait::async_trait]
impl Pacer for RealtimePacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Pacer that advances a logical clock without waiting.
///
/// Clones share the same log, so a test can hand one clone to the code under
/// test and inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct LogicalPacer {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl LogicalPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause requested so far, in order.
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Total logical time elapsed.
    pub fn elapsed(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

#[async_trait::async_trait]
impl Pacer for LogicalPacer {
    async fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

/// A fixed output frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    fps: u32,
}

impl FrameRate {
    /// Create a frame rate; zero is clamped to one frame per second.
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Interval between consecutive frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.fps as u64)
    }

    /// Number of frames that hold a still for `secs` seconds.
    pub fn frames_for_secs(&self, secs: u32) -> u64 {
        secs as u64 * self.fps as u64
    }
}

/// Wall-clock anchor for one export run.
#[derive(Debug, Clone)]
pub struct ExportClock {
    /// The instant the run started.
    epoch: Instant,

    /// Unix time at epoch in milliseconds.
    epoch_unix_ms: i64,
}

impl ExportClock {
    /// Create a clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_unix_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Seconds elapsed since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Unix timestamp (ms) at the start of the run, used in output names.
    pub fn unix_ms(&self) -> i64 {
        self.epoch_unix_ms
    }
}

/// Estimated seconds remaining given progress in `[0, 1]`.
pub fn eta_secs(elapsed_secs: f64, progress: f64) -> f64 {
    if progress > 0.0 {
        ((elapsed_secs / progress) - elapsed_secs).max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_interval() {
        let rate = FrameRate::new(10);
        assert_eq!(rate.frame_interval(), Duration::from_millis(100));
        assert_eq!(rate.frames_for_secs(3), 30);
    }

    #[test]
    fn test_frame_rate_clamps_zero() {
        let rate = FrameRate::new(0);
        assert_eq!(rate.fps(), 1);
        assert_eq!(rate.frame_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_export_clock_is_recent() {
        let clock = ExportClock::start();
        assert!(clock.elapsed_secs() < 1.0);
        assert!(clock.unix_ms() > 1_600_000_000_000);
    }

    #[test]
    fn test_eta() {
        assert!((eta_secs(10.0, 0.5) - 10.0).abs() < 1e-9);
        assert_eq!(eta_secs(10.0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn test_logical_pacer_records_without_waiting() {
        let pacer = LogicalPacer::new();
        let observer = pacer.clone();
        let started = Instant::now();

        pacer.pause(Duration::from_secs(3)).await;
        pacer.pause(Duration::from_secs(6)).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            observer.pauses(),
            vec![Duration::from_secs(3), Duration::from_secs(6)]
        );
        assert_eq!(observer.elapsed(), Duration::from_secs(9));
    }
}
