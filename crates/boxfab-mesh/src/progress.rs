//! Progress reporting for batch work such as optimizing a box list.
//!
//! Callbacks only observe. A batch always runs to completion; a caller
//! that no longer wants the result drops it afterwards.
//!
//! ```ignore
//! let engine = EngineBuilder::new()
//!     .on_progress(|p| eprintln!("{} {}/{}", p.stage, p.done, p.total))
//!     .build()?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::trace;

/// Snapshot handed to a progress callback.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Items finished so far.
    pub done: u64,
    pub total: u64,
    /// Name of the batch, e.g. `"optimize_boxes"`.
    pub stage: &'static str,
    pub elapsed: Duration,
}

impl Progress {
    /// Completion in `[0, 1]`. An empty batch reports 0.
    pub fn fraction(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total => (self.done as f64 / total as f64).min(1.0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

/// Callback receiving progress snapshots, possibly from rayon workers.
pub type ProgressCallback = Box<dyn Fn(&Progress) + Send + Sync>;

/// Counter shared by the workers of one batch.
///
/// The callback fires at most once per `interval`. The item that completes
/// the batch is always reported.
#[derive(Debug)]
pub struct ProgressTracker {
    stage: &'static str,
    total: u64,
    done: AtomicU64,
    started: Instant,
    /// Microseconds after `started` of the last report.
    reported_at_us: AtomicU64,
    interval_us: u64,
}

impl ProgressTracker {
    pub fn new(stage: &'static str, total: u64) -> Self {
        Self::with_interval(stage, total, Duration::from_millis(100))
    }

    pub fn with_interval(stage: &'static str, total: u64, interval: Duration) -> Self {
        Self {
            stage,
            total,
            done: AtomicU64::new(0),
            started: Instant::now(),
            reported_at_us: AtomicU64::new(0),
            interval_us: interval.as_micros() as u64,
        }
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Record one finished item.
    pub fn finish_one(&self, callback: Option<&ProgressCallback>) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(target: "boxfab::progress", stage = self.stage, done, total = self.total);
        let Some(callback) = callback else {
            return;
        };

        let now_us = self.started.elapsed().as_micros() as u64;
        if done < self.total {
            let last = self.reported_at_us.load(Ordering::Relaxed);
            if now_us.saturating_sub(last) < self.interval_us {
                return;
            }
            // Concurrent finishers race for the slot; one reports.
            if self
                .reported_at_us
                .compare_exchange(last, now_us, Ordering::Relaxed, Ordering::Relaxed)
                .is_err()
            {
                return;
            }
        }

        callback(&Progress {
            done,
            total: self.total,
            stage: self.stage,
            elapsed: self.started.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fraction() {
        let p = Progress {
            done: 1,
            total: 4,
            stage: "optimize_boxes",
            elapsed: Duration::ZERO,
        };
        assert!((p.fraction() - 0.25).abs() < 1e-12);
        assert!(!p.is_complete());

        let empty = Progress { total: 0, done: 0, ..p };
        assert_eq!(empty.fraction(), 0.0);
        assert!(empty.is_complete());
    }

    #[test]
    fn test_last_item_always_reported() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let callback: ProgressCallback = Box::new(move |p| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert!(p.done <= p.total);
        });

        let tracker = ProgressTracker::with_interval("boxes", 3, Duration::from_secs(3600));
        for _ in 0..3 {
            tracker.finish_one(Some(&callback));
        }
        assert_eq!(tracker.done(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_counts_without_callback() {
        let tracker = ProgressTracker::new("boxes", 10);
        tracker.finish_one(None);
        tracker.finish_one(None);
        assert_eq!(tracker.done(), 2);
    }
}
