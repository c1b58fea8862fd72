//! Injected observability hook for per-channel frame accounting.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::layout::MAX_CAMERAS;
use crate::traits::CameraError;

/// Receives frame-level events from capture channels and consumers.
///
/// Called from driver capture threads, so implementations must be cheap
/// and must not block.
pub trait FrameObserver: Send + Sync {
    /// A frame from channel `index` was written into the composite.
    fn frame_converted(&self, index: usize, sequence: u64) {
        let _ = (index, sequence);
    }

    /// A frame from channel `index` was discarded.
    fn frame_dropped(&self, index: usize, reason: &CameraError) {
        let _ = (index, reason);
    }

    /// Channel `index` was requested but left inactive.
    fn channel_degraded(&self, index: usize, reason: &CameraError) {
        let _ = (index, reason);
    }

    /// A consumer acquired the composite.
    fn frame_read(&self) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl FrameObserver for NoopObserver {}

/// Atomic per-channel counters.
#[derive(Debug, Default)]
pub struct FrameCounters {
    converted: [AtomicU64; MAX_CAMERAS],
    dropped: [AtomicU64; MAX_CAMERAS],
    degraded: [AtomicU64; MAX_CAMERAS],
    reads: AtomicU64,
}

impl FrameCounters {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written for channel `index`.
    pub fn converted(&self, index: usize) -> u64 {
        load(&self.converted, index)
    }

    /// Frames dropped for channel `index`.
    pub fn dropped(&self, index: usize) -> u64 {
        load(&self.dropped, index)
    }

    /// Times channel `index` failed to come up.
    pub fn degraded(&self, index: usize) -> u64 {
        load(&self.degraded, index)
    }

    /// Composite acquisitions.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

fn load(counters: &[AtomicU64; MAX_CAMERAS], index: usize) -> u64 {
    counters
        .get(index)
        .map_or(0, |counter| counter.load(Ordering::Relaxed))
}

fn bump(counters: &[AtomicU64; MAX_CAMERAS], index: usize) {
    if let Some(counter) = counters.get(index) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl FrameObserver for FrameCounters {
    fn frame_converted(&self, index: usize, _sequence: u64) {
        bump(&self.converted, index);
    }

    fn frame_dropped(&self, index: usize, _reason: &CameraError) {
        bump(&self.dropped, index);
    }

    fn channel_degraded(&self, index: usize, _reason: &CameraError) {
        bump(&self.degraded, index);
    }

    fn frame_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }
}
