//! Progress tracking for archive write operations.
//!
//! One reporter exists per request. Bytes are accumulated through an atomic
//! counter threaded by reference down the write path, and emissions to the
//! caller are throttled to one per interval so slow consumers are never
//! flooded by per-chunk updates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Minimum delay between progress emissions unless a caller overrides it.
pub const DEFAULT_EMIT_INTERVAL: Duration = Duration::from_millis(250);

/// A point-in-time snapshot delivered to the progress callback.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub bytes_written: u64,
    pub total_bytes: u64,
}

/// Progress callback function type.
pub type ProgressCallback = dyn Fn(Progress) + Send + Sync;

/// Per-request progress configuration handed to the archive writers.
#[derive(Clone)]
pub struct ProgressOptions {
    pub interval: Duration,
    pub callback: Option<Arc<ProgressCallback>>,
}

impl ProgressOptions {
    /// No callback; all reporting becomes a no-op.
    pub fn disabled() -> Self {
        Self {
            interval: DEFAULT_EMIT_INTERVAL,
            callback: None,
        }
    }

    /// Builds the reporter once the writer knows the total byte count.
    pub fn reporter(&self, total_bytes: u64) -> ProgressReporter {
        ProgressReporter {
            total_bytes,
            bytes_written: AtomicU64::new(0),
            last_emit: Mutex::new(Instant::now()),
            emit_interval: self.interval,
            callback: self.callback.clone(),
        }
    }
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Tracks bytes written during one archive request.
pub struct ProgressReporter {
    total_bytes: u64,
    bytes_written: AtomicU64,
    last_emit: Mutex<Instant>,
    emit_interval: Duration,
    callback: Option<Arc<ProgressCallback>>,
}

impl ProgressReporter {
    /// Records `n` bytes copied and emits if the interval has elapsed.
    pub fn record_bytes(&self, n: u64) {
        self.bytes_written.fetch_add(n, Ordering::Relaxed);
        self.maybe_emit();
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Forces a final emission so callers always observe the end state,
    /// even when the last chunk landed inside the throttle window.
    pub fn finish(&self) {
        if let Some(ref callback) = self.callback {
            callback(self.snapshot());
        }
    }

    fn snapshot(&self) -> Progress {
        Progress {
            bytes_written: self.bytes_written(),
            total_bytes: self.total_bytes,
        }
    }

    fn maybe_emit(&self) {
        let Some(ref callback) = self.callback else {
            return;
        };

        let now = Instant::now();
        let should_emit = {
            let mut last_emit = self.last_emit.lock().unwrap();
            if now.duration_since(*last_emit) >= self.emit_interval {
                *last_emit = now;
                true
            } else {
                false
            }
        };

        if should_emit {
            callback(self.snapshot());
        }
    }
}
