//! Progress accounting for parallel downloads.
//!
//! Chunk workers add to shared atomic counters after every read. The
//! dual-stream coordinator folds the per-stream counters into one fraction,
//! rate-limits it, and hands it to the caller through a single serialized
//! emitter so concurrent workers never invoke the callback at the same time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Byte-level progress callback for one stream.
///
/// # Arguments
///
/// * `downloaded` - Bytes written so far for the stream
/// * `total` - Total expected bytes, when known
pub type ByteProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Fraction callback used by the dual-stream coordinator.
pub type FractionCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Portion of the overall pipeline progress owned by downloading.
///
/// Muxing occupies the remaining `0.85..=1.0`.
pub const DOWNLOAD_PROGRESS_SHARE: f64 = 0.85;

/// Shared downloaded/total counters for a single stream.
///
/// `total` is 0 while unknown.
#[derive(Debug, Default)]
pub struct StreamProgress {
    downloaded: AtomicU64,
    total: AtomicU64,
}

impl StreamProgress {
    /// Create counters seeded with a metadata-reported size.
    pub fn new(expected_total: Option<u64>) -> Self {
        Self {
            downloaded: AtomicU64::new(0),
            total: AtomicU64::new(expected_total.unwrap_or(0)),
        }
    }

    /// Record a cumulative byte count and, when known, the total.
    ///
    /// The downloaded counter never moves backwards even if reports arrive
    /// out of order.
    pub fn record(&self, downloaded: u64, total: Option<u64>) {
        self.downloaded.fetch_max(downloaded, Ordering::SeqCst);
        if let Some(total) = total.filter(|t| *t > 0) {
            self.total.store(total, Ordering::SeqCst);
        }
    }

    /// Bytes downloaded so far.
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Total size, 0 if unknown.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Point-in-time copy of both counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            downloaded: self.downloaded(),
            total: Some(self.total()).filter(|t| *t > 0),
        }
    }
}

/// Copy of a stream's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub downloaded: u64,
    pub total: Option<u64>,
}

/// Lock-free minimum-interval gate.
///
/// Only one caller per interval gets `true`; everybody else skips.
#[derive(Debug)]
pub struct RateLimiter {
    origin: Instant,
    interval_ms: u64,
    /// Milliseconds since `origin` of the last granted call, plus one
    /// (0 = never granted).
    last_ms: AtomicU64,
}

impl RateLimiter {
    /// Create a gate with the given minimum interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            interval_ms: interval.as_millis() as u64,
            last_ms: AtomicU64::new(0),
        }
    }

    /// Try to claim the current slot.
    pub fn try_acquire(&self) -> bool {
        let now = self.origin.elapsed().as_millis() as u64 + 1;
        let last = self.last_ms.load(Ordering::SeqCst);
        if last != 0 && now.saturating_sub(last) < self.interval_ms {
            return false;
        }
        self.last_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Combined video + audio progress.
///
/// `fraction = (video_downloaded + audio_downloaded) / (video_total + audio_total)`,
/// clamped to `[0, 1]`, scaled by `share`, never decreasing between emits.
pub struct CombinedProgress {
    video: Arc<StreamProgress>,
    audio: Arc<StreamProgress>,
    share: f64,
    limiter: RateLimiter,
    /// Last emitted (scaled) fraction; the lock also serializes the callback.
    last_emitted: Mutex<f64>,
    callback: FractionCallback,
}

impl CombinedProgress {
    /// Create a combined reporter.
    ///
    /// # Arguments
    ///
    /// * `video` / `audio` - Per-stream counters
    /// * `share` - Scale applied to the `[0, 1]` download fraction
    /// * `interval` - Minimum interval between callbacks
    /// * `callback` - Receives the scaled fraction
    pub fn new(
        video: Arc<StreamProgress>,
        audio: Arc<StreamProgress>,
        share: f64,
        interval: Duration,
        callback: FractionCallback,
    ) -> Self {
        Self {
            video,
            audio,
            share: share.clamp(0.0, 1.0),
            limiter: RateLimiter::new(interval),
            last_emitted: Mutex::new(0.0),
            callback,
        }
    }

    /// Unscaled download fraction, `None` while both totals are unknown.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.video.total() + self.audio.total();
        if total == 0 {
            return None;
        }
        let downloaded = self.video.downloaded() + self.audio.downloaded();
        Some((downloaded as f64 / total as f64).clamp(0.0, 1.0))
    }

    /// Emit progress if the rate limit allows it.
    pub fn report(&self) {
        if self.limiter.try_acquire() {
            self.emit();
        }
    }

    /// Emit progress regardless of the rate limit.
    pub fn report_final(&self) {
        self.emit();
    }

    fn emit(&self) {
        let Some(fraction) = self.fraction() else {
            return;
        };
        let mut last = self.last_emitted.lock();
        let scaled = (fraction * self.share).max(*last);
        *last = scaled;
        (self.callback)(scaled);
    }
}
