use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quanta::{Clock, Instant as QuantaInstant};

/// Point-in-time copy of [`StreamStats`], taken off the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub callbacks: u64,
    pub frames: u64,
    /// Duplex only: output periods that found fewer input samples than needed.
    pub input_underruns: u64,
    /// Duplex only: input periods dropped because the bridge queue was full.
    pub input_overruns: u64,
    pub last_callback: Duration,
    pub worst_callback: Duration,
    /// Deadline of one period, `buffer_size / sample_rate`.
    pub period: Duration,
}

impl StatsSnapshot {
    /// Worst callback time as a percentage of the period budget.
    pub fn peak_load_percent(&self) -> f64 {
        if self.period.is_zero() {
            return 0.0;
        }
        self.worst_callback.as_secs_f64() / self.period.as_secs_f64() * 100.0
    }
}

/// Counters fed by the realtime adapter.
///
/// Everything the audio thread touches is a relaxed atomic; `snapshot` and
/// `reset` belong to the control side.
pub struct StreamStats {
    clock: Clock,
    period: Duration,
    callbacks: AtomicU64,
    frames: AtomicU64,
    input_underruns: AtomicU64,
    input_overruns: AtomicU64,
    last_callback_nanos: AtomicU64,
    worst_callback_nanos: AtomicU64,
}

impl StreamStats {
    pub fn new(period: Duration) -> Self {
        Self {
            clock: Clock::new(),
            period,
            callbacks: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            input_underruns: AtomicU64::new(0),
            input_overruns: AtomicU64::new(0),
            last_callback_nanos: AtomicU64::new(0),
            worst_callback_nanos: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn add_frames(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_input_underrun(&self) {
        self.input_underruns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_input_overrun(&self) {
        self.input_overruns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_callback_nanos(&self, nanos: u64) {
        self.last_callback_nanos.store(nanos, Ordering::Relaxed);
        self.worst_callback_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    /// Count a callback and time it until the guard drops.
    #[inline(always)]
    pub fn time_callback(&self) -> CallbackTimer<'_> {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        CallbackTimer {
            stats: self,
            start: self.clock.now(),
        }
    }

    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            input_underruns: self.input_underruns.load(Ordering::Relaxed),
            input_overruns: self.input_overruns.load(Ordering::Relaxed),
            last_callback: Duration::from_nanos(self.last_callback_nanos.load(Ordering::Relaxed)),
            worst_callback: Duration::from_nanos(self.worst_callback_nanos.load(Ordering::Relaxed)),
            period: self.period,
        }
    }

    pub fn reset(&self) {
        self.callbacks.store(0, Ordering::Relaxed);
        self.frames.store(0, Ordering::Relaxed);
        self.input_underruns.store(0, Ordering::Relaxed);
        self.input_overruns.store(0, Ordering::Relaxed);
        self.last_callback_nanos.store(0, Ordering::Relaxed);
        self.worst_callback_nanos.store(0, Ordering::Relaxed);
    }
}

/// Records the callback duration on drop. Atomics only.
pub struct CallbackTimer<'a> {
    stats: &'a StreamStats,
    start: QuantaInstant,
}

impl Drop for CallbackTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.stats.clock.now().saturating_duration_since(self.start);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.stats.record_callback_nanos(nanos);
    }
}
