//! Lightweight timing utilities for optional performance tracing.
//!
//! A [`TimingGuard`] records how long a scoped operation (quality analysis, a
//! detection run, a render pass, an export) took and logs it on drop. Guards only
//! log when telemetry has been switched on through [`configure`] and the level
//! passes both the telemetry threshold and the `log` filter for
//! `tryon::telemetry`.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicU8, Ordering},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, log, log_enabled};

const TARGET: &str = "tryon::telemetry";

/// Zero means telemetry is off; otherwise the position of the maximum
/// `LevelFilter` in `LevelFilter::iter()`.
static TELEMETRY_THRESHOLD: AtomicU8 = AtomicU8::new(0);

/// RAII helper that logs how long an operation took when dropped.
pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    started: Instant,
    armed: bool,
}

impl TimingGuard {
    /// Returns `true` when the guard will emit a log entry on drop.
    pub fn is_active(&self) -> bool {
        self.armed
    }

    /// Returns the elapsed duration since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Consume the guard and return the elapsed duration without logging.
    pub fn finish(mut self) -> Duration {
        self.armed = false;
        self.started.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.armed {
            log!(
                target: TARGET,
                self.level,
                "{} completed in {:.2?}",
                self.label,
                self.started.elapsed()
            );
        }
    }
}

/// Create a timing guard that logs at `level` when telemetry allows it.
pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    timing_guard_if(label, level, true)
}

/// Same as [`timing_guard`] but additionally gated by a caller-supplied flag.
pub fn timing_guard_if(
    label: impl Into<Cow<'static, str>>,
    level: Level,
    enabled: bool,
) -> TimingGuard {
    TimingGuard {
        label: label.into(),
        level,
        started: Instant::now(),
        armed: enabled && telemetry_allows(level) && log_enabled!(target: TARGET, level),
    }
}

/// Configure the global telemetry state.
pub fn configure(enabled: bool, level: LevelFilter) {
    let threshold = if enabled { level as u8 } else { 0 };
    TELEMETRY_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// Returns whether telemetry logging is currently enabled.
pub fn telemetry_enabled() -> bool {
    TELEMETRY_THRESHOLD.load(Ordering::Relaxed) > 0
}

/// Returns the maximum telemetry logging level (`Off` when disabled).
pub fn telemetry_level() -> LevelFilter {
    let threshold = usize::from(TELEMETRY_THRESHOLD.load(Ordering::Relaxed));
    LevelFilter::iter()
        .nth(threshold)
        .unwrap_or(LevelFilter::Off)
}

/// Returns `true` when telemetry is enabled and `level` is within the threshold.
pub fn telemetry_allows(level: Level) -> bool {
    level <= telemetry_level()
}
