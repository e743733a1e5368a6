//! Sequence/clock source shared by every server session.
//!
//! Holds the cyclic response sequence number and a free-running 32-bit tick
//! counter. One instance is created at server start and handed to sessions
//! as an `Arc`; there is no global state.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use itp_core::wire::{SEQUENCE_MAX, SEQUENCE_MIN};

/// Shortest tick period; shorter requests (including zero) are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

pub struct SequenceClock {
    /// Last sequence number handed out. 0 until the first call.
    sequence: Mutex<u32>,
    ticks: Arc<AtomicU32>,
    period: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl SequenceClock {
    /// A clock whose first sequence number is 1. Ticking starts on `start()`.
    pub fn new(period: Duration) -> Self {
        if period < MIN_PERIOD {
            tracing::warn!(
                requested_ms = period.as_millis() as u64,
                "clock period below 1ms, using 1ms"
            );
        }
        let period = period.max(MIN_PERIOD);
        Self {
            sequence: Mutex::new(0),
            ticks: Arc::new(AtomicU32::new(0)),
            period,
            ticker: Mutex::new(None),
        }
    }

    /// A clock that behaves as if `seed` was the last number emitted.
    ///
    /// # Panics
    /// If `seed` is outside `1..=999`.
    pub fn with_seed(period: Duration, seed: u32) -> Self {
        assert!(
            (SEQUENCE_MIN..=SEQUENCE_MAX).contains(&seed),
            "sequence seed {seed} outside {SEQUENCE_MIN}..={SEQUENCE_MAX}"
        );
        let clock = Self::new(period);
        *clock.sequence.lock().unwrap_or_else(PoisonError::into_inner) = seed;
        clock
    }

    /// Advance and return the sequence number. Wraps 999 → 1, never yields 0.
    pub fn next_sequence(&self) -> u32 {
        let mut seq = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        *seq = if *seq >= SEQUENCE_MAX {
            SEQUENCE_MIN
        } else {
            *seq + 1
        };
        *seq
    }

    /// Current tick count, wrapping at 2^32.
    pub fn current_timestamp(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Start ticking. Must be called inside a tokio runtime. No-op if
    /// already running.
    pub fn start(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let ticks = self.ticks.clone();
        let period = self.period;
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                ticks.fetch_add(1, Ordering::Relaxed);
            }
        }));
        tracing::debug!(period_ms = period.as_millis() as u64, "clock started");
    }

    /// Stop ticking. The tick value is kept.
    pub fn stop(&self) {
        let handle = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!(ticks = self.current_timestamp(), "clock stopped");
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SequenceClock {
    fn drop(&mut self) {
        self.stop();
    }
}
