//! Timer schedule
//!
//! A declarative, ordered list of one-shot ticks measured from page ready. Each
//! tick emits a snapshot comparison labelled with the elapsed time. Ticks are
//! never cancelled or rescheduled.

use crate::error::TrackerError;
use crate::sink::QueuePolicy;
use serde::{Deserialize, Serialize};

/// Tick delays (ms) of the classic tracker
pub const CLASSIC_DELAYS_MS: [u64; 4] = [5_000, 19_000, 39_000, 67_000];

/// Tick delays (ms) of the extended tracker
pub const EXTENDED_DELAYS_MS: [u64; 7] = [
    5_000, 19_000, 39_000, 67_000, 103_000, 143_000, 233_000,
];

/// Event category of the classic tracker
pub const CLASSIC_EVENT_CATEGORY: &str = "Firebrand User Events";

/// Event category of the extended tracker
pub const EXTENDED_EVENT_CATEGORY: &str = "Firebrand User Events Extended";

/// Tracker variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Four ticks up to 67 seconds; expects the host queue to exist
    #[default]
    Classic,
    /// Seven ticks up to 233 seconds; creates the queue if missing
    Extended,
}

impl Variant {
    pub fn delays_ms(&self) -> &'static [u64] {
        match self {
            Variant::Classic => &CLASSIC_DELAYS_MS,
            Variant::Extended => &EXTENDED_DELAYS_MS,
        }
    }

    pub fn event_category(&self) -> &'static str {
        match self {
            Variant::Classic => CLASSIC_EVENT_CATEGORY,
            Variant::Extended => EXTENDED_EVENT_CATEGORY,
        }
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        match self {
            Variant::Classic => QueuePolicy::RequireExisting,
            Variant::Extended => QueuePolicy::CreateIfMissing,
        }
    }

    pub fn schedule(&self) -> TimerSchedule {
        TimerSchedule::from_delays(self.delays_ms())
    }
}

/// One scheduled emission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerTick {
    /// Delay from page ready
    pub delay_ms: u64,
    /// `eventAction` of the emission
    pub label: String,
}

impl TimerTick {
    /// Tick labelled with whole elapsed seconds, e.g. `"19 seconds"`
    pub fn after_ms(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            label: format!("{} seconds", delay_ms / 1000),
        }
    }
}

/// Ordered ticks driving a single scheduling loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSchedule {
    ticks: Vec<TimerTick>,
}

impl TimerSchedule {
    pub fn from_delays(delays_ms: &[u64]) -> Self {
        Self::from_ticks(delays_ms.iter().copied().map(TimerTick::after_ms).collect())
    }

    /// Build from explicit ticks; order is by delay, stable for equal delays
    pub fn from_ticks(mut ticks: Vec<TimerTick>) -> Self {
        ticks.sort_by_key(|t| t.delay_ms);
        Self { ticks }
    }

    /// Build from explicit ticks, rejecting empty labels
    pub fn try_from_ticks(ticks: Vec<TimerTick>) -> Result<Self, TrackerError> {
        if let Some(tick) = ticks.iter().find(|t| t.label.trim().is_empty()) {
            return Err(TrackerError::InvalidSchedule(format!(
                "tick at {}ms has an empty label",
                tick.delay_ms
            )));
        }
        Ok(Self::from_ticks(ticks))
    }

    pub fn ticks(&self) -> &[TimerTick] {
        &self.ticks
    }

    pub fn get(&self, index: usize) -> Option<&TimerTick> {
        self.ticks.get(index)
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}
