//! Interaction counters and snapshot baseline
//!
//! The baseline is a full copy of the counters taken after every emission. The
//! next timer tick compares the live counters against it field by field; if
//! nothing moved the interval is classified as inactive.

use crate::types::{Classification, InteractionKind};
use serde::{Deserialize, Serialize};

/// Per-kind interaction counts since activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCounters {
    pub mouse_move_count: u64,
    pub touch_count: u64,
    pub key_count: u64,
    pub scroll_count: u64,
    pub click_count: u64,
}

impl InteractionCounters {
    /// Count one event of the given kind.
    ///
    /// Counters saturate at `u64::MAX` so they never decrease. A saturated
    /// counter stops registering change, which no page lifetime reaches.
    pub fn increment(&mut self, kind: InteractionKind) {
        let counter = match kind {
            InteractionKind::MouseMove => &mut self.mouse_move_count,
            InteractionKind::TouchStart => &mut self.touch_count,
            InteractionKind::Scroll => &mut self.scroll_count,
            InteractionKind::KeyDown => &mut self.key_count,
            InteractionKind::Click => &mut self.click_count,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn get(&self, kind: InteractionKind) -> u64 {
        match kind {
            InteractionKind::MouseMove => self.mouse_move_count,
            InteractionKind::TouchStart => self.touch_count,
            InteractionKind::Scroll => self.scroll_count,
            InteractionKind::KeyDown => self.key_count,
            InteractionKind::Click => self.click_count,
        }
    }

    /// Sum of all five counters
    pub fn total(&self) -> u64 {
        InteractionKind::ALL
            .iter()
            .map(|k| self.get(*k))
            .fold(0, u64::saturating_add)
    }
}

/// Counter values recorded at the most recent emission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBaseline {
    record: InteractionCounters,
}

impl SnapshotBaseline {
    /// Create an all-zero baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded counters
    pub fn record(&self) -> &InteractionCounters {
        &self.record
    }

    /// True when none of the five counters changed since the snapshot
    pub fn is_unchanged(&self, current: &InteractionCounters) -> bool {
        current.scroll_count == self.record.scroll_count
            && current.key_count == self.record.key_count
            && current.click_count == self.record.click_count
            && current.mouse_move_count == self.record.mouse_move_count
            && current.touch_count == self.record.touch_count
    }

    /// Classify the interval between the snapshot and `current`
    pub fn classify(&self, current: &InteractionCounters) -> Classification {
        if self.is_unchanged(current) {
            Classification::Inactive
        } else {
            Classification::Active
        }
    }

    /// Overwrite the snapshot with a full copy of `current`
    pub fn replace(&mut self, current: &InteractionCounters) {
        self.record = *current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_matches_kind() {
        let mut counters = InteractionCounters::default();
        counters.increment(InteractionKind::Scroll);
        counters.increment(InteractionKind::Scroll);
        counters.increment(InteractionKind::TouchStart);

        assert_eq!(counters.scroll_count, 2);
        assert_eq!(counters.touch_count, 1);
        assert_eq!(counters.mouse_move_count, 0);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn test_increment_saturates_at_max() {
        let mut counters = InteractionCounters {
            click_count: u64::MAX - 1,
            ..InteractionCounters::default()
        };
        counters.increment(InteractionKind::Click);
        counters.increment(InteractionKind::Click);
        assert_eq!(counters.click_count, u64::MAX);
    }

    #[test]
    fn test_zero_baseline_classifies_untouched_counters_inactive() {
        let baseline = SnapshotBaseline::new();
        let counters = InteractionCounters::default();
        assert_eq!(baseline.classify(&counters), Classification::Inactive);
    }

    #[test]
    fn test_any_changed_counter_is_active() {
        for kind in InteractionKind::ALL {
            let baseline = SnapshotBaseline::new();
            let mut counters = InteractionCounters::default();
            counters.increment(kind);
            assert_eq!(
                baseline.classify(&counters),
                Classification::Active,
                "{:?} change should be active",
                kind
            );
        }
    }

    #[test]
    fn test_replace_takes_full_snapshot() {
        let mut baseline = SnapshotBaseline::new();
        let mut counters = InteractionCounters::default();
        counters.increment(InteractionKind::Click);
        counters.increment(InteractionKind::KeyDown);

        baseline.replace(&counters);
        assert_eq!(baseline.record(), &counters);
        assert!(baseline.is_unchanged(&counters));

        counters.increment(InteractionKind::MouseMove);
        assert!(!baseline.is_unchanged(&counters));
    }
}
