//! Tracker configuration
//!
//! Every field is optional; unset fields fall back to the variant's defaults.

use crate::error::TrackerError;
use crate::schedule::{TimerSchedule, TimerTick, Variant};
use crate::sink::QueuePolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tracker variant
    pub variant: Variant,
    /// Override for `eventCategory`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_category: Option<String>,
    /// Override for the queue policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_policy: Option<QueuePolicy>,
    /// Override for the timer schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<TimerTick>>,
}

impl TrackerConfig {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        serde_json::from_str(json)
            .map_err(|e| TrackerError::ParseError(format!("Failed to parse tracker config: {}", e)))
    }

    pub fn with_event_category(mut self, category: impl Into<String>) -> Self {
        self.event_category = Some(category.into());
        self
    }

    pub fn category(&self) -> &str {
        self.event_category
            .as_deref()
            .unwrap_or_else(|| self.variant.event_category())
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        self.queue_policy
            .unwrap_or_else(|| self.variant.queue_policy())
    }

    pub fn schedule(&self) -> Result<TimerSchedule, TrackerError> {
        match &self.schedule {
            Some(ticks) => TimerSchedule::try_from_ticks(ticks.clone()),
            None => Ok(self.variant.schedule()),
        }
    }
}
