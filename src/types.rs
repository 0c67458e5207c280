//! Core types for interaction tracking
//!
//! Input events consumed from the host page and the payload pushed into the
//! analytics event queue.

use crate::error::TrackerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key code reported by the host for the Enter/Return key
pub const ENTER_KEY_CODE: u32 = 13;

/// Key name reported by hosts that use `KeyboardEvent.key`
pub const ENTER_KEY_NAME: &str = "Enter";

/// Fixed `event` field of every queue payload
pub const GA_EVENT_NAME: &str = "GAEvent";

/// Action label used for the unconditional Enter-key emission
pub const RETURN_ACTION: &str = "Return";

/// The five DOM event types the tracker counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    #[serde(rename = "mousemove")]
    MouseMove,
    #[serde(rename = "touchstart")]
    TouchStart,
    #[serde(rename = "scroll")]
    Scroll,
    #[serde(rename = "keydown")]
    KeyDown,
    #[serde(rename = "click")]
    Click,
}

impl InteractionKind {
    /// All tracked kinds in counter order
    pub const ALL: [InteractionKind; 5] = [
        InteractionKind::MouseMove,
        InteractionKind::TouchStart,
        InteractionKind::Scroll,
        InteractionKind::KeyDown,
        InteractionKind::Click,
    ];

    /// The `eventAction` label used when this kind is the first interaction
    pub fn action_label(&self) -> &'static str {
        match self {
            InteractionKind::MouseMove => "MouseMove",
            InteractionKind::TouchStart => "Touch",
            InteractionKind::Scroll => "Scroll",
            InteractionKind::KeyDown => "KeyDown",
            InteractionKind::Click => "Click",
        }
    }

    /// DOM event name as registered with the host
    pub fn dom_event(&self) -> &'static str {
        match self {
            InteractionKind::MouseMove => "mousemove",
            InteractionKind::TouchStart => "touchstart",
            InteractionKind::Scroll => "scroll",
            InteractionKind::KeyDown => "keydown",
            InteractionKind::Click => "click",
        }
    }
}

/// A single interaction event delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// DOM event type
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    /// Milliseconds since page ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_ms: Option<u64>,
    /// Absolute event time, resolved against the session's page-ready time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Legacy `keyCode` (keydown only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_code: Option<u32>,
    /// `KeyboardEvent.key` (keydown only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl InteractionEvent {
    /// Create an event of the given kind at an offset from page ready
    pub fn new(kind: InteractionKind, at_ms: u64) -> Self {
        Self {
            kind,
            at_ms: Some(at_ms),
            timestamp: None,
            key_code: None,
            key: None,
        }
    }

    /// Create a keydown event carrying a key code
    pub fn key_down(at_ms: u64, key_code: u32) -> Self {
        Self {
            key_code: Some(key_code),
            ..Self::new(InteractionKind::KeyDown, at_ms)
        }
    }

    /// Whether this is a keydown of the Enter key
    pub fn is_enter(&self) -> bool {
        self.kind == InteractionKind::KeyDown
            && (self.key_code == Some(ENTER_KEY_CODE)
                || self.key.as_deref() == Some(ENTER_KEY_NAME))
    }

    /// Reject key fields on non-keyboard events
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.kind != InteractionKind::KeyDown && (self.key_code.is_some() || self.key.is_some())
        {
            return Err(TrackerError::InvalidEvent(format!(
                "{} event must not carry key data",
                self.kind.dom_event()
            )));
        }
        Ok(())
    }
}

/// Interval classification written to `eventLabel`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Active Interaction")]
    Active,
    #[serde(rename = "Inactive Interaction")]
    Inactive,
}

impl Classification {
    /// Label for a first-interaction push, which has no baseline to compare
    pub const FIRST_PUSH: Classification = Classification::Active;

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Active => "Active Interaction",
            Classification::Inactive => "Inactive Interaction",
        }
    }
}

/// Object appended to the analytics event queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLayerEvent {
    /// Always `"GAEvent"`
    pub event: String,
    /// Constant identifying the tracker version
    pub event_category: String,
    /// Interaction type, elapsed-time marker or `"Return"`
    pub event_action: String,
    /// Active/inactive classification
    pub event_label: Classification,
    /// Always true so the analytics backend does not count it as engagement
    pub non_interaction: bool,
}
