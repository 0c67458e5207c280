//! Input adapter
//!
//! Parses recorded interaction sessions and resolves every event to an offset
//! from page ready.

use crate::error::TrackerError;
use crate::types::InteractionEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded page view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Page-ready time; required when events carry absolute timestamps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ready_at: Option<DateTime<Utc>>,
    /// Whether the DOM helper the tracker attaches through was loaded
    #[serde(default = "default_true")]
    pub helper_available: bool,
    /// Whether the page defined the analytics queue before activation
    #[serde(default = "default_true")]
    pub data_layer_defined: bool,
    /// Events in the session
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
}

fn default_true() -> bool {
    true
}

impl Session {
    /// A session with a defined queue and helper and offset-only events
    pub fn from_events(events: Vec<InteractionEvent>) -> Self {
        Self {
            page_ready_at: None,
            helper_available: true,
            data_layer_defined: true,
            events,
        }
    }
}

/// An event placed on the page timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub at_ms: u64,
    pub event: InteractionEvent,
}

/// Validation outcome for one input event
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub result: Option<TrackerError>,
}

/// Parse a session JSON document
pub fn parse_session(json: &str) -> Result<Session, TrackerError> {
    serde_json::from_str(json)
        .map_err(|e| TrackerError::ParseError(format!("Failed to parse session: {}", e)))
}

/// Parse a JSON array of events
pub fn parse_array(json: &str) -> Result<Vec<InteractionEvent>, TrackerError> {
    let events: Vec<InteractionEvent> = serde_json::from_str(json)?;
    Ok(events)
}

/// Parse a single NDJSON line
pub fn parse_event_line(line: &str) -> Result<InteractionEvent, TrackerError> {
    serde_json::from_str(line.trim())
        .map_err(|e| TrackerError::ParseError(format!("Failed to parse event: {}", e)))
}

/// Parse newline-delimited events, skipping blank lines
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<InteractionEvent>, TrackerError> {
    let mut events = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: InteractionEvent = serde_json::from_str(trimmed).map_err(|e| {
            TrackerError::ParseError(format!("Line {}: {}", line_num + 1, e))
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Offset of `event` from page ready.
///
/// `at_ms` wins over `timestamp`; a timestamp needs `page_ready_at`.
pub fn resolve_offset(
    event: &InteractionEvent,
    page_ready_at: Option<DateTime<Utc>>,
) -> Result<u64, TrackerError> {
    if let Some(at_ms) = event.at_ms {
        return Ok(at_ms);
    }

    let timestamp = event.timestamp.ok_or_else(|| {
        TrackerError::InvalidEvent(format!(
            "{} event has neither at_ms nor timestamp",
            event.kind.dom_event()
        ))
    })?;
    let ready = page_ready_at.ok_or_else(|| {
        TrackerError::InvalidEvent(
            "timestamped events require the session's page_ready_at".to_string(),
        )
    })?;

    let offset = (timestamp - ready).num_milliseconds();
    u64::try_from(offset).map_err(|_| {
        TrackerError::InvalidEvent(format!(
            "event at {} precedes page ready at {}",
            timestamp.to_rfc3339(),
            ready.to_rfc3339()
        ))
    })
}

/// Validate and place every session event on the timeline, in dispatch order
pub fn to_timeline(session: &Session) -> Result<Vec<TimedEvent>, TrackerError> {
    let mut timeline = session
        .events
        .iter()
        .map(|event| -> Result<TimedEvent, TrackerError> {
            event.validate()?;
            Ok(TimedEvent {
                at_ms: resolve_offset(event, session.page_ready_at)?,
                event: event.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Stable: events recorded at the same instant keep their order
    timeline.sort_by_key(|t| t.at_ms);
    Ok(timeline)
}

/// Validate each event without stopping at the first failure
pub fn validate_events(
    events: &[InteractionEvent],
    page_ready_at: Option<DateTime<Utc>>,
) -> Vec<ValidationResult> {
    events
        .iter()
        .enumerate()
        .map(|(index, event)| {
            let result = event
                .validate()
                .and_then(|_| resolve_offset(event, page_ready_at).map(|_| ()))
                .err();
            ValidationResult { index, result }
        })
        .collect()
}
