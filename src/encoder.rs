//! Data layer payload encoder
//!
//! Builds the fixed-shape objects pushed into the analytics event queue.

use crate::error::TrackerError;
use crate::types::{Classification, DataLayerEvent, GA_EVENT_NAME};

/// Encoder bound to one tracker's event category
#[derive(Debug, Clone)]
pub struct DataLayerEncoder {
    event_category: String,
}

impl DataLayerEncoder {
    /// Create an encoder that stamps every payload with `event_category`
    pub fn new(event_category: impl Into<String>) -> Self {
        Self {
            event_category: event_category.into(),
        }
    }

    pub fn event_category(&self) -> &str {
        &self.event_category
    }

    /// Encode one emission
    pub fn encode(&self, action: &str, classification: Classification) -> DataLayerEvent {
        DataLayerEvent {
            event: GA_EVENT_NAME.to_string(),
            event_category: self.event_category.clone(),
            event_action: action.to_string(),
            event_label: classification,
            non_interaction: true,
        }
    }

    /// Encode a batch of payloads as a JSON array
    pub fn encode_to_json(events: &[DataLayerEvent]) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(events)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_fixed_fields() {
        let encoder = DataLayerEncoder::new("Firebrand User Events");
        let event = encoder.encode("Click", Classification::FIRST_PUSH);

        assert_eq!(
            event,
            DataLayerEvent {
                event: "GAEvent".to_string(),
                event_category: "Firebrand User Events".to_string(),
                event_action: "Click".to_string(),
                event_label: Classification::Active,
                non_interaction: true,
            }
        );
    }

    #[test]
    fn test_encode_to_json_array() {
        let encoder = DataLayerEncoder::new("cat");
        let events = vec![
            encoder.encode("Scroll", Classification::Active),
            encoder.encode("5 seconds", Classification::Inactive),
        ];

        let json = DataLayerEncoder::encode_to_json(&events).unwrap();
        let parsed: Vec<DataLayerEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, events);
        assert!(json.contains("\"eventLabel\":\"Inactive Interaction\""));
    }
}
