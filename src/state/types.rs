//! State types for tracking acknowledged positions
//!
//! These types are serialized to JSON and persisted between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete state of the connector host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-resource state
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a resource
    pub fn get_resource(&self, resource: &str) -> Option<&ResourceState> {
        self.resources.get(resource)
    }

    /// Last acknowledged position of a resource
    pub fn get_position(&self, resource: &str) -> Option<&str> {
        self.resources.get(resource).map(|r| r.position.as_str())
    }

    /// Record an acknowledged position
    pub fn set_position(&mut self, resource: &str, position: String, acked_at: DateTime<Utc>) {
        self.resources.insert(
            resource.to_string(),
            ResourceState {
                position,
                acked_at,
            },
        );
    }
}

/// State for a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    /// Marshalled position, kept as JSON text
    pub position: String,

    /// When the position was acknowledged
    pub acked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.resources.is_empty());
        assert!(state.get_position("crm.contacts").is_none());
    }

    #[test]
    fn test_state_position() {
        let acked_at = Utc.with_ymd_and_hms(2022, 10, 5, 10, 0, 0).unwrap();
        let mut state = State::new();

        state.set_position("crm.contacts", r#"{"mode":"cdc"}"#.to_string(), acked_at);
        assert_eq!(state.get_position("crm.contacts"), Some(r#"{"mode":"cdc"}"#));
        assert_eq!(
            state.get_resource("crm.contacts").map(|r| r.acked_at),
            Some(acked_at)
        );
        assert!(state.get_position("crm.deals").is_none());
    }

    #[test]
    fn test_state_serialization() {
        let acked_at = Utc.with_ymd_and_hms(2022, 10, 5, 10, 0, 0).unwrap();
        let mut state = State::new();
        state.set_position("cms.pages.site", r#"{"mode":"snapshot"}"#.to_string(), acked_at);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resources": {
                    "cms.pages.site": {
                        "position": "{\"mode\":\"snapshot\"}",
                        "ackedAt": "2022-10-05T10:00:00Z",
                    }
                }
            })
        );

        let restored: State = serde_json::from_value(json).unwrap();
        assert_eq!(restored, state);
    }
}
