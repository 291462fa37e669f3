use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::controller::{Command, Outcome};

/// The result of one finished operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub artifact_id: String,
    pub command: Command,
    pub outcome: Outcome,
}

/// Envelope wrapping an outcome event with its emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeEnvelope {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: OutcomeEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serializes_flat() {
        let envelope = OutcomeEnvelope {
            timestamp: Utc::now(),
            event: OutcomeEvent {
                artifact_id: "GE-Proton8-1".to_string(),
                command: Command::Install,
                outcome: Outcome::Success,
            },
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["artifact_id"], "GE-Proton8-1");
        assert_eq!(json["command"], "install");
        assert_eq!(json["outcome"], "success");
        assert!(json["timestamp"].is_string());
    }
}
