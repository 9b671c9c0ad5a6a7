//! Store snapshot for persistence across restarts.
//!
//! The whole record set is serialized to a single JSON document that is
//! rewritten after every mutation and loaded back on startup.

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Schema version for snapshot format compatibility
/// Version 1: participants, attempts, survey responses, contest windows
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Serializable copy of every record the store holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Schema version for forward compatibility
    pub schema_version: u32,
    /// Snapshot timestamp (ISO8601)
    pub exported_at: String,
    #[serde(default)]
    pub participants: HashMap<ChatId, Participant>,
    #[serde(default)]
    pub attempts: Vec<PuzzleAttempt>,
    #[serde(default)]
    pub responses: HashMap<ResponseId, SurveyResponse>,
    #[serde(default)]
    pub windows: Vec<ContestWindow>,
}

impl StoreSnapshot {
    pub fn new(
        participants: HashMap<ChatId, Participant>,
        attempts: Vec<PuzzleAttempt>,
        responses: HashMap<ResponseId, SurveyResponse>,
        windows: Vec<ContestWindow>,
    ) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            participants,
            attempts,
            responses,
            windows,
        }
    }

    /// Validate the snapshot before loading it
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(format!(
                "Snapshot schema version {} is newer than supported version {}",
                self.schema_version, SNAPSHOT_SCHEMA_VERSION
            ));
        }

        for attempt in &self.attempts {
            if !self.participants.contains_key(&attempt.chat_id) {
                return Err(format!(
                    "Attempt '{}' references unknown participant {}",
                    attempt.id, attempt.chat_id
                ));
            }
        }

        let mut open_runs = HashSet::new();
        for response in self.responses.values() {
            if !response.finished && !open_runs.insert(response.chat_id) {
                return Err(format!(
                    "Participant {} has more than one unfinished survey",
                    response.chat_id
                ));
            }
        }

        for (index, window) in self.windows.iter().enumerate() {
            if window.start_at >= window.end_at {
                return Err(format!("Contest window '{}' has an empty range", window.title));
            }
            if let Some(other) = self.windows[index + 1..].iter().find(|w| w.overlaps(window)) {
                return Err(format!(
                    "Contest windows '{}' and '{}' overlap",
                    window.title, other.title
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_snapshot_serialization_roundtrip() {
        let mut participants = HashMap::new();
        participants.insert(42, Participant::new(42));
        let snapshot = StoreSnapshot::new(participants, Vec::new(), HashMap::new(), Vec::new());

        let json = serde_json::to_string_pretty(&snapshot).unwrap();
        let parsed: StoreSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.schema_version, SNAPSHOT_SCHEMA_VERSION);
        assert!(parsed.participants.contains_key(&42));
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_validation_future_schema() {
        let snapshot = StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION + 1,
            ..StoreSnapshot::default()
        };

        let result = snapshot.validate();
        assert!(result.unwrap_err().contains("newer than supported"));
    }

    #[test]
    fn test_validation_orphan_attempt() {
        let snapshot = StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            attempts: vec![PuzzleAttempt::new(1, 99, "ответ".to_string(), false, None)],
            ..StoreSnapshot::default()
        };

        assert!(snapshot.validate().unwrap_err().contains("unknown participant"));
    }

    #[test]
    fn test_validation_two_unfinished_surveys() {
        let mut responses = HashMap::new();
        for _ in 0..2 {
            let response = SurveyResponse::new(7);
            responses.insert(response.id.clone(), response);
        }
        let snapshot = StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            responses,
            ..StoreSnapshot::default()
        };

        assert!(snapshot.validate().unwrap_err().contains("more than one unfinished"));
    }

    #[test]
    fn test_validation_overlapping_windows() {
        let now = Utc::now();
        let snapshot = StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            windows: vec![
                ContestWindow::new("first", now, now + Duration::hours(2)),
                ContestWindow::new("second", now + Duration::hours(1), now + Duration::hours(3)),
            ],
            ..StoreSnapshot::default()
        };

        assert!(snapshot.validate().unwrap_err().contains("overlap"));
    }
}
