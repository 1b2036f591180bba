//! Per-project notification records and the staleness decision.
//!
//! A [`NotificationRecord`] is stored as one JSON value per project. It holds
//! the rolling log of updates and the instant each session last checked in.
//! Writers have used several shapes over time; decoding normalises all of
//! them into the canonical [`UpdateEvent`].

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::timestamp::Timestamp;
use crate::Result;

/// Who caused an update.
///
/// `System` is never equal to any real session, so system-originated events
/// always count as "not mine" for every reader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum EventOrigin {
    /// A client session, identified by its opaque token.
    Session(String),
    /// Not attributable to any session.
    System,
}

impl EventOrigin {
    /// Whether this event was made by `session_id` itself.
    pub fn is_session(&self, session_id: &str) -> bool {
        matches!(self, EventOrigin::Session(id) if id == session_id)
    }
}

impl From<Option<String>> for EventOrigin {
    fn from(value: Option<String>) -> Self {
        value.map_or(EventOrigin::System, EventOrigin::Session)
    }
}

impl From<EventOrigin> for Option<String> {
    fn from(origin: EventOrigin) -> Self {
        match origin {
            EventOrigin::Session(id) => Some(id),
            EventOrigin::System => None,
        }
    }
}

/// Originating user of an update. Kept for older records; the freshness
/// decision never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

/// A single change to a project's shared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEvent")]
pub struct UpdateEvent {
    /// When the change occurred.
    pub timestamp: Timestamp,
    /// Session that made the change.
    pub session_id: EventOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl UpdateEvent {
    /// An update made by `session_id` at `timestamp`.
    pub fn new(timestamp: Timestamp, session_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            session_id: EventOrigin::Session(session_id.into()),
            user_id: None,
        }
    }

    /// A system-originated update.
    pub fn system(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            session_id: EventOrigin::System,
            user_id: None,
        }
    }

    /// Attach the originating user.
    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Map-shaped event. `updated_at` is the key older writers used.
#[derive(Deserialize)]
struct EventFields {
    #[serde(alias = "updated_at")]
    timestamp: Timestamp,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    user_id: Option<UserId>,
}

/// Accept the map shape and the legacy positional shapes:
/// `[timestamp, session_id, user_id]` and `[timestamp, session_id]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEvent {
    Fields(EventFields),
    Triple(Timestamp, Option<String>, Option<UserId>),
    Pair(Timestamp, Option<String>),
}

impl From<RawEvent> for UpdateEvent {
    fn from(raw: RawEvent) -> Self {
        let (timestamp, session_id, user_id) = match raw {
            RawEvent::Fields(f) => (f.timestamp, f.session_id, f.user_id),
            RawEvent::Triple(timestamp, session_id, user_id) => (timestamp, session_id, user_id),
            RawEvent::Pair(timestamp, session_id) => (timestamp, session_id, None),
        };
        Self {
            timestamp,
            session_id: session_id.into(),
            user_id,
        }
    }
}

/// The cached state of one project.
///
/// A missing cache entry is equivalent to [`NotificationRecord::default()`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Updates in the order they happened. Not deduplicated.
    #[serde(default, deserialize_with = "null_as_default")]
    pub updates: Vec<UpdateEvent>,
    /// Session id → instant that session last checked for changes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_check: HashMap<String, Timestamp>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl NotificationRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored value. Strict: callers decide how to treat failures.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode for storage.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Append an update.
    pub fn with_update(mut self, event: UpdateEvent) -> Self {
        self.updates.push(event);
        self
    }

    /// Record when `session_id` last checked in.
    pub fn with_last_check(mut self, session_id: impl Into<String>, at: Timestamp) -> Self {
        self.last_check.insert(session_id.into(), at);
        self
    }

    /// When `session_id` last checked in, if ever.
    pub fn last_check_for(&self, session_id: &str) -> Option<Timestamp> {
        self.last_check.get(session_id).copied()
    }

    /// Whether `session_id` must refresh its view.
    ///
    /// True when the session has never checked in, or when some update
    /// strictly newer than its last check was made by anyone else.
    pub fn needs_refresh(&self, session_id: &str) -> bool {
        let Some(seen_at) = self.last_check_for(session_id) else {
            return true;
        };
        self.updates
            .iter()
            .any(|event| event.timestamp > seen_at && !event.session_id.is_session(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(secs).unwrap()
    }

    #[test]
    fn other_session_update_after_last_check() {
        let record = NotificationRecord::new()
            .with_update(UpdateEvent::new(at(100), "A"))
            .with_last_check("B", at(50));
        assert!(record.needs_refresh("B"));
    }

    #[test]
    fn own_update_is_ignored() {
        let record = NotificationRecord::new()
            .with_update(UpdateEvent::new(at(100), "B"))
            .with_last_check("B", at(50));
        assert!(!record.needs_refresh("B"));
    }

    #[test]
    fn empty_record_is_fresh_for_unknown_session() {
        assert!(NotificationRecord::new().needs_refresh("B"));
    }

    #[test]
    fn update_older_than_last_check() {
        let record = NotificationRecord::new()
            .with_update(UpdateEvent::new(at(40), "A"))
            .with_last_check("B", at(50));
        assert!(!record.needs_refresh("B"));
    }

    #[test]
    fn update_at_exactly_last_check_is_seen() {
        let record = NotificationRecord::new()
            .with_update(UpdateEvent::new(at(50), "A"))
            .with_last_check("B", at(50));
        assert!(!record.needs_refresh("B"));
    }

    #[test]
    fn system_update_counts_for_everyone() {
        let record = NotificationRecord::new()
            .with_update(UpdateEvent::system(at(100)))
            .with_last_check("B", at(50));
        assert!(record.needs_refresh("B"));
    }

    #[test]
    fn newer_update_anywhere_in_log() {
        let record = NotificationRecord::new()
            .with_update(UpdateEvent::new(at(200), "A"))
            .with_update(UpdateEvent::new(at(10), "A"))
            .with_update(UpdateEvent::new(at(300), "B"))
            .with_last_check("B", at(150));
        assert!(record.needs_refresh("B"));
    }

    #[test]
    fn other_sessions_last_check_is_irrelevant() {
        let record = NotificationRecord::new()
            .with_update(UpdateEvent::new(at(100), "A"))
            .with_last_check("A", at(500));
        assert!(record.needs_refresh("B"));
    }

    #[test]
    fn decodes_map_events() {
        let json = br#"{
            "updates": [{"timestamp": 100, "session_id": "A", "user_id": 7}],
            "last_check": {"B": 50}
        }"#;
        let record = NotificationRecord::from_slice(json).unwrap();
        assert_eq!(record.updates.len(), 1);
        assert_eq!(record.updates[0].session_id, EventOrigin::Session("A".into()));
        assert_eq!(record.updates[0].user_id, Some(UserId::Numeric(7)));
        assert_eq!(record.last_check_for("B"), Some(at(50)));
    }

    #[test]
    fn decodes_updated_at_alias() {
        let json = br#"{"updates": [{"updated_at": 100, "session_id": "A"}]}"#;
        let record = NotificationRecord::from_slice(json).unwrap();
        assert_eq!(record.updates[0].timestamp, at(100));
    }

    #[test]
    fn decodes_legacy_array_events() {
        let json = br#"{
            "updates": [[100, "A", "u-1"], [120, null, null], [130, "C"]],
            "last_check": {}
        }"#;
        let record = NotificationRecord::from_slice(json).unwrap();
        assert_eq!(record.updates.len(), 3);
        assert_eq!(record.updates[0].user_id, Some(UserId::Text("u-1".into())));
        assert_eq!(record.updates[1].session_id, EventOrigin::System);
        assert_eq!(record.updates[2].session_id, EventOrigin::Session("C".into()));
    }

    #[test]
    fn missing_and_null_fields_default() {
        let record = NotificationRecord::from_slice(br#"{"updates": null}"#).unwrap();
        assert_eq!(record, NotificationRecord::default());
        let record = NotificationRecord::from_slice(b"{}").unwrap();
        assert_eq!(record, NotificationRecord::default());
    }

    #[test]
    fn encode_decode_preserves_record() {
        let record = NotificationRecord::new()
            .with_update(UpdateEvent::new(at(100), "A").user(UserId::Numeric(3)))
            .with_update(UpdateEvent::system(at(110)))
            .with_last_check("B", at(50));
        let decoded = NotificationRecord::from_slice(&record.to_vec().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }
}
