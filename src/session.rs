use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type SessionId = String;
pub type UserId = String;

/// Lifecycle status of a game session, stored as a plain column next to the
/// JSON blobs. `Ended` exists for completeness; most games never set it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Lobby,
    Active,
    Ended,
}

/// Per-player entry in the session roster.
///
/// Once a user id is present in `players` it is never removed for the life
/// of the session; there is no leave/kick operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth_analysis_enabled: Option<bool>,
}

impl PlayerRecord {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            is_ready: false,
            persona: None,
            truth_analysis_enabled: None,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_truth_analysis(mut self, enabled: bool) -> Self {
        self.truth_analysis_enabled = Some(enabled);
        self
    }

    /// Merge lobby toggles into this record. `None` fields are left alone.
    pub fn apply_status(
        &mut self,
        is_ready: bool,
        truth_analysis_enabled: Option<bool>,
        persona: Option<String>,
    ) {
        self.is_ready = is_ready;
        if let Some(enabled) = truth_analysis_enabled {
            self.truth_analysis_enabled = Some(enabled);
        }
        if let Some(persona) = persona {
            self.persona = Some(persona);
        }
    }
}

/// One entry in the append-only session history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user: UserId,
    pub action: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub ts: String,
}

impl HistoryEntry {
    pub fn new(user: impl Into<String>, action: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            action: action.into(),
            content: content.into(),
            result: None,
            ts: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }
}

/// A persisted multiplayer game session.
///
/// `state` is the authoritative world state for whichever game owns the
/// session; each game controller defines and interprets its own keys.
/// `version` is a monotonic counter bumped on every successful save and
/// checked on write so concurrent merges cannot silently overwrite each
/// other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub session_id: SessionId,
    pub room_code: String,
    pub game_slug: String,
    pub host_user_id: UserId,
    pub status: SessionStatus,
    pub max_players: u32,
    pub players: HashMap<UserId, PlayerRecord>,
    pub state: Map<String, Value>,
    pub history: Vec<HistoryEntry>,
    /// Externally produced per-player observation records, consumed
    /// read-only by game controllers.
    pub analysis: HashMap<UserId, Value>,
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl GameSession {
    pub fn new(
        game_slug: impl Into<String>,
        host_user_id: impl Into<String>,
        room_code: impl Into<String>,
        max_players: u32,
        initial_state: Map<String, Value>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            session_id: ulid::Ulid::new().to_string(),
            room_code: room_code.into(),
            game_slug: game_slug.into(),
            host_user_id: host_user_id.into(),
            status: SessionStatus::Lobby,
            max_players,
            players: HashMap::new(),
            state: initial_state,
            history: Vec::new(),
            analysis: HashMap::new(),
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Read an integer field out of the state blob, tolerating both integer
    /// and float encodings.
    pub fn state_i64(&self, key: &str, default: i64) -> i64 {
        match self.state.get(key) {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(default),
            _ => default,
        }
    }

    pub fn state_str(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(Value::as_str)
    }

    pub fn state_array(&self, key: &str) -> Vec<Value> {
        self.state
            .get(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_record_apply_status_keeps_unset_fields() {
        let mut record = PlayerRecord::new("Alice", "Player").with_persona("The Voyager");
        record.apply_status(true, None, None);

        assert!(record.is_ready);
        assert_eq!(record.persona.as_deref(), Some("The Voyager"));
        assert_eq!(record.truth_analysis_enabled, None);

        record.apply_status(false, Some(true), Some("The Architect".into()));
        assert!(!record.is_ready);
        assert_eq!(record.truth_analysis_enabled, Some(true));
        assert_eq!(record.persona.as_deref(), Some("The Architect"));
    }

    #[test]
    fn test_state_accessors() {
        let mut state = Map::new();
        state.insert("hp".into(), json!(73));
        state.insert("scene".into(), json!("a cavern"));
        state.insert("inventory".into(), json!(["Torch"]));
        let session = GameSession::new("ai-adventure-dungeon", "u1", "ABC234", 5, state);

        assert_eq!(session.state_i64("hp", 100), 73);
        assert_eq!(session.state_i64("gold", 10), 10);
        assert_eq!(session.state_str("scene"), Some("a cavern"));
        assert_eq!(session.state_array("inventory").len(), 1);
        assert!(session.state_array("missing").is_empty());
    }
}
