use crate::session::{GameSession, HistoryEntry, PlayerRecord, SessionStatus, UserId};
use crate::store::{SessionStore, StoreError, StoreResult};
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Room codes avoid 0/O/1/I/L to stay readable when shared out loud.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LEN: usize = 6;

/// How many chat messages the lobby keeps in `state.chat_messages`.
const CHAT_RING_CAP: usize = 100;

/// Operations surface over the session store; the only component permitted
/// to mutate [`GameSession`] records.
///
/// Every mutation funnels through a read-merge-save loop against the store's
/// versioned write, so two concurrent mutations of the same session
/// serialize instead of losing updates.
#[derive(Clone)]
pub struct GameManager {
    store: Arc<dyn SessionStore>,
}

impl GameManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    fn generate_room_code() -> String {
        let mut rng = rand::rng();
        (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Create a new session in the lobby state, immediately persisted and
    /// fetchable by either key.
    pub async fn create_session(
        &self,
        game_slug: &str,
        host_id: &str,
        max_players: Option<u32>,
        initial_state: Option<Map<String, Value>>,
    ) -> StoreResult<GameSession> {
        let state = initial_state.unwrap_or_default();
        loop {
            let session = GameSession::new(
                game_slug,
                host_id,
                Self::generate_room_code(),
                max_players.unwrap_or(5),
                state.clone(),
            );
            match self.store.insert(session).await {
                Ok(created) => {
                    tracing::info!(
                        session_id = %created.session_id,
                        room_code = %created.room_code,
                        game_slug,
                        "created game session"
                    );
                    return Ok(created);
                }
                // 31^6 codes, collisions are rare; just roll again
                Err(StoreError::RoomCodeTaken(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch by session id or room code, transparently. Room code lookup is
    /// case-insensitive.
    pub async fn get_session(&self, key: &str) -> StoreResult<GameSession> {
        match self.store.by_session_id(key).await {
            Ok(session) => Ok(session),
            Err(StoreError::NotFound(_)) => self.store.by_room_code(&key.to_uppercase()).await,
            Err(e) => Err(e),
        }
    }

    /// Read-merge-save loop. The closure is re-applied to a fresh copy on
    /// every version conflict.
    async fn mutate<F>(&self, session_id: &str, mut apply: F) -> StoreResult<GameSession>
    where
        F: FnMut(&mut GameSession),
    {
        loop {
            let mut session = self.store.by_session_id(session_id).await?;
            apply(&mut session);
            match self.store.save(session).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::Conflict(id)) => {
                    tracing::debug!(session_id = %id, "version conflict, retrying merge");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Idempotently insert or update a player's roster entry. Existing
    /// entries keep their ready flag; nothing ever removes a player.
    pub async fn join_session(
        &self,
        session_id: &str,
        user_id: &str,
        record: PlayerRecord,
    ) -> StoreResult<GameSession> {
        self.mutate(session_id, |session| {
            match session.players.get_mut(user_id) {
                Some(existing) => {
                    existing.name = record.name.clone();
                    existing.role = record.role.clone();
                    if record.persona.is_some() {
                        existing.persona = record.persona.clone();
                    }
                    if record.truth_analysis_enabled.is_some() {
                        existing.truth_analysis_enabled = record.truth_analysis_enabled;
                    }
                }
                None => {
                    session.players.insert(user_id.to_string(), record.clone());
                }
            }
        })
        .await
    }

    /// Merge lobby toggles (ready flag, persona, analysis opt-in) into one
    /// player's roster entry, inserting a minimal entry if the player has
    /// not joined through the normal path.
    pub async fn update_player_status(
        &self,
        session_id: &str,
        user_id: &str,
        is_ready: bool,
        truth_analysis_enabled: Option<bool>,
        persona: Option<String>,
    ) -> StoreResult<GameSession> {
        self.mutate(session_id, |session| {
            let entry = session
                .players
                .entry(user_id.to_string())
                .or_insert_with(|| PlayerRecord::new(user_id, "Player"));
            entry.apply_status(is_ready, truth_analysis_enabled, persona.clone());
        })
        .await
    }

    /// Shallow-merge `partial` into the session state: only the supplied
    /// top-level keys are replaced, everything else survives unchanged.
    /// Optionally appends one history entry in the same write.
    pub async fn update_state(
        &self,
        session_id: &str,
        partial: Map<String, Value>,
        history_entry: Option<HistoryEntry>,
    ) -> StoreResult<GameSession> {
        self.mutate(session_id, |session| {
            for (key, value) in &partial {
                session.state.insert(key.clone(), value.clone());
            }
            if let Some(entry) = &history_entry {
                session.history.push(entry.clone());
            }
        })
        .await
    }

    pub async fn set_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> StoreResult<GameSession> {
        self.mutate(session_id, |session| session.status = status).await
    }

    /// Append a lobby chat message to the `state.chat_messages` ring buffer,
    /// keeping only the most recent [`CHAT_RING_CAP`] entries.
    pub async fn append_chat(&self, session_id: &str, message: Value) -> StoreResult<GameSession> {
        self.mutate(session_id, |session| {
            let mut messages = session.state_array("chat_messages");
            messages.push(message.clone());
            if messages.len() > CHAT_RING_CAP {
                messages.drain(..messages.len() - CHAT_RING_CAP);
            }
            session
                .state
                .insert("chat_messages".into(), Value::Array(messages));
        })
        .await
    }

    /// Lobby/active sessions the user participates in, newest first.
    pub async fn sessions_for_user(&self, user_id: &UserId) -> StoreResult<Vec<GameSession>> {
        let sessions = self.store.recent_open(50).await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.players.contains_key(user_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn manager() -> GameManager {
        GameManager::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_then_fetch_by_either_key() {
        let gm = manager();
        let created = gm
            .create_session("ai-adventure-dungeon", "host-1", None, None)
            .await
            .unwrap();

        let by_id = gm.get_session(&created.session_id).await.unwrap();
        // Room code lookup is case-insensitive
        let by_code = gm
            .get_session(&created.room_code.to_lowercase())
            .await
            .unwrap();

        assert_eq!(by_id.session_id, created.session_id);
        assert_eq!(by_code.session_id, created.session_id);
        assert_eq!(by_id.status, SessionStatus::Lobby);
    }

    #[tokio::test]
    async fn test_get_session_not_found() {
        let gm = manager();
        let err = gm.get_session("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_keeps_ready_flag() {
        let gm = manager();
        let s = gm.create_session("slug", "host-1", None, None).await.unwrap();

        gm.join_session(&s.session_id, "u1", PlayerRecord::new("Ana", "Player"))
            .await
            .unwrap();
        gm.update_player_status(&s.session_id, "u1", true, None, None)
            .await
            .unwrap();

        // Re-joining must not reset readiness
        let after = gm
            .join_session(&s.session_id, "u1", PlayerRecord::new("Ana", "Player"))
            .await
            .unwrap();
        assert_eq!(after.players.len(), 1);
        assert!(after.players["u1"].is_ready);
    }

    #[tokio::test]
    async fn test_update_state_shallow_merge() {
        let gm = manager();
        let mut initial = Map::new();
        initial.insert("hp".into(), json!(50));
        initial.insert("gold".into(), json!(0));
        initial.insert("inventory".into(), json!(["Torch"]));
        let s = gm
            .create_session("slug", "host-1", None, Some(initial))
            .await
            .unwrap();

        let mut partial = Map::new();
        partial.insert("gold".into(), json!(5));
        partial.insert("inventory".into(), json!(["Torch", "Shield"]));
        let updated = gm
            .update_state(&s.session_id, partial, None)
            .await
            .unwrap();

        // Untouched keys survive, lists are replaced wholesale
        assert_eq!(updated.state["hp"], json!(50));
        assert_eq!(updated.state["gold"], json!(5));
        assert_eq!(updated.state["inventory"], json!(["Torch", "Shield"]));
    }

    #[tokio::test]
    async fn test_update_state_empty_partial_is_identity() {
        let gm = manager();
        let mut initial = Map::new();
        initial.insert("hp".into(), json!(50));
        let s = gm
            .create_session("slug", "host-1", None, Some(initial))
            .await
            .unwrap();

        let before = gm.get_session(&s.session_id).await.unwrap().state;
        let after = gm
            .update_state(&s.session_id, Map::new(), None)
            .await
            .unwrap()
            .state;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_update_state_is_idempotent_for_same_partial() {
        let gm = manager();
        let s = gm.create_session("slug", "host-1", None, None).await.unwrap();

        let mut partial = Map::new();
        partial.insert("karma".into(), json!(60));
        partial.insert("arc".into(), json!("Redemption"));

        let once = gm
            .update_state(&s.session_id, partial.clone(), None)
            .await
            .unwrap()
            .state;
        let twice = gm
            .update_state(&s.session_id, partial, None)
            .await
            .unwrap()
            .state;
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_update_state_appends_history() {
        let gm = manager();
        let s = gm.create_session("slug", "host-1", None, None).await.unwrap();

        let entry = HistoryEntry::new("u1", "action", "go north").with_result("You go north.");
        let updated = gm
            .update_state(&s.session_id, Map::new(), Some(entry))
            .await
            .unwrap();

        assert_eq!(updated.history.len(), 1);
        assert_eq!(updated.history[0].content, "go north");
        assert_eq!(updated.history[0].result.as_deref(), Some("You go north."));
    }

    #[tokio::test]
    async fn test_chat_ring_buffer_caps_at_100() {
        let gm = manager();
        let s = gm.create_session("slug", "host-1", None, None).await.unwrap();

        for i in 0..105 {
            gm.append_chat(&s.session_id, json!({"message": format!("m{i}")}))
                .await
                .unwrap();
        }

        let session = gm.get_session(&s.session_id).await.unwrap();
        let messages = session.state_array("chat_messages");
        assert_eq!(messages.len(), 100);
        assert_eq!(messages[0]["message"], json!("m5"));
        assert_eq!(messages[99]["message"], json!("m104"));
    }

    #[tokio::test]
    async fn test_sessions_for_user_filters_by_roster() {
        let gm = manager();
        let a = gm.create_session("slug", "host-1", None, None).await.unwrap();
        let b = gm.create_session("slug", "host-2", None, None).await.unwrap();

        gm.join_session(&a.session_id, "u1", PlayerRecord::new("Ana", "Player"))
            .await
            .unwrap();
        gm.join_session(&b.session_id, "u2", PlayerRecord::new("Ben", "Player"))
            .await
            .unwrap();

        let mine = gm.sessions_for_user(&"u1".to_string()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].session_id, a.session_id);
    }

    #[tokio::test]
    async fn test_concurrent_merges_both_land() {
        let gm = manager();
        let s = gm.create_session("slug", "host-1", None, None).await.unwrap();

        let gm_a = gm.clone();
        let gm_b = gm.clone();
        let id_a = s.session_id.clone();
        let id_b = s.session_id.clone();

        let a = tokio::spawn(async move {
            let mut p = Map::new();
            p.insert("alpha".into(), json!(1));
            gm_a.update_state(&id_a, p, None).await
        });
        let b = tokio::spawn(async move {
            let mut p = Map::new();
            p.insert("beta".into(), json!(2));
            gm_b.update_state(&id_b, p, None).await
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let session = gm.get_session(&s.session_id).await.unwrap();
        assert_eq!(session.state["alpha"], json!(1));
        assert_eq!(session.state["beta"], json!(2));
    }
}
