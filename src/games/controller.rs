//! Generic per-game controller: every game runs through the same
//! load / prompt / complete / parse / clamp / merge pipeline, parameterized
//! by its [`Game`] implementation.

use super::{builtin, observer_note, ActionInput, Game, StartOptions};
use crate::llm::{CompletionGateway, CompletionRequest};
use crate::manager::GameManager;
use crate::session::{GameSession, HistoryEntry, PlayerRecord};
use crate::store::StoreError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("unknown game: {0}")]
    UnknownGame(String),

    #[error("Not your turn!")]
    NotYourTurn,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct GameController {
    manager: GameManager,
    gateway: Arc<CompletionGateway>,
    games: HashMap<&'static str, Arc<dyn Game>>,
}

impl GameController {
    pub fn new(manager: GameManager, gateway: Arc<CompletionGateway>) -> Self {
        Self {
            manager,
            gateway,
            games: builtin(),
        }
    }

    fn game(&self, slug: &str) -> GameResult<&Arc<dyn Game>> {
        self.games
            .get(slug)
            .ok_or_else(|| GameError::UnknownGame(slug.to_string()))
    }

    pub fn has_game(&self, slug: &str) -> bool {
        self.games.contains_key(slug)
    }

    /// Create a session for one game, seed the opening narrative, and join
    /// the creating player as host.
    pub async fn start(&self, slug: &str, opts: StartOptions) -> GameResult<GameSession> {
        let game = self.game(slug)?;

        let opening = if opts.ai_enabled {
            self.gateway
                .complete_or(
                    CompletionRequest::new(game.system_prompt(), game.opening_prompt(&opts))
                        .with_max_tokens(game.opening_max_tokens()),
                    Some(game.opening_fallback()),
                )
                .await
        } else {
            game.opening_fallback().to_string()
        };

        // JSON games wrap the opening in their turn object; plain text (and
        // any fallback string) is taken as-is. The tag-stripped narrative is
        // what lands in state.
        let narrative = match serde_json::from_str::<Value>(&opening) {
            Ok(turn) => turn
                .get(game.narrative_field())
                .and_then(Value::as_str)
                .unwrap_or(&opening)
                .to_string(),
            Err(_) => opening.clone(),
        };
        let (display, _) = game.schema().parse(&narrative);

        let initial_state = game.initial_state(&opts, &display);
        let session = self
            .manager
            .create_session(slug, &opts.user_id, None, Some(initial_state))
            .await?;

        let record = PlayerRecord::new(opts.user_id.clone(), "Host");
        let session = self
            .manager
            .join_session(&session.session_id, &opts.user_id, record)
            .await?;

        Ok(session)
    }

    /// Join an existing session; ordered games also append the player to
    /// `player_order`.
    pub async fn join(
        &self,
        slug: &str,
        session_id: &str,
        user_id: &str,
        role: Option<String>,
    ) -> GameResult<GameSession> {
        let game = self.game(slug)?;

        let role = role.unwrap_or_else(|| game.player_role().to_string());
        let mut session = self
            .manager
            .join_session(session_id, user_id, PlayerRecord::new(user_id, role))
            .await?;

        if game.enforce_turns() {
            let mut order = session.state_array("player_order");
            if !order.iter().any(|v| v.as_str() == Some(user_id)) {
                order.push(json!(user_id));
                let mut partial = serde_json::Map::new();
                partial.insert("player_order".into(), Value::Array(order));
                session = self.manager.update_state(session_id, partial, None).await?;
            }
        }

        Ok(session)
    }

    /// Move a lobby session into play: seed the game's opening state over
    /// whatever the lobby accumulated and flip the status to active.
    ///
    /// Used by the multiplayer flow, where the session exists (and gathers
    /// players and chat) before the game itself begins. Lobby keys the game
    /// does not define survive the merge.
    pub async fn activate(&self, session_id: &str) -> GameResult<GameSession> {
        let session = self.manager.get_session(session_id).await?;
        let game = self.game(&session.game_slug)?;

        let ai_enabled = session
            .state
            .get("ai_enabled")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let opts = StartOptions {
            user_id: session.host_user_id.clone(),
            theme: session.state_str("theme").map(String::from),
            ai_enabled,
        };

        let opening = if ai_enabled {
            self.gateway
                .complete_or(
                    CompletionRequest::new(game.system_prompt(), game.opening_prompt(&opts))
                        .with_max_tokens(game.opening_max_tokens()),
                    Some(game.opening_fallback()),
                )
                .await
        } else {
            game.opening_fallback().to_string()
        };
        let narrative = match serde_json::from_str::<Value>(&opening) {
            Ok(turn) => turn
                .get(game.narrative_field())
                .and_then(Value::as_str)
                .unwrap_or(&opening)
                .to_string(),
            Err(_) => opening.clone(),
        };
        let (display, _) = game.schema().parse(&narrative);

        let mut seeded = game.initial_state(&opts, &display);
        if game.enforce_turns() {
            // Roster order with the host first, so turn one belongs to them
            let mut order: Vec<String> = session
                .players
                .keys()
                .filter(|id| **id != session.host_user_id)
                .cloned()
                .collect();
            order.sort();
            order.insert(0, session.host_user_id.clone());
            seeded.insert("player_order".into(), json!(order));
            seeded.insert("turn_index".into(), json!(0));
        }
        seeded.insert("active_player".into(), json!(session.host_user_id));

        self.manager.update_state(session_id, seeded, None).await?;
        Ok(self
            .manager
            .set_status(session_id, crate::session::SessionStatus::Active)
            .await?)
    }

    /// Translate one submitted action into a state transition, using the
    /// completion gateway as narrative oracle.
    pub async fn action(&self, slug: &str, input: ActionInput) -> GameResult<GameSession> {
        let game = self.game(slug)?;
        let session = self.manager.get_session(&input.session_id).await?;

        // Turn enforcement happens before any mutation
        let turn_index = session.state_i64("turn_index", 0);
        if game.enforce_turns() {
            let mut order: Vec<String> = session
                .state_array("player_order")
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect();
            if order.is_empty() {
                order = session.players.keys().cloned().collect();
                order.sort();
            }
            if !order.is_empty() {
                let expected = &order[turn_index as usize % order.len()];
                if *expected != input.user_id {
                    return Err(GameError::NotYourTurn);
                }
            }
        }

        let mut note = observer_note(&session, &input.user_id);
        if !note.is_empty() {
            note.push_str(game.observer_trailer());
        }
        let prompt = game.action_prompt(&session, &input, &note);
        let fallback = game.action_fallback(&input);

        let raw = self
            .gateway
            .complete_or(
                CompletionRequest::new(game.system_prompt(), prompt)
                    .with_max_tokens(game.action_max_tokens()),
                Some(&fallback),
            )
            .await;

        let turn = game.turn_from_response(&session, &raw);
        let narrative = turn
            .get(game.narrative_field())
            .and_then(Value::as_str)
            .unwrap_or("");

        let (display, ops) = game.schema().parse(narrative);
        let mut changed = game.schema().apply(&session.state, &ops);
        game.apply_turn(&session, &input, &display, &turn, &mut changed);

        changed.insert("turn".into(), json!(session.state_i64("turn", 0) + 1));
        if game.enforce_turns() {
            let order_len = session.state_array("player_order").len().max(1);
            changed.insert(
                "turn_index".into(),
                json!((turn_index + 1) % order_len as i64),
            );
        }

        let entry = HistoryEntry::new(&input.user_id, &input.action, &input.content)
            .with_result(display);
        let updated = self
            .manager
            .update_state(&input.session_id, changed, Some(entry))
            .await?;

        Ok(updated)
    }

    pub async fn status(&self, session_id: &str) -> GameResult<GameSession> {
        Ok(self.manager.get_session(session_id).await?)
    }
}
