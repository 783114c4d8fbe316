//! The per-game layer: delta-tag parsing, the [`Game`] trait describing one
//! mini-experience, the built-in game table, and the generic controller
//! that turns player actions into state transitions.

pub mod controller;
pub mod delta;

mod dungeon;
mod story_weaver;
mod truth_layer;

pub use controller::{GameController, GameError};

use crate::session::GameSession;
use delta::StateSchema;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Options accepted by a game's start endpoint. `theme` doubles as genre
/// for narrative games.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub user_id: String,
    pub theme: Option<String>,
    pub ai_enabled: bool,
}

/// One submitted player action
#[derive(Debug, Clone)]
pub struct ActionInput {
    pub session_id: String,
    pub user_id: String,
    pub action: String,
    pub content: String,
}

/// One game template: prompts, state schema, and the bookkeeping applied
/// after each AI-assisted turn. The controller drives every game through
/// the same load / prompt / complete / parse / merge pipeline.
pub trait Game: Send + Sync {
    fn slug(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn system_prompt(&self) -> &'static str;
    fn schema(&self) -> &'static StateSchema;

    /// Whether actions must follow `player_order` round-robin
    fn enforce_turns(&self) -> bool {
        false
    }

    /// Roster role given to non-host joiners
    fn player_role(&self) -> &'static str {
        "Player"
    }

    /// Which field of the model's JSON response carries the narrative (and
    /// the embedded delta tag)
    fn narrative_field(&self) -> &'static str {
        "narrative"
    }

    /// Instruction appended after the shadow-observer note, telling the
    /// model what to do with the flagged mismatch.
    fn observer_trailer(&self) -> &'static str {
        ""
    }

    fn opening_max_tokens(&self) -> u32 {
        300
    }

    fn action_max_tokens(&self) -> u32 {
        500
    }

    fn opening_fallback(&self) -> &'static str;
    fn action_fallback(&self, input: &ActionInput) -> String;

    fn opening_prompt(&self, opts: &StartOptions) -> String;

    /// Seed state for a fresh session, built around the opening narrative
    fn initial_state(&self, opts: &StartOptions, opening: &str) -> Map<String, Value>;

    fn action_prompt(&self, session: &GameSession, input: &ActionInput, observer_note: &str)
        -> String;

    /// Interpret the raw model response as one turn object. The default
    /// expects JSON and substitutes [`Game::fallback_turn`] when the model
    /// ignores the contract; plain-text games override this.
    fn turn_from_response(&self, session: &GameSession, raw: &str) -> Value {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "model response was not valid JSON, using fallback turn");
            self.fallback_turn(session)
        })
    }

    /// Substitute turn object when the model output cannot be parsed. Takes
    /// the session so games can keep derived fields current.
    fn fallback_turn(&self, session: &GameSession) -> Value;

    /// Game-specific bookkeeping merged after the schema deltas: narrative
    /// logs, derived counters, question rotation. `changed` already holds
    /// the validated gauge/list/assign updates.
    fn apply_turn(
        &self,
        session: &GameSession,
        input: &ActionInput,
        display: &str,
        turn: &Value,
        changed: &mut Map<String, Value>,
    );
}

/// Built-in game table, constructed once at startup and passed to handlers.
pub fn builtin() -> HashMap<&'static str, Arc<dyn Game>> {
    let games: Vec<Arc<dyn Game>> = vec![
        Arc::new(dungeon::AdventureDungeon),
        Arc::new(story_weaver::StoryWeaver),
        Arc::new(truth_layer::TruthAndLayer),
    ];
    games.into_iter().map(|g| (g.slug(), g)).collect()
}

/// Splice the external behavioral-analysis signal into the prompt context.
/// The analyzer itself lives outside this service; its record is consumed
/// read-only.
pub(crate) fn observer_note(session: &GameSession, user_id: &str) -> String {
    let Some(analysis) = session.analysis.get(user_id) else {
        return String::new();
    };
    if analysis
        .get("truth_mismatch_detected")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        let commentary = analysis
            .get("fun_commentary")
            .and_then(Value::as_str)
            .unwrap_or("");
        format!("\n[SHADOW OBSERVER: {commentary}]")
    } else {
        String::new()
    }
}
