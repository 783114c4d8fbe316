//! AI Adventure Dungeon: free-for-all crawl with hp/gold gauges and an
//! inventory the model mutates through `item+X` / `item-X` tokens.

use super::delta::{GaugeSpec, ListSpec, StateSchema};
use super::{ActionInput, Game, StartOptions};
use crate::session::GameSession;
use serde_json::{json, Map, Value};

const SCHEMA: StateSchema = StateSchema {
    gauges: &[
        GaugeSpec { tag: "hp", field: "hp", max: Some(100) },
        GaugeSpec { tag: "gold", field: "gold", max: None },
    ],
    lists: &[ListSpec { tag: "item", field: "inventory" }],
    assigns: &[],
};

pub struct AdventureDungeon;

impl Game for AdventureDungeon {
    fn slug(&self) -> &'static str {
        "ai-adventure-dungeon"
    }

    fn name(&self) -> &'static str {
        "AI Adventure Dungeon"
    }

    fn system_prompt(&self) -> &'static str {
        "You are the Dungeon Master of a perilous, atmospheric dungeon crawl. \
         Narrate outcomes in second person, two to four sentences, vivid but terse. \
         Reward clever play and punish recklessness."
    }

    fn schema(&self) -> &'static StateSchema {
        &SCHEMA
    }

    fn opening_max_tokens(&self) -> u32 {
        200
    }

    fn action_max_tokens(&self) -> u32 {
        400
    }

    fn player_role(&self) -> &'static str {
        "Adventurer"
    }

    fn opening_fallback(&self) -> &'static str {
        "You enter a dimly-lit cavern; the air smells of damp stone."
    }

    fn action_fallback(&self, input: &ActionInput) -> String {
        format!("You move forward. {} happens.", input.content)
    }

    fn opening_prompt(&self, opts: &StartOptions) -> String {
        let theme = opts.theme.as_deref().unwrap_or("FANTASY_RUINS");
        format!(
            "Generate an opening dungeon scene for theme {theme} in 2-3 sentences. \
             Establish the atmosphere."
        )
    }

    fn initial_state(&self, opts: &StartOptions, opening: &str) -> Map<String, Value> {
        let theme = opts.theme.as_deref().unwrap_or("FANTASY_RUINS");
        let mut state = Map::new();
        state.insert("scene".into(), json!(opening));
        state.insert("narrative".into(), json!(opening));
        state.insert("theme".into(), json!(theme));
        state.insert("floor".into(), json!(1));
        state.insert("hp".into(), json!(100));
        state.insert("inventory".into(), json!(["Rusted Sword", "Torch", "2x Bread"]));
        state.insert("gold".into(), json!(10));
        state.insert("turn".into(), json!(1));
        state.insert("status".into(), json!("active"));
        state
    }

    fn action_prompt(
        &self,
        session: &GameSession,
        input: &ActionInput,
        observer_note: &str,
    ) -> String {
        // Last 5 exchanges give the model continuity without unbounded context
        let history_context = session
            .history
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(|h| {
                format!(
                    "P: {}\nDM: {}",
                    h.content,
                    h.result.as_deref().unwrap_or("")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{history_context}\n\
             Current Stats: HP={}, Gold={}, Inventory={}\n\
             Player action: {}{observer_note}\n\n\
             Narrate the outcome. If they found an item, lost HP, or gained gold, \
             include a metadata tag like [UPDATE: hp-10, gold+5, item+Shield].",
            session.state_i64("hp", 100),
            session.state_i64("gold", 0),
            Value::Array(session.state_array("inventory")),
            input.content,
        )
    }

    // The dungeon master speaks plain prose, not JSON
    fn turn_from_response(&self, _session: &GameSession, raw: &str) -> Value {
        json!({ "narrative": raw })
    }

    fn fallback_turn(&self, _session: &GameSession) -> Value {
        json!({ "narrative": "You press on into the dark." })
    }

    fn apply_turn(
        &self,
        session: &GameSession,
        input: &ActionInput,
        display: &str,
        _turn: &Value,
        changed: &mut Map<String, Value>,
    ) {
        changed.insert("scene".into(), json!(display));
        changed.insert("narrative".into(), json!(display));
        changed.insert("last_action".into(), json!(input.content));
        changed.insert("last_actor".into(), json!(input.user_id));
        let _ = session;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::HistoryEntry;

    #[test]
    fn test_action_prompt_includes_stats_and_recent_history() {
        let game = AdventureDungeon;
        let opts = StartOptions {
            user_id: "u1".into(),
            theme: Some("SUNKEN_CRYPT".into()),
            ai_enabled: true,
        };
        let state = game.initial_state(&opts, "A crypt yawns open.");
        let mut session = GameSession::new(game.slug(), "u1", "CODE42", 5, state);
        for i in 0..7 {
            session.history.push(
                HistoryEntry::new("u1", "action", format!("move {i}"))
                    .with_result(format!("outcome {i}")),
            );
        }

        let input = ActionInput {
            session_id: session.session_id.clone(),
            user_id: "u1".into(),
            action: "action".into(),
            content: "open the sarcophagus".into(),
        };
        let prompt = game.action_prompt(&session, &input, "");

        assert!(prompt.contains("HP=100"));
        assert!(prompt.contains("open the sarcophagus"));
        assert!(prompt.contains("[UPDATE:"));
        // Only the last five exchanges survive
        assert!(!prompt.contains("move 1"));
        assert!(prompt.contains("move 6"));
    }

    #[test]
    fn test_plain_text_response_becomes_narrative() {
        let game = AdventureDungeon;
        let session = GameSession::new(game.slug(), "u1", "CODE42", 5, Map::new());
        let turn = game.turn_from_response(&session, "The lid grinds open. [UPDATE: gold+5]");
        assert_eq!(
            turn["narrative"].as_str().unwrap(),
            "The lid grinds open. [UPDATE: gold+5]"
        );
    }
}
