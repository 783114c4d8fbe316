//! Truth & Layer: introspective question game where honesty moves the
//! integrity and vulnerability gauges and unlocks deeper layers.

use super::delta::{GaugeSpec, StateSchema};
use super::{ActionInput, Game, StartOptions};
use crate::session::GameSession;
use serde_json::{json, Map, Value};

const SCHEMA: StateSchema = StateSchema {
    gauges: &[
        GaugeSpec { tag: "integrity", field: "integrity", max: Some(100) },
        GaugeSpec { tag: "vulnerability", field: "vulnerability", max: Some(100) },
        GaugeSpec { tag: "layer", field: "layer", max: None },
    ],
    lists: &[],
    assigns: &[],
};

pub struct TruthAndLayer;

impl Game for TruthAndLayer {
    fn slug(&self) -> &'static str {
        "elinity-truth-and-layer"
    }

    fn name(&self) -> &'static str {
        "Truth & Layer"
    }

    fn system_prompt(&self) -> &'static str {
        "You are the Keeper of Layers, guiding seekers through levels of honesty. \
         Always answer with a single JSON object holding 'question' (the next \
         question to pose), 'layer' (the current depth) and 'reflection' (your \
         reading of their answer). Be gentle but unflinching."
    }

    fn schema(&self) -> &'static StateSchema {
        &SCHEMA
    }

    fn player_role(&self) -> &'static str {
        "Seeker"
    }

    fn narrative_field(&self) -> &'static str {
        "reflection"
    }

    fn action_max_tokens(&self) -> u32 {
        500
    }

    fn opening_fallback(&self) -> &'static str {
        "What mask do you wear most often?"
    }

    fn action_fallback(&self, _input: &ActionInput) -> String {
        json!({
            "question": "Let us go deeper.",
            "reflection": "Your silence speaks volumes."
        })
        .to_string()
    }

    fn opening_prompt(&self, _opts: &StartOptions) -> String {
        "Start Level 1: Surface. Pose an introductory philosophical question. [FORMAT: JSON]"
            .to_string()
    }

    fn initial_state(&self, opts: &StartOptions, opening: &str) -> Map<String, Value> {
        let mut state = Map::new();
        state.insert("layer".into(), json!(1));
        state.insert("integrity".into(), json!(100));
        state.insert("vulnerability".into(), json!(10));
        state.insert("turn".into(), json!(1));
        state.insert("current_question".into(), json!(opening));
        state.insert("ai_enabled".into(), json!(opts.ai_enabled));
        state.insert(
            "last_ai_response".into(),
            json!({"question": opening, "layer": 1, "reflection": "The journey begins."}),
        );
        state
    }

    fn action_prompt(
        &self,
        session: &GameSession,
        input: &ActionInput,
        observer_note: &str,
    ) -> String {
        format!(
            "Current Level: {}\n\
             Integrity: {}\n\
             Vulnerability: {}\n\
             Question: {}\n\
             Answer: {}{observer_note}\n\n\
             Evaluate the truth. Respond in JSON. \
             Include [UPDATE: integrity-X, vulnerability+X, layer+1] in the 'reflection' \
             field if they were honest.",
            session.state_i64("layer", 1),
            session.state_i64("integrity", 100),
            session.state_i64("vulnerability", 10),
            session.state_str("current_question").unwrap_or(""),
            input.content,
        )
    }

    fn fallback_turn(&self, session: &GameSession) -> Value {
        json!({
            "question": "Let us go deeper.",
            "layer": session.state_i64("layer", 1) + 1,
            "reflection": "Your silence speaks volumes."
        })
    }

    fn apply_turn(
        &self,
        _session: &GameSession,
        _input: &ActionInput,
        display: &str,
        turn: &Value,
        changed: &mut Map<String, Value>,
    ) {
        if let Some(question) = turn.get("question") {
            changed.insert("current_question".into(), question.clone());
        }
        let mut last = turn.clone();
        if let Some(obj) = last.as_object_mut() {
            obj.insert("reflection".into(), json!(display));
        }
        changed.insert("last_ai_response".into(), last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_at_layer(layer: i64) -> GameSession {
        let game = TruthAndLayer;
        let opts = StartOptions {
            user_id: "u1".into(),
            theme: None,
            ai_enabled: true,
        };
        let mut state = game.initial_state(&opts, "What mask do you wear?");
        state.insert("layer".into(), json!(layer));
        GameSession::new(game.slug(), "u1", "TRUT01", 5, state)
    }

    #[test]
    fn test_reflection_carries_the_delta_tag() {
        let game = TruthAndLayer;
        let session = session_at_layer(1);
        let turn = game.turn_from_response(
            &session,
            r#"{"question": "Who hurt you?", "layer": 2,
                "reflection": "That rang true. [UPDATE: integrity-5, vulnerability+15, layer+1]"}"#,
        );
        let reflection = turn[game.narrative_field()].as_str().unwrap();
        let (display, ops) = game.schema().parse(reflection);
        assert_eq!(display, "That rang true.");
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn test_fallback_turn_advances_the_layer() {
        let game = TruthAndLayer;
        let session = session_at_layer(3);
        let turn = game.turn_from_response(&session, "I refuse to answer in JSON.");
        assert_eq!(turn["layer"], json!(4));
        assert_eq!(turn["reflection"], json!("Your silence speaks volumes."));
    }

    #[test]
    fn test_apply_turn_rotates_question() {
        let game = TruthAndLayer;
        let opts = StartOptions {
            user_id: "u1".into(),
            theme: None,
            ai_enabled: true,
        };
        let state = game.initial_state(&opts, "What mask do you wear?");
        let session = GameSession::new(game.slug(), "u1", "TRUT01", 5, state);
        let input = ActionInput {
            session_id: session.session_id.clone(),
            user_id: "u1".into(),
            action: "answer".into(),
            content: "The capable one.".into(),
        };
        let turn = json!({"question": "And underneath?", "reflection": "raw"});
        let mut changed = Map::new();

        game.apply_turn(&session, &input, "A familiar mask.", &turn, &mut changed);

        assert_eq!(changed["current_question"], json!("And underneath?"));
        assert_eq!(changed["last_ai_response"]["reflection"], json!("A familiar mask."));
    }
}
