//! The Story Weaver: turn-ordered collaborative storytelling with a world
//! karma gauge and a character arc the model can rename via `arc=Name`.

use super::delta::{AssignSpec, GaugeSpec, StateSchema};
use super::{ActionInput, Game, StartOptions};
use crate::session::GameSession;
use serde_json::{json, Map, Value};

const SCHEMA: StateSchema = StateSchema {
    gauges: &[GaugeSpec { tag: "karma", field: "karma", max: Some(100) }],
    lists: &[],
    assigns: &[AssignSpec { tag: "arc", field: "character_arc" }],
};

pub struct StoryWeaver;

impl Game for StoryWeaver {
    fn slug(&self) -> &'static str {
        "elinity-the-story-weaver"
    }

    fn name(&self) -> &'static str {
        "The Story Weaver"
    }

    fn system_prompt(&self) -> &'static str {
        "You are the Loom, narrator of a collaborative tale woven one contribution \
         at a time. Always answer with a single JSON object holding 'narrative' \
         (the next passage) and 'phase' (usually 'contribution'). Honor every \
         player's contribution and keep the tale coherent."
    }

    fn schema(&self) -> &'static StateSchema {
        &SCHEMA
    }

    fn enforce_turns(&self) -> bool {
        true
    }

    fn player_role(&self) -> &'static str {
        "Weaver"
    }

    fn observer_trailer(&self) -> &'static str {
        " - The Weaver's contribution contradicts their internal truth. \
         Weave this contradiction into the narrative arc."
    }

    fn opening_max_tokens(&self) -> u32 {
        400
    }

    fn action_max_tokens(&self) -> u32 {
        600
    }

    fn opening_fallback(&self) -> &'static str {
        "The story begins in a quiet corner of an unwritten world..."
    }

    fn action_fallback(&self, _input: &ActionInput) -> String {
        json!({"narrative": "The story continues...", "phase": "contribution"}).to_string()
    }

    fn opening_prompt(&self, opts: &StartOptions) -> String {
        let genre = opts.theme.as_deref().unwrap_or("Fantasy");
        format!("Genre: {genre}. Generate the first page of the book. [FORMAT: JSON]")
    }

    fn initial_state(&self, opts: &StartOptions, opening: &str) -> Map<String, Value> {
        let genre = opts.theme.as_deref().unwrap_or("Fantasy");
        let mut state = Map::new();
        state.insert("story_text".into(), json!([opening]));
        state.insert("genre".into(), json!(genre));
        state.insert("turn".into(), json!(1));
        state.insert("chapter".into(), json!(1));
        // 0 is dark, 100 is light
        state.insert("karma".into(), json!(50));
        state.insert("character_arc".into(), json!("Neutral"));
        state.insert("phase".into(), json!("contribution"));
        state.insert("ai_enabled".into(), json!(opts.ai_enabled));
        state.insert(
            "last_ai_response".into(),
            json!({"narrative": opening, "phase": "contribution"}),
        );
        state.insert("player_order".into(), json!([opts.user_id]));
        state.insert("turn_index".into(), json!(0));
        state
    }

    fn action_prompt(
        &self,
        session: &GameSession,
        input: &ActionInput,
        observer_note: &str,
    ) -> String {
        let story = session.state_array("story_text");
        let history_str = story
            .iter()
            .rev()
            .take(5)
            .rev()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Current World Karma: {}\n\
             Current Arc: {}\n\
             Story History: {history_str}\n\n\
             New Contribution: {}{observer_note}\n\n\
             Continue the tale. Return VALID JSON. \
             Include [UPDATE: karma+X, arc=Name] in the 'narrative' field if the story shifts.",
            session.state_i64("karma", 50),
            session.state_str("character_arc").unwrap_or("Neutral"),
            input.content,
        )
    }

    fn fallback_turn(&self, _session: &GameSession) -> Value {
        json!({"narrative": "The story continues...", "phase": "contribution"})
    }

    fn apply_turn(
        &self,
        session: &GameSession,
        input: &ActionInput,
        display: &str,
        turn: &Value,
        changed: &mut Map<String, Value>,
    ) {
        let mut story = session.state_array("story_text");
        story.push(json!(input.content));
        if !display.is_empty() {
            story.push(json!(display));
        }
        changed.insert("story_text".into(), Value::Array(story));

        let mut last = turn.clone();
        if let Some(obj) = last.as_object_mut() {
            obj.insert("narrative".into(), json!(display));
        }
        changed.insert("last_ai_response".into(), last);

        // One chapter every five turns
        let turn_no = session.state_i64("turn", 0);
        changed.insert("chapter".into(), json!(turn_no / 5 + 1));
        changed.insert(
            "phase".into(),
            turn.get("phase").cloned().unwrap_or(json!("contribution")),
        );
    }
}
