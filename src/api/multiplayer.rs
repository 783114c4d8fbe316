//! Game-agnostic multiplayer lobby: create/join by room code, readiness,
//! lobby chat, and the host-gated transition into play.

use super::AppState;
use crate::error::ApiError;
use crate::session::{GameSession, PlayerRecord, SessionStatus};
use axum::extract::{Path, Query, State};
use axum::Json;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

fn session_response(session: GameSession) -> Json<Value> {
    Json(json!({ "ok": true, "session": session }))
}

/// Anonymous clients get a stable-for-the-session guest identity.
fn guest_id() -> String {
    format!("guest_{:08x}", rand::rng().random::<u32>())
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub game_slug: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub max_players: Option<u32>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub ai_enabled: Option<bool>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBody>,
) -> Result<Json<Value>, ApiError> {
    if state.registry.get(&body.game_slug).is_none() && !state.controller.has_game(&body.game_slug)
    {
        return Err(ApiError::NotFound(format!(
            "unknown game: {}",
            body.game_slug
        )));
    }

    let user_id = body.user_id.unwrap_or_else(guest_id);
    let name = body.name.clone().unwrap_or_else(|| user_id.clone());

    let mut initial = serde_json::Map::new();
    if let Some(group_id) = &body.group_id {
        initial.insert("group_id".into(), json!(group_id));
    }
    if let Some(theme) = &body.theme {
        initial.insert("theme".into(), json!(theme));
    }
    if let Some(ai_enabled) = body.ai_enabled {
        initial.insert("ai_enabled".into(), json!(ai_enabled));
    }

    let session = state
        .manager
        .create_session(&body.game_slug, &user_id, body.max_players, Some(initial))
        .await?;
    let session = state
        .manager
        .join_session(
            &session.session_id,
            &user_id,
            PlayerRecord::new(name, "Host").with_persona("The Architect"),
        )
        .await?;

    Ok(Json(json!({
        "ok": true,
        "user_id": user_id,
        "room_code": session.room_code,
        "session": session,
    })))
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
    pub room_code: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn join(
    State(state): State<Arc<AppState>>,
    Json(body): Json<JoinBody>,
) -> Result<Json<Value>, ApiError> {
    let session = state.manager.get_session(&body.room_code).await?;
    if session.status != SessionStatus::Lobby {
        return Err(ApiError::BadRequest("game already started".into()));
    }
    if session.players.len() as u32 >= session.max_players {
        return Err(ApiError::BadRequest("session is full".into()));
    }

    let user_id = body.user_id.unwrap_or_else(guest_id);
    let name = body.name.clone().unwrap_or_else(|| user_id.clone());
    let session = state
        .manager
        .join_session(
            &session.session_id,
            &user_id,
            PlayerRecord::new(name, "Player").with_persona("The Voyager"),
        )
        .await?;

    Ok(Json(json!({
        "ok": true,
        "user_id": user_id,
        "session": session,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ReadyBody {
    pub session_id: String,
    pub user_id: String,
    pub is_ready: bool,
    #[serde(default)]
    pub truth_analysis_enabled: Option<bool>,
    #[serde(default)]
    pub persona: Option<String>,
}

pub async fn ready(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReadyBody>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .manager
        .update_player_status(
            &body.session_id,
            &body.user_id,
            body.is_ready,
            body.truth_analysis_enabled,
            body.persona,
        )
        .await?;
    Ok(session_response(session))
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub session_id: String,
    pub user_id: String,
    pub message: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<Json<Value>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    let session = state
        .manager
        .append_chat(
            &body.session_id,
            json!({
                "user_id": body.user_id,
                "message": body.message,
                "ts": chrono::Utc::now().to_rfc3339(),
            }),
        )
        .await?;
    Ok(session_response(session))
}

#[derive(Debug, Deserialize)]
pub struct StartBody {
    pub user_id: String,
}

/// Host-gated transition from lobby to play. The host may start alone;
/// games handle a roster of one.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<StartBody>,
) -> Result<Json<Value>, ApiError> {
    let session = state.manager.get_session(&session_id).await?;
    if session.host_user_id != body.user_id {
        return Err(ApiError::Forbidden("only the host can start the game".into()));
    }
    if session.status != SessionStatus::Lobby {
        return Err(ApiError::BadRequest("game already started".into()));
    }
    if session.players.is_empty() {
        return Err(ApiError::BadRequest("no players have joined".into()));
    }

    let session = state.controller.activate(&session.session_id).await?;
    Ok(session_response(session))
}

pub async fn session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state.manager.get_session(&session_id).await?;
    let group_id = session
        .state_str("group_id")
        .unwrap_or(&session.session_id)
        .to_string();
    Ok(Json(json!({
        "ok": true,
        "group_id": group_id,
        "session": session,
    })))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "ok": true, "games": state.registry.listings() }))
}

#[derive(Debug, Deserialize)]
pub struct MyGamesQuery {
    pub user_id: String,
}

pub async fn my_games(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MyGamesQuery>,
) -> Result<Json<Value>, ApiError> {
    let sessions = state.manager.sessions_for_user(&query.user_id).await?;
    Ok(Json(json!({ "ok": true, "sessions": sessions })))
}
