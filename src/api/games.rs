//! Per-game routes. Every game shares the same four endpoints; the slug in
//! the path picks the controller behavior.

use super::AppState;
use crate::error::ApiError;
use crate::games::{ActionInput, StartOptions};
use crate::session::GameSession;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

fn session_response(session: GameSession) -> Json<Value> {
    Json(json!({
        "ok": true,
        "session_id": session.session_id,
        "room_code": session.room_code,
        "status": session.status,
        "state": session.state,
        "players": session.players,
        "history": session.history,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StartBody {
    pub user_id: String,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default = "default_true")]
    pub ai_enabled: bool,
}

fn default_true() -> bool {
    true
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(body): Json<StartBody>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .controller
        .start(
            &slug,
            StartOptions {
                user_id: body.user_id,
                theme: body.theme,
                ai_enabled: body.ai_enabled,
            },
        )
        .await?;
    Ok(session_response(session))
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

pub async fn join(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(body): Json<JoinBody>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .controller
        .join(&slug, &body.session_id, &body.user_id, body.role)
        .await?;
    Ok(session_response(session))
}

#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub session_id: String,
    pub user_id: String,
    #[serde(default = "default_action")]
    pub action: String,
    pub content: String,
}

fn default_action() -> String {
    "action".to_string()
}

pub async fn action(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(body): Json<ActionBody>,
) -> Result<Json<Value>, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".into()));
    }
    let session = state
        .controller
        .action(
            &slug,
            ActionInput {
                session_id: body.session_id,
                user_id: body.user_id,
                action: body.action,
                content: body.content,
            },
        )
        .await?;
    Ok(session_response(session))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path((slug, session_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    if !state.controller.has_game(&slug) {
        return Err(ApiError::NotFound(format!("unknown game: {slug}")));
    }
    let session = state.controller.status(&session_id).await?;
    Ok(session_response(session))
}
