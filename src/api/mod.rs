//! HTTP surface: the per-game routes and the game-agnostic multiplayer
//! lobby routes, assembled into one router over a shared [`AppState`].

mod games;
mod multiplayer;

use crate::games::GameController;
use crate::manager::GameManager;
use crate::registry::GameRegistry;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub struct AppState {
    pub manager: GameManager,
    pub controller: GameController,
    pub registry: GameRegistry,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/games/multiplayer/create", post(multiplayer::create))
        .route("/games/multiplayer/join", post(multiplayer::join))
        .route("/games/multiplayer/ready", post(multiplayer::ready))
        .route("/games/multiplayer/chat", post(multiplayer::chat))
        .route(
            "/games/multiplayer/start/{session_id}",
            post(multiplayer::start),
        )
        .route(
            "/games/multiplayer/session/{session_id}",
            get(multiplayer::session),
        )
        .route("/games/multiplayer/list", get(multiplayer::list))
        .route("/games/multiplayer/my-games", get(multiplayer::my_games))
        .route("/games/{slug}/start", post(games::start))
        .route("/games/{slug}/join", post(games::join))
        .route("/games/{slug}/action", post(games::action))
        .route("/games/{slug}/status/{session_id}", get(games::status))
        .with_state(state)
}
