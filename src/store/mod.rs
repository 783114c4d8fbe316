mod memory;

pub use memory::MemoryStore;

use crate::session::GameSession;
use async_trait::async_trait;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by session storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("version conflict while saving session {0}")]
    Conflict(String),

    #[error("room code already in use: {0}")]
    RoomCodeTaken(String),
}

/// Durable home for [`GameSession`] records.
///
/// `save` performs an optimistic-concurrency check: the caller's `version`
/// must match the stored row, otherwise the write is rejected with
/// [`StoreError::Conflict`] and the caller re-reads and re-applies.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a freshly created session. Fails if the room code collides.
    async fn insert(&self, session: GameSession) -> StoreResult<GameSession>;

    async fn by_session_id(&self, session_id: &str) -> StoreResult<GameSession>;

    /// Room codes are stored uppercase; callers normalize before lookup.
    async fn by_room_code(&self, room_code: &str) -> StoreResult<GameSession>;

    /// Versioned write. On success the returned session carries the bumped
    /// version and a refreshed `updated_at`.
    async fn save(&self, session: GameSession) -> StoreResult<GameSession>;

    /// Most recent lobby/active sessions, newest first.
    async fn recent_open(&self, limit: usize) -> StoreResult<Vec<GameSession>>;
}
