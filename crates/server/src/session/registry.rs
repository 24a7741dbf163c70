use std::{collections::HashMap, sync::Arc};

use gamehub_common::types::{Game, GameId};
use tokio::sync::RwLock;
use tracing::info;

use super::GameSession;
use crate::metrics;

/// Process-wide map of live game sessions. Sessions are created on first
/// use and kept for the lifetime of the process.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GameId, Arc<GameSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `game`, creating it if none exists. Concurrent
    /// callers for the same game id all receive the same session.
    pub async fn get_or_create(&self, game: &Game) -> Arc<GameSession> {
        if let Some(session) = self.sessions.read().await.get(&game.id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let mut created = false;
        let session = sessions
            .entry(game.id)
            .or_insert_with(|| {
                created = true;
                Arc::new(GameSession::new(game.clone()))
            })
            .clone();
        drop(sessions);

        if created {
            metrics::increment_game_sessions();
            info!(game_id = %game.id, "game session created");
        }

        session
    }

    pub async fn get(&self, game_id: GameId) -> Option<Arc<GameSession>> {
        self.sessions.read().await.get(&game_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
