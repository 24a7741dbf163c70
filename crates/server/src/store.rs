// Storage collaborator: games and users.
//
// The session manager only depends on the `GameStore` contract. The binary
// runs against `MemoryGameStore`; a database-backed store plugs in behind the
// same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use gamehub_common::types::{Game, GameId, User, UserId};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

const MAX_USERNAME_CHARS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("username must be between 1 and 64 characters")]
    InvalidUsername,

    #[error("username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("user {0} does not exist")]
    UnknownUser(UserId),
}

#[async_trait]
pub trait GameStore: Send + Sync {
    async fn create_user(&self, username: &str) -> Result<User, StoreError>;

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn create_game(&self, creator: &User, settings: Value) -> Result<Game, StoreError>;

    /// Returns the game only while it is still live.
    async fn get_live_game(&self, id: GameId) -> Result<Option<Game>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryGameStore {
    inner: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    games: HashMap<GameId, Game>,
    last_user_id: i64,
    last_game_id: i64,
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn create_user(&self, username: &str) -> Result<User, StoreError> {
        let username = username.trim();
        let length = username.chars().count();
        if length == 0 || length > MAX_USERNAME_CHARS {
            return Err(StoreError::InvalidUsername);
        }

        let mut state = self.inner.write().await;
        if state.users.values().any(|user| user.username.eq_ignore_ascii_case(username)) {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }

        state.last_user_id += 1;
        let user = User { id: UserId(state.last_user_id), username: username.to_string() };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create_game(&self, creator: &User, settings: Value) -> Result<Game, StoreError> {
        let mut state = self.inner.write().await;
        if !state.users.contains_key(&creator.id) {
            return Err(StoreError::UnknownUser(creator.id));
        }

        state.last_game_id += 1;
        let game = Game {
            id: GameId(state.last_game_id),
            creator_id: creator.id,
            settings,
            created_at: Utc::now(),
            concluded_at: None,
        };
        state.games.insert(game.id, game.clone());
        Ok(game)
    }

    async fn get_live_game(&self, id: GameId) -> Result<Option<Game>, StoreError> {
        Ok(self.inner.read().await.games.get(&id).filter(|game| game.is_live()).cloned())
    }
}

impl MemoryGameStore {
    #[cfg(test)]
    pub(crate) async fn conclude_for_tests(&self, id: GameId) {
        if let Some(game) = self.inner.write().await.games.get_mut(&id) {
            game.concluded_at = Some(Utc::now());
        }
    }
}
