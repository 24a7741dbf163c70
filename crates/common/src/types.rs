// Core domain types shared by the server and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a persisted game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub i64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An identity resolved from a credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// A persisted game. `settings` is owned by the rule engine and opaque here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: GameId,
    pub creator_id: UserId,
    #[serde(default)]
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concluded_at: Option<DateTime<Utc>>,
}

impl Game {
    /// A game accepts real-time connections until it has concluded.
    pub fn is_live(&self) -> bool {
        self.concluded_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{Game, GameId, UserId};
    use chrono::Utc;

    #[test]
    fn ids_serialize_as_bare_integers() {
        assert_eq!(serde_json::to_string(&GameId(5)).expect("game id should encode"), "5");
        assert_eq!(
            serde_json::from_str::<UserId>("42").expect("user id should decode"),
            UserId(42)
        );
    }

    #[test]
    fn concluded_games_are_not_live() {
        let mut game = Game {
            id: GameId(1),
            creator_id: UserId(1),
            settings: serde_json::json!({ "time_format": "05:00" }),
            created_at: Utc::now(),
            concluded_at: None,
        };
        assert!(game.is_live());

        game.concluded_at = Some(Utc::now());
        assert!(!game.is_live());
    }
}
