use std::{collections::HashMap, fmt};

use gamehub_common::{
    protocol::ws::{Command, ServerMessage},
    types::{Game, GameId, User},
};
use serde_json::{json, Value};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex, RwLock,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::{CommandContext, Delivery};
use crate::logic::GameLogic;
use crate::metrics::{self, ChannelEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An authenticated channel bound to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub user: User,
}

impl Connection {
    pub fn new(id: ConnectionId, user: User) -> Self {
        Self { id, user }
    }
}

/// The live state of one game, mutated only by game logic under the
/// session's game lock.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveGame {
    pub game: Game,
    pub state: Value,
    last_seq: u64,
}

impl LiveGame {
    fn new(game: Game) -> Self {
        Self { game, state: json!({ "moves": [] }), last_seq: 0 }
    }

    /// Monotonic per-game sequence number for relayed frames.
    pub fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }
}

struct Member {
    connection: Connection,
    outbound: mpsc::Sender<ServerMessage>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Frames queued across all recipients.
    pub delivered: usize,
    /// Connections detached because their outbound queue was full.
    pub evicted: Vec<ConnectionId>,
}

/// Per-game session: live game state plus the set of authenticated
/// connections attached to it.
///
/// Lock order is game, then connections. Deliveries happen while the game
/// lock is held so every connection observes one session's frames in the
/// same order.
pub struct GameSession {
    game_id: GameId,
    game: Mutex<LiveGame>,
    connections: RwLock<HashMap<ConnectionId, Member>>,
}

impl GameSession {
    pub(crate) fn new(game: Game) -> Self {
        Self {
            game_id: game.id,
            game: Mutex::new(LiveGame::new(game)),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Register an authenticated connection. Frames for it are pushed into
    /// `outbound`; the session holds the only sender, so detaching closes the
    /// receiving side.
    pub async fn attach(&self, connection: Connection, outbound: mpsc::Sender<ServerMessage>) {
        let connection_id = connection.id;
        let user_id = connection.user.id;
        let previous =
            self.connections.write().await.insert(connection_id, Member { connection, outbound });

        if previous.is_none() {
            metrics::adjust_active_connections(1);
        }
        info!(
            game_id = %self.game_id,
            connection_id = %connection_id,
            user_id = %user_id,
            "connection attached"
        );
    }

    /// Remove a connection. Idempotent; returns whether it was attached.
    pub async fn detach(&self, connection_id: ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(&connection_id);
        let Some(member) = removed else {
            return false;
        };

        metrics::adjust_active_connections(-1);
        info!(
            game_id = %self.game_id,
            connection_id = %connection_id,
            user_id = %member.connection.user.id,
            "connection detached"
        );
        true
    }

    pub async fn contains(&self, connection_id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&connection_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connections(&self) -> Vec<Connection> {
        self.connections.read().await.values().map(|member| member.connection.clone()).collect()
    }

    pub async fn snapshot(&self) -> LiveGame {
        self.game.lock().await.clone()
    }

    /// Run one command through game logic and deliver what it produced.
    ///
    /// Returns `None` when `origin` is not attached, which happens once it
    /// was evicted or detached; such commands never reach game logic.
    pub async fn dispatch(
        &self,
        logic: &dyn GameLogic,
        command: Command,
        origin: &Connection,
    ) -> Option<DispatchOutcome> {
        let mut game = self.game.lock().await;
        if !self.contains(origin.id).await {
            return None;
        }

        let mut context = CommandContext::new(&mut *game, origin.id);
        logic.handle_command(command, origin, &mut context);
        let outbox = context.into_outbox();

        let mut outcome = DispatchOutcome::default();
        {
            let connections = self.connections.read().await;
            for delivery in outbox {
                let (recipients, message): (Vec<&Member>, ServerMessage) = match delivery {
                    Delivery::Reply(message) => {
                        (connections.get(&origin.id).into_iter().collect(), message)
                    }
                    Delivery::ToUser(user_id, message) => (
                        connections
                            .values()
                            .filter(|member| member.connection.user.id == user_id)
                            .collect(),
                        message,
                    ),
                    Delivery::Broadcast(message) => (connections.values().collect(), message),
                    Delivery::BroadcastOthers(message) => (
                        connections
                            .values()
                            .filter(|member| member.connection.id != origin.id)
                            .collect(),
                        message,
                    ),
                };

                for member in recipients {
                    if outcome.evicted.contains(&member.connection.id) {
                        continue;
                    }
                    match member.outbound.try_send(message.clone()) {
                        Ok(()) => outcome.delivered += 1,
                        Err(TrySendError::Full(_)) => {
                            outcome.evicted.push(member.connection.id);
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!(
                                game_id = %self.game_id,
                                connection_id = %member.connection.id,
                                "dropping frame for a connection that is shutting down"
                            );
                        }
                    }
                }
            }
        }

        for connection_id in &outcome.evicted {
            if self.detach(*connection_id).await {
                metrics::record_channel_event(ChannelEvent::SlowConsumerEvicted);
                warn!(
                    game_id = %self.game_id,
                    connection_id = %connection_id,
                    "outbound queue full, evicting slow connection"
                );
            }
        }

        drop(game);
        Some(outcome)
    }
}
