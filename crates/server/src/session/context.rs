use gamehub_common::{
    protocol::ws::ServerMessage,
    types::{GameId, UserId},
};

use super::{ConnectionId, LiveGame};

/// Outbound side effects requested by game logic for a single command.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Delivery {
    Reply(ServerMessage),
    ToUser(UserId, ServerMessage),
    Broadcast(ServerMessage),
    BroadcastOthers(ServerMessage),
}

/// Handed to game logic for the duration of one command. Grants exclusive
/// access to the live game and collects the frames to deliver once the
/// logic returns.
pub struct CommandContext<'a> {
    game: &'a mut LiveGame,
    origin: ConnectionId,
    outbox: Vec<Delivery>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(game: &'a mut LiveGame, origin: ConnectionId) -> Self {
        Self { game, origin, outbox: Vec::new() }
    }

    pub fn game_id(&self) -> GameId {
        self.game.game.id
    }

    pub fn game(&self) -> &LiveGame {
        self.game
    }

    pub fn game_mut(&mut self) -> &mut LiveGame {
        self.game
    }

    pub fn origin(&self) -> ConnectionId {
        self.origin
    }

    /// Send to the connection the command came from.
    pub fn reply(&mut self, message: ServerMessage) {
        self.outbox.push(Delivery::Reply(message));
    }

    /// Send to every connection bound to `user_id` in this game.
    pub fn send_to_user(&mut self, user_id: UserId, message: ServerMessage) {
        self.outbox.push(Delivery::ToUser(user_id, message));
    }

    pub fn broadcast(&mut self, message: ServerMessage) {
        self.outbox.push(Delivery::Broadcast(message));
    }

    /// Broadcast to every connection except the origin.
    pub fn broadcast_others(&mut self, message: ServerMessage) {
        self.outbox.push(Delivery::BroadcastOthers(message));
    }

    pub(crate) fn into_outbox(self) -> Vec<Delivery> {
        self.outbox
    }
}
