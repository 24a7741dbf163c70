// Session manager core: registry of live game sessions, the per-connection
// authentication handshake and command dispatch into game logic.

mod context;
mod game_session;
mod handshake;
mod registry;

pub use context::CommandContext;
pub use game_session::{Connection, ConnectionId, DispatchOutcome, GameSession, LiveGame};
pub use handshake::{CloseReason, Handshake, HandshakeState, HandshakeStep};
pub use registry::SessionRegistry;
