// Frames exchanged over the per-game real-time channel.
//
// The handshake is plain text in both directions: the client sends its bearer
// credential, the server answers a failed attempt with `REJECTION_NOTICE`.
// Everything after a successful handshake is JSON.

use crate::types::{GameId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Plain text frame sent back for every credential that does not resolve to a user.
pub const REJECTION_NOTICE: &str = "Invalid credentials";

/// Error code carried by the `error` frame sent before closing on a malformed command.
pub const INVALID_COMMAND_CODE: &str = "INVALID_COMMAND";

/// A structured client command. The only structural requirement is that the
/// frame is a JSON object; its meaning belongs to the game logic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(Map<String, Value>);

impl Command {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The conventional `type` discriminator, when the client supplied one.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Server -> client frames sent after the handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once, immediately after the credential was accepted.
    Authenticated { game_id: GameId, user_id: UserId, username: String },

    /// A command relayed to the game's connections, attributed to its sender.
    Command { game_id: GameId, seq: u64, from_user_id: UserId, command: Command },

    /// The current live state of the game.
    GameState { game_id: GameId, state: Value },

    /// Error notice. Sent before the server closes the channel.
    Error { code: String, message: String },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("command frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("command frame must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("command frames must be text")]
    BinaryFrame,
}

/// Decode one inbound command frame.
pub fn decode_command(raw: &str) -> Result<Command, ProtocolError> {
    match serde_json::from_str::<Value>(raw).map_err(ProtocolError::InvalidJson)? {
        Value::Object(fields) => Ok(Command(fields)),
        other => Err(ProtocolError::NotAnObject(json_type_name(&other))),
    }
}

pub fn encode_message(message: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_command, ProtocolError};

    #[test]
    fn decodes_objects_and_exposes_kind() {
        let command = decode_command(r#"{"type":"move","from":"e2","to":"e4"}"#)
            .expect("object frame should decode");

        assert_eq!(command.kind(), Some("move"));
        assert_eq!(command.get("to").and_then(|value| value.as_str()), Some("e4"));
    }

    #[test]
    fn commands_without_type_still_decode() {
        let command = decode_command(r#"{"resign":true}"#).expect("object frame should decode");
        assert_eq!(command.kind(), None);
    }

    #[test]
    fn rejects_non_object_json() {
        match decode_command("[1,2,3]") {
            Err(ProtocolError::NotAnObject(kind)) => assert_eq!(kind, "array"),
            other => panic!("expected not-an-object error, got {other:?}"),
        }
        assert!(matches!(decode_command("\"move\""), Err(ProtocolError::NotAnObject("string"))));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(decode_command("{not json"), Err(ProtocolError::InvalidJson(_))));
    }
}
