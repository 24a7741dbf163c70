// Game logic collaborator.
//
// The session manager owns no rules. Whatever implements `GameLogic` receives
// every command from an authenticated connection, in order, with exclusive
// access to the game's live state.

use gamehub_common::protocol::ws::{Command, ServerMessage};
use serde_json::{json, Value};

use crate::session::{CommandContext, Connection};

pub trait GameLogic: Send + Sync {
    /// Apply one command. Side effects go through `ctx`; frames queued there
    /// are delivered after this returns, still under the game lock.
    fn handle_command(&self, command: Command, origin: &Connection, ctx: &mut CommandContext<'_>);
}

/// Rule-free logic: records every command in the game's move log and relays
/// it to all players. `{"type":"sync"}` answers the sender with the current
/// state instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelayLogic;

const SYNC_COMMAND: &str = "sync";

impl GameLogic for RelayLogic {
    fn handle_command(&self, command: Command, origin: &Connection, ctx: &mut CommandContext<'_>) {
        let game_id = ctx.game_id();

        if command.kind() == Some(SYNC_COMMAND) {
            let state = ctx.game().state.clone();
            ctx.reply(ServerMessage::GameState { game_id, state });
            return;
        }

        let game = ctx.game_mut();
        let seq = game.next_seq();
        append_move(
            &mut game.state,
            json!({
                "seq": seq,
                "user_id": origin.user.id,
                "command": command.clone().into_value(),
            }),
        );

        ctx.broadcast(ServerMessage::Command {
            game_id,
            seq,
            from_user_id: origin.user.id,
            command,
        });
    }
}

fn append_move(state: &mut Value, entry: Value) {
    if !state.is_object() {
        *state = json!({});
    }
    if let Some(fields) = state.as_object_mut() {
        match fields.get_mut("moves").and_then(Value::as_array_mut) {
            Some(moves) => moves.push(entry),
            None => {
                fields.insert("moves".to_string(), Value::Array(vec![entry]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::append_move;
    use serde_json::json;

    #[test]
    fn append_move_repairs_unexpected_state_shapes() {
        let mut state = json!({ "moves": [1] });
        append_move(&mut state, json!(2));
        assert_eq!(state, json!({ "moves": [1, 2] }));

        let mut state = json!({ "clock": 300 });
        append_move(&mut state, json!(1));
        assert_eq!(state, json!({ "clock": 300, "moves": [1] }));

        let mut state = json!(null);
        append_move(&mut state, json!(1));
        assert_eq!(state, json!({ "moves": [1] }));
    }
}
