use gamehub_common::protocol::ws::{
    decode_command, Command, ServerMessage, INVALID_COMMAND_CODE, REJECTION_NOTICE,
};
use gamehub_common::types::{GameId, UserId};
use serde_json::json;

#[test]
fn rejection_notice_is_plain_text() {
    assert_eq!(REJECTION_NOTICE, "Invalid credentials");
    assert!(serde_json::from_str::<serde_json::Value>(REJECTION_NOTICE).is_err());
}

#[test]
fn server_message_shapes_match_contract() {
    let command = decode_command(r#"{"type":"move","from":"e2","to":"e4"}"#)
        .expect("sample command should decode");

    let samples = [
        (
            ServerMessage::Authenticated {
                game_id: GameId(5),
                user_id: UserId(7),
                username: "alice".to_string(),
            },
            "authenticated",
            &["type", "game_id", "user_id", "username"][..],
        ),
        (
            ServerMessage::Command {
                game_id: GameId(5),
                seq: 1,
                from_user_id: UserId(7),
                command: command.clone(),
            },
            "command",
            &["type", "game_id", "seq", "from_user_id", "command"][..],
        ),
        (
            ServerMessage::GameState { game_id: GameId(5), state: json!({ "moves": [] }) },
            "game_state",
            &["type", "game_id", "state"][..],
        ),
        (
            ServerMessage::Error {
                code: INVALID_COMMAND_CODE.to_string(),
                message: "command frame must be a JSON object".to_string(),
            },
            "error",
            &["type", "code", "message"][..],
        ),
    ];

    for (message, expected_type, expected_keys) in samples {
        let value = serde_json::to_value(&message).expect("server message should serialize");
        assert_eq!(value["type"], expected_type);
        for key in expected_keys {
            assert!(
                value.get(key).is_some(),
                "serialized `{expected_type}` frame must include `{key}`",
            );
        }

        let decoded: ServerMessage =
            serde_json::from_value(value).expect("server message should deserialize");
        assert_eq!(decoded, message);
    }
}

#[test]
fn relayed_command_keeps_client_fields_nested() {
    let message = ServerMessage::Command {
        game_id: GameId(1),
        seq: 3,
        from_user_id: UserId(2),
        command: Command::new(
            json!({ "type": "move", "to": "e4" }).as_object().cloned().unwrap_or_default(),
        ),
    };

    let value = serde_json::to_value(message).expect("relayed command should serialize");
    assert_eq!(value["type"], "command");
    assert_eq!(value["command"]["type"], "move");
    assert_eq!(value["command"]["to"], "e4");
    assert_eq!(value["game_id"], 1);
}
