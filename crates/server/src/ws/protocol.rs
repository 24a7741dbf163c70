use anyhow::Context;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use gamehub_common::protocol::ws::{encode_message, ServerMessage};

pub async fn send_ws_message(socket: &mut WebSocket, message: &ServerMessage) -> anyhow::Result<()> {
    let encoded = encode_message(message).context("failed to encode server message")?;
    socket.send(Message::Text(encoded.into())).await.context("failed to send websocket frame")
}

pub async fn send_text(socket: &mut WebSocket, text: &str) -> anyhow::Result<()> {
    socket.send(Message::Text(text.into())).await.context("failed to send websocket frame")
}

/// Best effort: the peer may already be gone.
pub async fn close_with(socket: &mut WebSocket, code: u16, reason: &str) {
    let _ = socket.send(Message::Close(Some(CloseFrame { code, reason: reason.into() }))).await;
}

pub fn is_frame_size_violation(error: &axum::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("message too long")
        || message.contains("frame too long")
        || message.contains("too large")
        || message.contains("too big")
        || message.contains("size limit")
}
