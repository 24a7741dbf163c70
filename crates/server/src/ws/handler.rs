use std::sync::Arc;

use axum::extract::ws::{close_code, Message, WebSocket};
use gamehub_common::protocol::ws::{
    decode_command, ProtocolError, ServerMessage, INVALID_COMMAND_CODE, REJECTION_NOTICE,
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

use super::protocol::{close_with, is_frame_size_violation, send_text, send_ws_message};
use super::ChannelState;
use crate::error::current_request_id;
use crate::metrics::{self, ChannelEvent};
use crate::session::{
    CloseReason, Connection, ConnectionId, GameSession, Handshake, HandshakeStep,
};

const FRAME_TOO_LARGE_REASON: &str = "frame exceeds maximum size";
const OVERFLOW_REASON: &str = "outbound queue overflow";

/// Drives one channel from open to close: handshake, attach, dispatch loop,
/// detach. Detach runs on every exit path after a successful attach.
pub(super) async fn handle_socket(
    state: ChannelState,
    session: Arc<GameSession>,
    mut socket: WebSocket,
) {
    let connection_id = ConnectionId::new();
    let game_id = session.game_id();
    let request_id = current_request_id().unwrap_or_else(|| "unknown".to_string());
    debug!(
        game_id = %game_id,
        connection_id = %connection_id,
        request_id = %request_id,
        "channel opened"
    );

    let connection = match run_handshake(&state, &mut socket, connection_id, &session).await {
        Ok(connection) => connection,
        Err(reason) => {
            debug!(
                game_id = %game_id,
                connection_id = %connection_id,
                reason = reason.as_str(),
                "channel closed before authentication"
            );
            return;
        }
    };

    let (outbound_sender, mut outbound_receiver) =
        mpsc::channel::<ServerMessage>(state.policy.outbound_queue_capacity);
    session.attach(connection.clone(), outbound_sender).await;
    metrics::record_channel_event(ChannelEvent::Authenticated);

    let authenticated = ServerMessage::Authenticated {
        game_id,
        user_id: connection.user.id,
        username: connection.user.username.clone(),
    };
    let reason = if send_ws_message(&mut socket, &authenticated).await.is_err() {
        CloseReason::Disconnected
    } else {
        run_dispatch_loop(&state, &session, &connection, &mut socket, &mut outbound_receiver).await
    };

    session.detach(connection.id).await;
    info!(
        game_id = %game_id,
        connection_id = %connection.id,
        user_id = %connection.user.id,
        reason = reason.as_str(),
        "channel closed"
    );
}

/// Reads credentials until one resolves to a user. Every failure is answered
/// with the plain text rejection notice and the client may try again, unless
/// an attempt cap is configured.
async fn run_handshake(
    state: &ChannelState,
    socket: &mut WebSocket,
    connection_id: ConnectionId,
    session: &GameSession,
) -> Result<Connection, CloseReason> {
    let game_id = session.game_id();
    let mut handshake = Handshake::new(state.policy.max_auth_attempts);
    let mut last_inbound = Instant::now();

    loop {
        let deadline = state.policy.idle_timeout.map(|timeout| last_inbound + timeout);
        let maybe_message = tokio::select! {
            _ = idle_deadline(deadline) => {
                metrics::record_channel_event(ChannelEvent::IdleTimeout);
                close_with(socket, close_code::POLICY, "idle timeout").await;
                return Err(handshake.abandon(CloseReason::IdleTimeout));
            }
            maybe_message = socket.recv() => maybe_message,
        };
        last_inbound = Instant::now();

        let credential = match maybe_message {
            Some(Ok(Message::Text(credential))) => credential,
            Some(Ok(Message::Binary(_))) => {
                warn!(
                    game_id = %game_id,
                    connection_id = %connection_id,
                    "binary frame during authentication"
                );
                close_with(socket, close_code::UNSUPPORTED, "credential must be a text frame")
                    .await;
                return Err(handshake.abandon(CloseReason::ProtocolViolation));
            }
            Some(Ok(Message::Ping(payload))) => {
                if socket.send(Message::Pong(payload)).await.is_err() {
                    return Err(handshake.abandon(CloseReason::Disconnected));
                }
                continue;
            }
            Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                return Err(handshake.abandon(CloseReason::Disconnected));
            }
            Some(Err(error)) => {
                if is_frame_size_violation(&error) {
                    close_with(socket, close_code::SIZE, FRAME_TOO_LARGE_REASON).await;
                }
                return Err(handshake.abandon(CloseReason::Disconnected));
            }
        };

        let user = state.authenticator.authenticate(credential.as_str()).await;
        match handshake.on_credential_result(user) {
            Some(HandshakeStep::Authenticated(user)) => {
                info!(
                    game_id = %game_id,
                    connection_id = %connection_id,
                    user_id = %user.id,
                    "connection authenticated"
                );
                return Ok(Connection::new(connection_id, user));
            }
            Some(HandshakeStep::Rejected { failed_attempts }) => {
                metrics::record_channel_event(ChannelEvent::HandshakeRejected);
                debug!(
                    game_id = %game_id,
                    connection_id = %connection_id,
                    failed_attempts,
                    "credential rejected"
                );
                if send_text(socket, REJECTION_NOTICE).await.is_err() {
                    return Err(handshake.abandon(CloseReason::Disconnected));
                }
            }
            Some(HandshakeStep::Exhausted { failed_attempts }) => {
                metrics::record_channel_event(ChannelEvent::HandshakeRejected);
                metrics::record_channel_event(ChannelEvent::HandshakeExhausted);
                warn!(
                    game_id = %game_id,
                    connection_id = %connection_id,
                    failed_attempts,
                    "authentication attempts exhausted"
                );
                let _ = send_text(socket, REJECTION_NOTICE).await;
                close_with(socket, close_code::POLICY, "too many failed authentication attempts")
                    .await;
                return Err(CloseReason::AttemptsExhausted);
            }
            None => return Err(handshake.abandon(CloseReason::Disconnected)),
        }
    }
}

/// Forwards commands to game logic in receipt order and drains the
/// connection's outbound queue, until either side goes away.
async fn run_dispatch_loop(
    state: &ChannelState,
    session: &GameSession,
    connection: &Connection,
    socket: &mut WebSocket,
    outbound_receiver: &mut mpsc::Receiver<ServerMessage>,
) -> CloseReason {
    let mut last_inbound = Instant::now();

    loop {
        let deadline = state.policy.idle_timeout.map(|timeout| last_inbound + timeout);
        tokio::select! {
            _ = idle_deadline(deadline) => {
                metrics::record_channel_event(ChannelEvent::IdleTimeout);
                close_with(socket, close_code::POLICY, "idle timeout").await;
                return CloseReason::IdleTimeout;
            }
            maybe_outbound = outbound_receiver.recv() => {
                let Some(outbound) = maybe_outbound else {
                    // The session dropped our sender: this connection was evicted.
                    close_with(socket, close_code::POLICY, OVERFLOW_REASON).await;
                    return CloseReason::Evicted;
                };
                if send_ws_message(socket, &outbound).await.is_err() {
                    return CloseReason::Disconnected;
                }
            }
            maybe_message = socket.recv() => {
                last_inbound = Instant::now();
                let Some(message) = maybe_message else {
                    return CloseReason::Disconnected;
                };

                let command = match message {
                    Ok(Message::Text(raw)) => decode_command(raw.as_str()),
                    Ok(Message::Binary(_)) => Err(ProtocolError::BinaryFrame),
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            return CloseReason::Disconnected;
                        }
                        continue;
                    }
                    Ok(Message::Pong(_)) => continue,
                    Ok(Message::Close(_)) => return CloseReason::Disconnected,
                    Err(error) => {
                        if is_frame_size_violation(&error) {
                            close_with(socket, close_code::SIZE, FRAME_TOO_LARGE_REASON).await;
                        }
                        return CloseReason::Disconnected;
                    }
                };

                let command = match command {
                    Ok(command) => command,
                    Err(error) => {
                        metrics::record_channel_event(ChannelEvent::MalformedCommand);
                        warn!(
                            game_id = %session.game_id(),
                            connection_id = %connection.id,
                            user_id = %connection.user.id,
                            error = %error,
                            "malformed command, closing channel"
                        );
                        let _ = send_ws_message(
                            socket,
                            &ServerMessage::Error {
                                code: INVALID_COMMAND_CODE.to_string(),
                                message: error.to_string(),
                            },
                        )
                        .await;
                        close_with(socket, close_code::INVALID, "malformed command").await;
                        return CloseReason::ProtocolViolation;
                    }
                };

                match session.dispatch(state.logic.as_ref(), command, connection).await {
                    Some(_) => metrics::record_channel_event(ChannelEvent::CommandDispatched),
                    None => {
                        close_with(socket, close_code::POLICY, OVERFLOW_REASON).await;
                        return CloseReason::Evicted;
                    }
                }
            }
        }
    }
}

async fn idle_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
