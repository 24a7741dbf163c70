mod handler;
mod protocol;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use gamehub_common::types::GameId;
use tracing::error;

use crate::{
    api::GAME_NOT_FOUND_MESSAGE,
    auth::Authenticator,
    config::{ServerConfig, DEFAULT_MAX_FRAME_BYTES, DEFAULT_OUTBOUND_QUEUE_CAPACITY},
    error::{request_id_from_headers_or_generate, with_request_id_scope, ErrorCode, ServerError},
    logic::GameLogic,
    session::SessionRegistry,
    store::GameStore,
};

/// Per-channel limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub max_auth_attempts: Option<u32>,
    pub idle_timeout: Option<Duration>,
    pub outbound_queue_capacity: usize,
    pub max_frame_bytes: usize,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            max_auth_attempts: None,
            idle_timeout: None,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ChannelPolicy {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_auth_attempts: config.max_auth_attempts,
            idle_timeout: config.idle_timeout,
            outbound_queue_capacity: config.outbound_queue_capacity,
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

#[derive(Clone)]
pub struct ChannelState {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn GameStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub logic: Arc<dyn GameLogic>,
    pub policy: ChannelPolicy,
}

pub fn router(state: ChannelState) -> Router {
    Router::new().route("/api/game/{game_id}", get(ws_upgrade)).with_state(state)
}

/// Opens the real-time channel for a live game. Unknown and concluded games
/// are refused before the upgrade so they never get a session.
async fn ws_upgrade(
    Path(game_id): Path<GameId>,
    State(state): State<ChannelState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let game = match state.store.get_live_game(game_id).await {
        Ok(Some(game)) => game,
        Ok(None) => {
            return ServerError::new(ErrorCode::NotFound, GAME_NOT_FOUND_MESSAGE).into_response();
        }
        Err(error) => {
            error!(game_id = %game_id, error = %error, "failed to load game for channel");
            return ServerError::from_code(ErrorCode::InternalError).into_response();
        }
    };

    let session = state.registry.get_or_create(&game).await;
    let request_id = request_id_from_headers_or_generate(&headers);
    let max_frame_bytes = state.policy.max_frame_bytes;

    ws.max_frame_size(max_frame_bytes).max_message_size(max_frame_bytes).on_upgrade(
        move |socket| async move {
            with_request_id_scope(request_id, handler::handle_socket(state, session, socket))
                .await;
        },
    )
}
