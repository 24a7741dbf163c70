// Thin REST surface over the storage collaborator: user registration,
// game creation and game lookup. The real-time channel lives in `ws`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use gamehub_common::types::{Game, GameId, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    auth::{
        jwt::JwtAccessTokenService,
        middleware::{require_bearer_auth, AuthenticatedUser},
        Authenticator,
    },
    error::{ErrorCode, ServerError},
    store::{GameStore, StoreError},
};

pub const GAME_NOT_FOUND_MESSAGE: &str = "Requested game does not exist";

#[derive(Clone)]
struct ApiState {
    store: Arc<dyn GameStore>,
    tokens: Arc<JwtAccessTokenService>,
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub user: User,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct CreateGameRequest {
    #[serde(default)]
    settings: Value,
}

#[derive(Debug, Deserialize)]
struct GameQuery {
    game_id: Option<i64>,
}

#[derive(Debug)]
enum ApiError {
    BadRequest { message: String },
    NotFound { message: &'static str },
    Conflict { message: String },
    Internal(anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::InvalidUsername => Self::BadRequest { message: error.to_string() },
            StoreError::UsernameTaken(_) => Self::Conflict { message: error.to_string() },
            StoreError::UnknownUser(_) => Self::Internal(error.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest { message } => {
                ServerError::new(ErrorCode::ValidationFailed, message).into_response()
            }
            Self::NotFound { message } => {
                ServerError::new(ErrorCode::NotFound, message).into_response()
            }
            Self::Conflict { message } => {
                ServerError::new(ErrorCode::Conflict, message).into_response()
            }
            Self::Internal(error) => {
                tracing::error!(error = ?error, "game api internal error");
                ServerError::from_code(ErrorCode::InternalError).into_response()
            }
        }
    }
}

pub fn router(
    store: Arc<dyn GameStore>,
    tokens: Arc<JwtAccessTokenService>,
    authenticator: Arc<dyn Authenticator>,
) -> Router {
    let state = ApiState { store, tokens };

    let protected = Router::new()
        .route("/api/create_game/", post(create_game))
        .with_state(state.clone())
        .route_layer(middleware::from_fn_with_state(authenticator, require_bearer_auth));

    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/game", get(get_game))
        .with_state(state)
        .merge(protected)
}

async fn create_user(
    State(state): State<ApiState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    let user = state.store.create_user(&payload.username).await?;
    let access_token = state.tokens.issue_user_token(user.id).map_err(ApiError::Internal)?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(CreateUserResponse { user, access_token })))
}

async fn create_game(
    State(state): State<ApiState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<Game>), ApiError> {
    let game = state.store.create_game(&user, payload.settings).await?;

    info!(game_id = %game.id, user_id = %user.id, "game created");
    Ok((StatusCode::CREATED, Json(game)))
}

async fn get_game(
    State(state): State<ApiState>,
    Query(query): Query<GameQuery>,
) -> Result<Json<Game>, ApiError> {
    let Some(game_id) = query.game_id else {
        return Err(ApiError::BadRequest { message: "game_id is required".to_string() });
    };

    state
        .store
        .get_live_game(GameId(game_id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound { message: GAME_NOT_FOUND_MESSAGE })
}

#[cfg(test)]
mod tests {
    use super::{router, CreateUserResponse, GAME_NOT_FOUND_MESSAGE};
    use crate::auth::{jwt::JwtAccessTokenService, Authenticator, TokenAuthenticator};
    use crate::store::{GameStore, MemoryGameStore};
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Method, Request, StatusCode},
        response::Response,
        Router,
    };
    use gamehub_common::types::{Game, GameId};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const TEST_SECRET: &str = "gamehub_test_secret_that_is_definitely_long_enough";

    fn test_router() -> (Router, Arc<MemoryGameStore>) {
        let tokens =
            Arc::new(JwtAccessTokenService::new(TEST_SECRET).expect("jwt service should initialize"));
        let store = Arc::new(MemoryGameStore::default());
        let authenticator: Arc<dyn Authenticator> = Arc::new(TokenAuthenticator::new(
            Arc::clone(&tokens),
            Arc::clone(&store) as Arc<dyn GameStore>,
        ));
        let router = router(Arc::clone(&store) as Arc<dyn GameStore>, tokens, authenticator);
        (router, store)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    async fn register(app: &Router, username: &str) -> CreateUserResponse {
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/users", json!({ "username": username })))
            .await
            .expect("request should return a response");
        assert_eq!(response.status(), StatusCode::CREATED);
        serde_json::from_value(body_json(response).await).expect("user response should decode")
    }

    #[tokio::test]
    async fn registering_a_user_returns_a_usable_token() {
        let (app, _) = test_router();

        let registered = register(&app, "alice").await;
        assert_eq!(registered.user.username, "alice");
        assert!(!registered.access_token.is_empty());

        let duplicate = app
            .oneshot(json_request(Method::POST, "/api/users", json!({ "username": "alice" })))
            .await
            .expect("request should return a response");
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(duplicate).await["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn create_game_requires_bearer_auth() {
        let (app, _) = test_router();

        let response = app
            .oneshot(json_request(Method::POST, "/api/create_game/", json!({ "settings": {} })))
            .await
            .expect("request should return a response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn created_games_can_be_fetched_until_concluded() {
        let (app, store) = test_router();
        let alice = register(&app, "alice").await;

        let mut request = json_request(
            Method::POST,
            "/api/create_game/",
            json!({ "settings": { "time_format": "05:00" } }),
        );
        request.headers_mut().insert(
            AUTHORIZATION,
            format!("Bearer {}", alice.access_token).parse().expect("header should parse"),
        );
        let response = app.clone().oneshot(request).await.expect("request should return");
        assert_eq!(response.status(), StatusCode::CREATED);
        let game: Game =
            serde_json::from_value(body_json(response).await).expect("game should decode");
        assert_eq!(game.creator_id, alice.user.id);

        let fetched = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/game?game_id={}", game.id))
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should return a response");
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_json(fetched).await["settings"]["time_format"], "05:00");

        store.conclude_for_tests(game.id).await;
        let concluded = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/game?game_id={}", game.id))
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should return a response");
        assert_eq!(concluded.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(concluded).await["error"]["message"], GAME_NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn unknown_games_are_not_found() {
        let (app, _) = test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/game?game_id={}", GameId(42)))
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should return a response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
    }
}
