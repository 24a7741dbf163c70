mod api;
mod auth;
mod config;
mod cors;
mod error;
mod logic;
mod metrics;
mod session;
mod store;
mod ws;

use anyhow::{anyhow, Context};
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::{sync::Arc, time::Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    auth::{jwt::JwtAccessTokenService, Authenticator, TokenAuthenticator},
    config::{LogFormat, ServerConfig},
    error::{
        attach_request_id_header, request_id_from_headers_or_generate, with_request_id_scope,
    },
    logic::{GameLogic, RelayLogic},
    metrics::ServerMetrics,
    session::SessionRegistry,
    store::{GameStore, MemoryGameStore},
    ws::{ChannelPolicy, ChannelState},
};

const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(&config)?;

    if config.is_dev_jwt_secret() {
        warn!("using the development JWT secret; set GAMEHUB_JWT_SECRET outside local development");
    }
    metrics::set_global_metrics(Arc::new(ServerMetrics::default()));

    let services = Services::new(&config)?;
    let app = build_router(services, &config);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind game server listener on {}", config.listen_addr))?;

    info!(
        listen_addr = %config.listen_addr,
        max_auth_attempts = ?config.max_auth_attempts,
        idle_timeout = ?config.idle_timeout,
        "starting game server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("game server exited unexpectedly")
}

fn init_tracing(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .with_context(|| format!("invalid log filter '{}'", config.log_filter))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}

/// Collaborators shared by the HTTP API and the real-time channel.
struct Services {
    store: Arc<dyn GameStore>,
    tokens: Arc<JwtAccessTokenService>,
    authenticator: Arc<dyn Authenticator>,
    registry: Arc<SessionRegistry>,
    logic: Arc<dyn GameLogic>,
}

impl Services {
    fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
        let tokens = Arc::new(
            JwtAccessTokenService::new(&config.jwt_secret).context("invalid GAMEHUB_JWT_SECRET")?,
        );
        let authenticator: Arc<dyn Authenticator> =
            Arc::new(TokenAuthenticator::new(Arc::clone(&tokens), Arc::clone(&store)));

        Ok(Self {
            store,
            tokens,
            authenticator,
            registry: Arc::new(SessionRegistry::new()),
            logic: Arc::new(RelayLogic),
        })
    }
}

fn build_router(services: Services, config: &ServerConfig) -> Router {
    let channel_state = ChannelState {
        registry: services.registry,
        store: Arc::clone(&services.store),
        authenticator: Arc::clone(&services.authenticator),
        logic: services.logic,
        policy: ChannelPolicy::from_config(config),
    };

    apply_middleware(
        Router::new()
            .route("/healthz", get(healthz))
            .route("/metrics", get(metrics_text))
            .merge(api::router(services.store, services.tokens, services.authenticator))
            .merge(ws::router(channel_state)),
        config.cors_origins.as_deref(),
    )
}

fn apply_middleware(router: Router, cors_origins: Option<&str>) -> Router {
    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
        .layer(cors::cors_layer(cors_origins))
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn metrics_text() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], metrics::render_global())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(error = %error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(error = %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request_id_from_headers_or_generate(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = with_request_id_scope(request_id.clone(), next.run(request)).await;
    attach_request_id_header(&mut response, &request_id);

    let latency_ms = started_at.elapsed().as_millis() as u64;
    metrics::record_http_request(method.as_str(), &path, response.status().as_u16(), latency_ms);
    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms,
        "request completed"
    );

    response
}
