use crate::{
    auth::Authenticator,
    error::{ErrorCode, ServerError},
};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use gamehub_common::types::User;
use std::sync::Arc;

/// Request extension inserted for requests carrying a valid bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub User);

pub async fn require_bearer_auth(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
    {
        Some(token) => token.to_owned(),
        None => return unauthorized_response("missing bearer token"),
    };

    let Some(user) = authenticator.authenticate(&token).await else {
        return unauthorized_response("invalid bearer token");
    };

    request.extensions_mut().insert(AuthenticatedUser(user));

    next.run(request).await
}

fn extract_bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(token)
}

fn unauthorized_response(message: &'static str) -> Response {
    ServerError::new(ErrorCode::AuthInvalidToken, message).into_response()
}
