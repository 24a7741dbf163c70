pub mod jwt;
pub mod middleware;

use std::sync::Arc;

use async_trait::async_trait;
use gamehub_common::types::User;
use tracing::{debug, error};

use crate::store::GameStore;
use jwt::JwtAccessTokenService;

/// Resolves a presented credential to a user. Stateless; shared by the REST
/// middleware and the in-channel handshake.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credential: &str) -> Option<User>;
}

/// Bearer JWT whose subject must name a user that still exists in the store.
pub struct TokenAuthenticator {
    tokens: Arc<JwtAccessTokenService>,
    store: Arc<dyn GameStore>,
}

impl TokenAuthenticator {
    pub fn new(tokens: Arc<JwtAccessTokenService>, store: Arc<dyn GameStore>) -> Self {
        Self { tokens, store }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, credential: &str) -> Option<User> {
        let token = normalize_credential(credential)?;

        let user_id = match self.tokens.validate_user_token(token) {
            Ok(user_id) => user_id,
            Err(error) => {
                debug!(error = %error, "credential rejected");
                return None;
            }
        };

        match self.store.user(user_id).await {
            Ok(user) => user,
            Err(error) => {
                error!(error = %error, user_id = %user_id, "failed to resolve token subject");
                None
            }
        }
    }
}

/// Accepts either a bare token or an `Authorization`-style `Bearer <token>`.
pub(crate) fn normalize_credential(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") => token.trim(),
        Some(_) => return None,
        None => value,
    };

    if token.is_empty() {
        return None;
    }

    Some(token)
}
