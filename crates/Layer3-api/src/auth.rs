//! Actor authentication
//!
//! Bearer tokens are resolved to an [`Actor`] by an [`ActorResolver`]. The
//! users service owns the tokens; this crate only asks it who the caller is.

use crate::error::ApiError;
use crate::server::AppState;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskhook_foundation::{Error, Result};
use taskhook_task::Actor;
use tracing::debug;

/// Resolve a bearer token to an actor; `Unauthorized` when it is not valid
#[async_trait]
pub trait ActorResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Actor>;
}

// ============================================================================
// Remote (users service)
// ============================================================================

/// Calls `GET {USER_AUTH_URL}` with the caller's bearer token; expects
/// `{"id": .., "is_admin": ..}` back
pub struct RemoteActorResolver {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
struct CurrentUser {
    id: i64,
    #[serde(default)]
    is_admin: bool,
}

impl RemoteActorResolver {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build auth client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ActorResolver for RemoteActorResolver {
    async fn resolve(&self, token: &str) -> Result<Actor> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::UpstreamFailure(format!("users service: {}", e)))?;

        match response.status() {
            status if status.is_success() => {
                let user: CurrentUser = response
                    .json()
                    .await
                    .map_err(|e| Error::UpstreamFailure(format!("users service: {}", e)))?;
                debug!(user_id = user.id, is_admin = user.is_admin, "Actor resolved");
                Ok(Actor {
                    id: user.id,
                    is_admin: user.is_admin,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(Error::Unauthorized("Invalid bearer token".to_string()))
            }
            status => Err(Error::UpstreamFailure(format!(
                "users service returned {}",
                status
            ))),
        }
    }
}

// ============================================================================
// Static (tests, local development)
// ============================================================================

/// Fixed token → actor table
#[derive(Default)]
pub struct StaticActorResolver {
    tokens: HashMap<String, Actor>,
}

impl StaticActorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, actor: Actor) -> Self {
        self.tokens.insert(token.into(), actor);
        self
    }
}

#[async_trait]
impl ActorResolver for StaticActorResolver {
    async fn resolve(&self, token: &str) -> Result<Actor> {
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| Error::Unauthorized("Invalid bearer token".to_string()))
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Actor of the current request
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Actor);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(ApiError::missing_auth)?;
        let actor = state.auth.resolve(token).await?;
        Ok(Authenticated(actor))
    }
}
