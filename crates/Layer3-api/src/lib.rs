//! # taskhook-api
//!
//! axum HTTP surface for Taskhook: task routes for owners, the signed
//! callback endpoint the worker reports through, and a health check.

pub mod auth;
pub mod error;
pub mod routes;
pub mod server;

pub use auth::{ActorResolver, Authenticated, RemoteActorResolver, StaticActorResolver};
pub use error::{ApiError, ApiErrorBody, ApiResult};
pub use server::{create_router, serve, serve_listener, AppState, HealthProbe, API_PREFIX};
