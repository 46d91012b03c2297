//! HTTP route handlers.

pub mod admin;
pub mod health;
pub mod helpers;
pub mod public;

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::middleware::authenticate_api_token;
use crate::state::AppState;

/// The full application router: health, public listings, and the admin API.
///
/// Bearer tokens are resolved for every route; only the admin handlers
/// require one.
pub fn app(state: AppState) -> Router {
    let channel = state.config().channel.clone();
    Router::new()
        .merge(health::router())
        .merge(public::router(&channel))
        .merge(admin::router())
        .layer(from_fn_with_state(state.clone(), authenticate_api_token))
        .with_state(state)
}
