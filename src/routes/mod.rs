use axum::{Router, routing::get};

use crate::state::AppState;

pub mod account;
pub mod admin;
pub mod auth;
pub mod blog;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod shop;

// State is bound by the caller so tests can build the router against their own AppState.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/auth", auth::router())
        .nest("/account", account::router())
        .nest("/shop", shop::router())
        .nest("/cart", cart::router())
        .nest("/blog", blog::router())
        .nest("/admin", admin::router())
        .merge(orders::router())
}
