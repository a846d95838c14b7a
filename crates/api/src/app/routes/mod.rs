use axum::Router;

pub mod system;
pub mod variants;

/// Router for all catalog endpoints.
pub fn router() -> Router {
    Router::new().nest("/variants", variants::router())
}
