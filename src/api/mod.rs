use axum::Router;
use axum::routing::{get, post};

pub mod handlers;
pub mod responses;

pub use handlers::ApiContext;

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route("/api/status", get(handlers::get_status))
        .route("/api/session", get(handlers::get_session))
        .route("/api/samples", post(handlers::post_samples))
        .route("/api/confirm", post(handlers::post_confirm))
        .route("/api/ride", post(handlers::post_ride))
        .route("/api/resume", post(handlers::post_resume))
        .with_state(context)
}
