pub mod analyses;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/analyses",
            post(analyses::handle_submit)
                .get(analyses::handle_list)
                .layer(body_limit),
        )
        .with_state(state)
}
