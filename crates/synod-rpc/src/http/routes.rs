use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    get_status, paxos_accept, paxos_decision, paxos_learn, paxos_prepare, submit_value, AppState,
};

/// Create the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(get_status))
        .route("/submit", post(submit_value))
        .route("/paxos/prepare", post(paxos_prepare))
        .route("/paxos/accept", post(paxos_accept))
        .route("/paxos/learn", post(paxos_learn))
        .route("/paxos/decision", get(paxos_decision))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
