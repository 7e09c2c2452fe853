use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{auth, events, health_check, messages};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let production = state.config.production;
    let cors = create_cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/:event_id", get(events::get_event))
        .route("/events/:event_id/cancel", post(events::cancel_event))
        .route("/events/:event_id/join", post(events::join_event))
        .route("/events/:event_id/leave", post(events::leave_event))
        .route("/events/:event_id/attendance", get(events::attendance))
        .route(
            "/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/messages/:message_id/replies", post(messages::reply))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(production))
        .layer(cors)
        .with_state(state)
}
