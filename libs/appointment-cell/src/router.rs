use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    Router::new()
        .route("/book/{physician_id}/{slot}", post(handlers::book_slot))
        .route("/mine", get(handlers::my_appointments))
        .route("/", get(handlers::list_appointments))
        .route("/", post(handlers::create_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route("/{appointment_id}", delete(handlers::cancel_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/visit-record", post(handlers::create_visit_record))
        .route("/{appointment_id}/visit-record", get(handlers::get_visit_record))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn visit_record_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{record_id}", put(handlers::update_visit_record))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn room_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_rooms))
        .route("/", post(handlers::create_room))
        .route("/{room_id}", put(handlers::update_room))
        .route("/{room_id}", delete(handlers::delete_room))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
