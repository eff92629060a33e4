use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn physician_routes(state: Arc<AppConfig>) -> Router {
    // Browsing and slot lookup are open to everyone
    let public_routes = Router::new()
        .route("/", get(handlers::list_physicians))
        .route("/{physician_id}", get(handlers::get_physician))
        .route("/{physician_id}/slots", get(handlers::get_physician_slots));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_physician))
        .route("/{physician_id}", put(handlers::update_physician))
        .route("/{physician_id}", delete(handlers::delete_physician))
        .route("/{physician_id}/availability", get(handlers::list_windows))
        .route("/{physician_id}/availability", post(handlers::create_window))
        .route("/{physician_id}/availability/{window_id}", put(handlers::update_window))
        .route("/{physician_id}/availability/{window_id}", delete(handlers::delete_window))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn specialty_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_specialties));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_specialty))
        .route("/{specialty_id}", put(handlers::update_specialty))
        .route("/{specialty_id}", delete(handlers::delete_specialty))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
