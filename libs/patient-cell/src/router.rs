use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn patient_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(search_patients))
        .route("/", post(create_patient))
        .route("/register", post(register_patient))
        .route("/me", get(get_own_patient))
        .route("/{patient_id}", get(get_patient))
        .route("/{patient_id}", put(update_patient))
        .route("/{patient_id}", delete(delete_patient))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}

pub fn insurance_plan_routes(config: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/", get(list_insurance_plans));

    let protected_routes = Router::new()
        .route("/", post(create_insurance_plan))
        .route("/{plan_id}", put(update_insurance_plan))
        .route("/{plan_id}", delete(delete_insurance_plan))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(config)
}
