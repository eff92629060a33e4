use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, room_routes, visit_record_routes};
use patient_cell::router::{insurance_plan_routes, patient_routes};
use physician_cell::router::{physician_routes, specialty_routes};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/physicians", physician_routes(state.clone()))
        .nest("/specialties", specialty_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/insurance-plans", insurance_plan_routes(state.clone()))
        .nest("/rooms", room_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/visit-records", visit_record_routes(state))
}
