use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::AuthCaller;

use crate::models::{
    CreateAvailabilityWindowRequest, CreatePhysicianRequest, SpecialtyRequest,
    UpdateAvailabilityWindowRequest, UpdatePhysicianRequest,
};
use crate::services::slots::format_slot;
use crate::services::{AvailabilityService, PhysicianService, SpecialtyService};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_physicians(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let physicians = PhysicianService::new(&state).list_physicians(None).await?;

    Ok(Json(json!({
        "physicians": physicians,
        "total": physicians.len()
    })))
}

#[axum::debug_handler]
pub async fn get_physician(
    State(state): State<Arc<AppConfig>>,
    Path(physician_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let physician = PhysicianService::new(&state).get_physician(physician_id, None).await?;
    Ok(Json(json!(physician)))
}

/// Bookable slots for the coming days, starting today.
#[axum::debug_handler]
pub async fn get_physician_slots(
    State(state): State<Arc<AppConfig>>,
    Path(physician_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let physician = PhysicianService::new(&state).get_physician(physician_id, None).await?;

    let now = Utc::now();
    let slots = AvailabilityService::new(&state)
        .resolve_slots(physician_id, now.date_naive(), now, None)
        .await?;

    let slots: Vec<Value> = slots
        .iter()
        .map(|slot| json!({ "slot": format_slot(slot), "starts_at": slot }))
        .collect();

    Ok(Json(json!({
        "physician": physician,
        "slots": slots,
        "total": slots.len(),
        "horizon_days": state.scheduling.horizon_days,
        "slot_minutes": state.slot_minutes()
    })))
}

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let specialties = SpecialtyService::new(&state).list_specialties(None).await?;

    Ok(Json(json!({
        "specialties": specialties,
        "total": specialties.len()
    })))
}

// ==============================================================================
// ADMINISTRATOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_physician(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Json(request): Json<CreatePhysicianRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    caller.require_administrator()?;

    let physician = PhysicianService::new(&state)
        .create_physician(request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(physician))))
}

#[axum::debug_handler]
pub async fn update_physician(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(physician_id): Path<Uuid>,
    Json(request): Json<UpdatePhysicianRequest>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let physician = PhysicianService::new(&state)
        .update_physician(physician_id, request, auth.token())
        .await?;

    Ok(Json(json!(physician)))
}

#[axum::debug_handler]
pub async fn delete_physician(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(physician_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    caller.require_administrator()?;

    PhysicianService::new(&state)
        .delete_physician(physician_id, auth.token())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_windows(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(physician_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let windows = AvailabilityService::new(&state)
        .list_windows(physician_id, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "physician_id": physician_id,
        "windows": windows,
        "total": windows.len()
    })))
}

#[axum::debug_handler]
pub async fn create_window(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(physician_id): Path<Uuid>,
    Json(request): Json<CreateAvailabilityWindowRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    caller.require_administrator()?;

    let window = AvailabilityService::new(&state)
        .create_window(physician_id, request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(window))))
}

#[axum::debug_handler]
pub async fn update_window(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path((physician_id, window_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateAvailabilityWindowRequest>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let service = AvailabilityService::new(&state);
    let current = service.get_window(window_id, Some(auth.token())).await?;
    if current.physician_id != physician_id {
        return Err(AppError::NotFound(format!(
            "Availability window {} does not belong to physician {}",
            window_id, physician_id
        )));
    }

    let window = service.update_window(window_id, request, auth.token()).await?;
    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn delete_window(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path((physician_id, window_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    caller.require_administrator()?;

    let service = AvailabilityService::new(&state);
    let current = service.get_window(window_id, Some(auth.token())).await?;
    if current.physician_id != physician_id {
        return Err(AppError::NotFound(format!(
            "Availability window {} does not belong to physician {}",
            window_id, physician_id
        )));
    }

    service.delete_window(window_id, auth.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn create_specialty(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Json(request): Json<SpecialtyRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    caller.require_administrator()?;

    let specialty = SpecialtyService::new(&state)
        .create_specialty(request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(specialty))))
}

#[axum::debug_handler]
pub async fn update_specialty(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(specialty_id): Path<Uuid>,
    Json(request): Json<SpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let specialty = SpecialtyService::new(&state)
        .update_specialty(specialty_id, request, auth.token())
        .await?;

    Ok(Json(json!(specialty)))
}

#[axum::debug_handler]
pub async fn delete_specialty(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(specialty_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    caller.require_administrator()?;

    SpecialtyService::new(&state)
        .delete_specialty(specialty_id, auth.token())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
