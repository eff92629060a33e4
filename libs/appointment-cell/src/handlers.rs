use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use physician_cell::parse_slot;
use shared_config::AppConfig;
use shared_models::auth::Caller;
use shared_models::error::AppError;
use shared_utils::AuthCaller;

use crate::models::{
    AppointmentError, AppointmentQuery, AppointmentStatus, CreateAppointmentRequest,
    CreateVisitRecordRequest, RoomRequest, UpdateAppointmentRequest, UpdateVisitRecordRequest,
};
use crate::services::{AppointmentAdminService, BookingService, RoomService, VisitRecordService};

// ==============================================================================
// BOOKING
// ==============================================================================

/// Books a slot (`YYYY-MM-DD-HH-MM`) with a physician for the calling patient.
#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path((physician_id, slot)): Path<(Uuid, String)>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let scheduled_at = parse_slot(&slot).ok_or(AppointmentError::InvalidSlot(slot))?;

    let outcome = BookingService::new(&state)
        .book(&caller, physician_id, scheduled_at, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(outcome))))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentAdminService::new(&state)
        .list_for_caller(&caller, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentAdminService::new(&state)
        .get_appointment(appointment_id, auth.token())
        .await?;

    let allowed = match caller {
        Caller::Administrator => true,
        Caller::Patient { patient_id } => patient_id == appointment.patient_id,
        Caller::Physician { physician_id } => physician_id == appointment.physician_id,
    };
    if !allowed {
        return Err(AppointmentError::Unauthorized.into());
    }

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// ADMINISTRATION
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let appointments = AppointmentAdminService::new(&state)
        .list_appointments(query, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    caller.require_administrator()?;

    let appointment = AppointmentAdminService::new(&state)
        .create_appointment(request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let appointment = AppointmentAdminService::new(&state)
        .update_appointment(appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!(appointment)))
}

/// Administrator removal of an appointment: the row stays, cancelled.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let appointment = AppointmentAdminService::new(&state)
        .set_status(appointment_id, AppointmentStatus::Cancelled, auth.token())
        .await?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

// ==============================================================================
// VISIT RECORDS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_visit_record(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CreateVisitRecordRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let record = VisitRecordService::new(&state)
        .create_record(&caller, appointment_id, request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(record))))
}

#[axum::debug_handler]
pub async fn get_visit_record(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let record = VisitRecordService::new(&state)
        .get_for_appointment(&caller, appointment_id, auth.token())
        .await?;

    Ok(Json(json!(record)))
}

#[axum::debug_handler]
pub async fn update_visit_record(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(record_id): Path<Uuid>,
    Json(request): Json<UpdateVisitRecordRequest>,
) -> Result<Json<Value>, AppError> {
    let record = VisitRecordService::new(&state)
        .update_record(&caller, record_id, request, auth.token())
        .await?;

    Ok(Json(json!(record)))
}

// ==============================================================================
// ROOMS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_rooms(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let rooms = RoomService::new(&state).list_rooms(auth.token()).await?;

    Ok(Json(json!({
        "rooms": rooms,
        "total": rooms.len()
    })))
}

#[axum::debug_handler]
pub async fn create_room(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Json(request): Json<RoomRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    caller.require_administrator()?;

    let room = RoomService::new(&state).create_room(request, auth.token()).await?;
    Ok((StatusCode::CREATED, Json(json!(room))))
}

#[axum::debug_handler]
pub async fn update_room(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(room_id): Path<Uuid>,
    Json(request): Json<RoomRequest>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let room = RoomService::new(&state)
        .update_room(room_id, request, auth.token())
        .await?;

    Ok(Json(json!(room)))
}

#[axum::debug_handler]
pub async fn delete_room(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    caller.require_administrator()?;

    RoomService::new(&state).delete_room(room_id, auth.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}
