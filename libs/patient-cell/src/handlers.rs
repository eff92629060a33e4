use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Caller, User};
use shared_models::error::AppError;
use shared_utils::AuthCaller;

use crate::models::{
    CreatePatientRequest, InsurancePlanRequest, PatientSearchQuery, RegisterPatientRequest,
    UpdatePatientRequest,
};
use crate::services::{InsurancePlanService, PatientService};

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let patients = PatientService::new(&config)
        .search_patients(query, auth.token())
        .await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    caller.require_administrator()?;

    let patient = PatientService::new(&config)
        .create_patient(request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(patient))))
}

/// A signed-in patient account creates its own patient record.
#[axum::debug_handler]
pub async fn register_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    AuthCaller(caller): AuthCaller,
    Json(request): Json<RegisterPatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Caller::Patient { patient_id } = caller else {
        return Err(AppError::Forbidden(
            "Only patient accounts can register as patients".to_string(),
        ));
    };

    let patient = PatientService::new(&config)
        .create_patient(request.into_create(patient_id, user.email), auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!({
        "patient": patient,
        "message": "Registration complete"
    }))))
}

#[axum::debug_handler]
pub async fn get_own_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
) -> Result<Json<Value>, AppError> {
    let Caller::Patient { patient_id } = caller else {
        return Err(AppError::Forbidden("Only patients have a patient record".to_string()));
    };

    let patient = PatientService::new(&config)
        .get_patient(patient_id, auth.token())
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    match caller {
        Caller::Administrator => {}
        Caller::Patient { patient_id: own } if own == patient_id => {}
        Caller::Patient { .. } | Caller::Physician { .. } => {
            return Err(AppError::Forbidden("Not allowed to view this patient".to_string()));
        }
    }

    let patient = PatientService::new(&config)
        .get_patient(patient_id, auth.token())
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let patient = PatientService::new(&config)
        .update_patient(patient_id, request, auth.token())
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    caller.require_administrator()?;

    PatientService::new(&config)
        .delete_patient(patient_id, auth.token())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_insurance_plans(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let plans = InsurancePlanService::new(&config).list_plans(None).await?;

    Ok(Json(json!({
        "insurance_plans": plans,
        "total": plans.len()
    })))
}

#[axum::debug_handler]
pub async fn create_insurance_plan(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Json(request): Json<InsurancePlanRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    caller.require_administrator()?;

    let plan = InsurancePlanService::new(&config)
        .create_plan(request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(plan))))
}

#[axum::debug_handler]
pub async fn update_insurance_plan(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<InsurancePlanRequest>,
) -> Result<Json<Value>, AppError> {
    caller.require_administrator()?;

    let plan = InsurancePlanService::new(&config)
        .update_plan(plan_id, request, auth.token())
        .await?;

    Ok(Json(json!(plan)))
}

#[axum::debug_handler]
pub async fn delete_insurance_plan(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    AuthCaller(caller): AuthCaller,
    Path(plan_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    caller.require_administrator()?;

    InsurancePlanService::new(&config)
        .delete_plan(plan_id, auth.token())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
