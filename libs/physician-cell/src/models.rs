use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
}

/// A physician profile. The id is the physician's user account id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Physician {
    pub id: Uuid,
    pub full_name: String,
    pub license_number: String,
    pub email: Option<String>,
    #[serde(default)]
    pub specialties: Vec<Specialty>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Recurring weekly interval during which a physician takes appointments.
///
/// `weekday` is ISO numbered: Monday = 1 .. Sunday = 7.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub physician_id: Uuid,
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePhysicianRequest {
    /// User account id of the physician.
    pub id: Uuid,
    pub full_name: String,
    pub license_number: String,
    pub email: Option<String>,
    #[serde(default)]
    pub specialty_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePhysicianRequest {
    pub full_name: Option<String>,
    pub license_number: Option<String>,
    pub email: Option<String>,
    /// Replaces the whole specialty set when present.
    pub specialty_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecialtyRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAvailabilityWindowRequest {
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAvailabilityWindowRequest {
    pub weekday: Option<u8>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Error)]
pub enum PhysicianError {
    #[error("Physician {0} not found")]
    PhysicianNotFound(Uuid),

    #[error("Specialty {0} not found")]
    SpecialtyNotFound(Uuid),

    #[error("Availability window {0} not found")]
    WindowNotFound(Uuid),

    #[error("Weekday must be between 1 (Monday) and 7 (Sunday), got {0}")]
    InvalidWeekday(u8),

    #[error("One or more specialties do not exist")]
    UnknownSpecialty,

    #[error("License number {0} is already registered")]
    DuplicateLicense(String),

    #[error("Specialty {0} already exists")]
    DuplicateSpecialty(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl PhysicianError {
    pub(crate) fn database(err: anyhow::Error) -> Self {
        PhysicianError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PhysicianError {
    fn from(err: serde_json::Error) -> Self {
        PhysicianError::Database(format!("Unexpected row shape: {}", err))
    }
}

/// True when `err` is a unique violation reported by the database.
pub(crate) fn is_unique_violation(err: &anyhow::Error) -> bool {
    SupabaseError::from_anyhow(err).is_some_and(SupabaseError::is_unique_violation)
}

pub(crate) fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    SupabaseError::from_anyhow(err).is_some_and(SupabaseError::is_foreign_key_violation)
}

impl From<PhysicianError> for AppError {
    fn from(err: PhysicianError) -> Self {
        match err {
            PhysicianError::PhysicianNotFound(_)
            | PhysicianError::SpecialtyNotFound(_)
            | PhysicianError::WindowNotFound(_) => AppError::NotFound(err.to_string()),
            PhysicianError::InvalidWeekday(_) | PhysicianError::UnknownSpecialty => {
                AppError::BadRequest(err.to_string())
            }
            PhysicianError::DuplicateLicense(_) | PhysicianError::DuplicateSpecialty(_) => {
                AppError::Conflict(err.to_string())
            }
            PhysicianError::Database(msg) => AppError::Database(msg),
        }
    }
}
