use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

/// Only one non-cancelled appointment may hold a room at a given instant.
pub const ROOM_SLOT_CONSTRAINT: &str = "appointments_active_room_slot_key";
/// A patient may hold only one non-cancelled appointment at a given instant.
pub const PATIENT_SLOT_CONSTRAINT: &str = "appointments_active_patient_slot_key";
/// One visit record per appointment.
pub const VISIT_RECORD_CONSTRAINT: &str = "visit_records_appointment_id_key";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub physician_id: Uuid,
    pub room_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    /// Set by the database on insert and never updated.
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Cancelled appointments hold no room or patient slot and take no visit record.
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub description: String,
    pub prescription: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful booking.
///
/// `warning` is set when the appointment was stored but the confirmation
/// could not be delivered.
#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub message: String,
    pub warning: Option<String>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RoomRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Direct appointment write by an administrator.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub physician_id: Uuid,
    pub room_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub physician_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    pub patient_id: Option<Uuid>,
    pub physician_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVisitRecordRequest {
    pub description: String,
    pub prescription: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVisitRecordRequest {
    pub description: Option<String>,
    pub prescription: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

/// Human-readable form of a slot instant used in messages.
pub fn display_instant(at: &DateTime<Utc>) -> String {
    at.format("%d/%m/%Y at %H:%M").to_string()
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Only patients can book appointments")]
    RoleNotAuthorized,

    #[error("You already have an appointment on {}", display_instant(.at))]
    DuplicatePatientBooking { at: DateTime<Utc> },

    #[error("No room is available on {}; please choose another time", display_instant(.at))]
    NoRoomAvailable { at: DateTime<Utc> },

    #[error("Physician {0} not found")]
    PhysicianNotFound(Uuid),

    #[error("Patient {0} not found")]
    PatientNotFound(Uuid),

    #[error("{} is not one of the physician's available slots", display_instant(.at))]
    SlotOutsideAvailability { at: DateTime<Utc> },

    #[error("Invalid slot '{0}', expected YYYY-MM-DD-HH-MM")]
    InvalidSlot(String),

    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Room {0} not found")]
    RoomNotFound(Uuid),

    #[error("Room {0} is referenced by appointments and cannot be deleted")]
    RoomInUse(Uuid),

    #[error("Appointment conflicts with an existing booking: {0}")]
    SlotConflict(String),

    #[error("Unknown patient, physician or room")]
    InvalidReference,

    #[error("Appointment {0} already has a visit record")]
    VisitRecordExists(Uuid),

    #[error("Visit record not found")]
    VisitRecordNotFound,

    #[error("Appointment {0} is cancelled")]
    AppointmentCancelled(Uuid),

    #[error("Not allowed to access this appointment")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AppointmentError {
    pub(crate) fn database(err: anyhow::Error) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppointmentError {
    fn from(err: serde_json::Error) -> Self {
        AppointmentError::DatabaseError(format!("Unexpected row shape: {}", err))
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::RoleNotAuthorized | AppointmentError::Unauthorized => {
                AppError::Forbidden(err.to_string())
            }
            AppointmentError::DuplicatePatientBooking { .. }
            | AppointmentError::NoRoomAvailable { .. }
            | AppointmentError::RoomInUse(_)
            | AppointmentError::SlotConflict(_)
            | AppointmentError::VisitRecordExists(_) => AppError::Conflict(err.to_string()),
            AppointmentError::PhysicianNotFound(_)
            | AppointmentError::PatientNotFound(_)
            | AppointmentError::NotFound(_)
            | AppointmentError::RoomNotFound(_)
            | AppointmentError::VisitRecordNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotOutsideAvailability { .. }
            | AppointmentError::InvalidSlot(_)
            | AppointmentError::InvalidReference
            | AppointmentError::AppointmentCancelled(_) => AppError::BadRequest(err.to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
