use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::Caller;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, CreateAppointmentRequest,
    UpdateAppointmentRequest,
};
use crate::services::first_row;

const DEFAULT_PAGE_SIZE: u32 = 100;

/// Appointment reads and direct writes outside the booking flow.
///
/// Direct writes skip the booking checks; the storage indexes still reject
/// double-booked rooms and patients.
pub struct AppointmentAdminService {
    supabase: Arc<SupabaseClient>,
}

impl AppointmentAdminService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_appointments(
        &self,
        query: AppointmentQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec!["order=scheduled_at.asc".to_string()];

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(physician_id) = query.physician_id {
            query_parts.push(format!("physician_id=eq.{}", physician_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from) = query.from {
            query_parts.push(format!("scheduled_at=gte.{}", urlencoding::encode(&from.to_rfc3339())));
        }
        if let Some(to) = query.to {
            query_parts.push(format!("scheduled_at=lte.{}", urlencoding::encode(&to.to_rfc3339())));
        }
        query_parts.push(format!("limit={}", query.limit.unwrap_or(DEFAULT_PAGE_SIZE)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        debug!("Listing appointments: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(AppointmentError::database)
    }

    /// The caller's own appointments: a patient's bookings or a physician's agenda.
    pub async fn list_for_caller(
        &self,
        caller: &Caller,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query = match *caller {
            Caller::Patient { patient_id } => AppointmentQuery {
                patient_id: Some(patient_id),
                ..AppointmentQuery::default()
            },
            Caller::Physician { physician_id } => AppointmentQuery {
                physician_id: Some(physician_id),
                ..AppointmentQuery::default()
            },
            Caller::Administrator => return Err(AppointmentError::Unauthorized),
        };

        self.list_appointments(query, auth_token).await
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(AppointmentError::database)?;

        first_row(rows)?.ok_or(AppointmentError::NotFound(appointment_id))
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let body = json!({
            "patient_id": request.patient_id,
            "physician_id": request.physician_id,
            "room_id": request.room_id,
            "scheduled_at": request.scheduled_at.to_rfc3339(),
            "status": request.status,
        });

        let rows = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/appointments", Some(auth_token), Some(body))
            .await
            .map_err(write_error)?;

        let appointment: Appointment = first_row(rows)?.ok_or_else(|| {
            AppointmentError::DatabaseError("Appointment insert returned no row".to_string())
        })?;

        info!("Appointment {} created by administrator", appointment.id);
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut changes = Map::new();
        if let Some(patient_id) = request.patient_id {
            changes.insert("patient_id".to_string(), json!(patient_id));
        }
        if let Some(physician_id) = request.physician_id {
            changes.insert("physician_id".to_string(), json!(physician_id));
        }
        if let Some(room_id) = request.room_id {
            changes.insert("room_id".to_string(), json!(room_id));
        }
        if let Some(scheduled_at) = request.scheduled_at {
            changes.insert("scheduled_at".to_string(), json!(scheduled_at.to_rfc3339()));
        }
        if let Some(status) = request.status {
            changes.insert("status".to_string(), json!(status));
        }

        if changes.is_empty() {
            return self.get_appointment(appointment_id, auth_token).await;
        }

        self.patch(appointment_id, Value::Object(changes), auth_token).await
    }

    pub async fn set_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .patch(appointment_id, json!({ "status": status }), auth_token)
            .await?;

        info!("Appointment {} is now {}", appointment_id, status);
        Ok(appointment)
    }

    async fn patch(
        &self,
        appointment_id: Uuid,
        changes: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows = self
            .supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(changes))
            .await
            .map_err(write_error)?;

        first_row(rows)?.ok_or(AppointmentError::NotFound(appointment_id))
    }
}

fn write_error(err: anyhow::Error) -> AppointmentError {
    match SupabaseError::from_anyhow(&err) {
        Some(db) if db.is_unique_violation() => AppointmentError::SlotConflict(db.to_string()),
        Some(db) if db.is_foreign_key_violation() => AppointmentError::InvalidReference,
        _ => AppointmentError::database(err),
    }
}
