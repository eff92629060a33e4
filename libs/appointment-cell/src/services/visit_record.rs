use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::Caller;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CreateVisitRecordRequest,
    UpdateVisitRecordRequest, VisitRecord, VISIT_RECORD_CONSTRAINT,
};
use crate::services::{first_row, AppointmentAdminService};

pub struct VisitRecordService {
    supabase: Arc<SupabaseClient>,
    appointments: AppointmentAdminService,
}

/// The appointment's physician, or an administrator.
fn can_write(caller: &Caller, appointment: &Appointment) -> bool {
    match *caller {
        Caller::Administrator => true,
        Caller::Physician { physician_id } => physician_id == appointment.physician_id,
        Caller::Patient { .. } => false,
    }
}

/// Anyone taking part in the appointment, or an administrator.
fn can_read(caller: &Caller, appointment: &Appointment) -> bool {
    match *caller {
        Caller::Patient { patient_id } => patient_id == appointment.patient_id,
        Caller::Physician { .. } | Caller::Administrator => can_write(caller, appointment),
    }
}

impl VisitRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            appointments: AppointmentAdminService::new(config),
        }
    }

    /// Records the visit once and marks the appointment completed.
    ///
    /// The record is the committed effect. Completing the appointment is
    /// best effort, and a later attempt that finds the record finishes it.
    pub async fn create_record(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        request: CreateVisitRecordRequest,
        auth_token: &str,
    ) -> Result<VisitRecord, AppointmentError> {
        let appointment = self.appointments.get_appointment(appointment_id, auth_token).await?;
        if !can_write(caller, &appointment) {
            return Err(AppointmentError::Unauthorized);
        }
        if !appointment.is_active() {
            return Err(AppointmentError::AppointmentCancelled(appointment_id));
        }
        if self.find_record(appointment_id, auth_token).await?.is_some() {
            self.complete(&appointment, auth_token).await;
            return Err(AppointmentError::VisitRecordExists(appointment_id));
        }

        let body = json!({
            "appointment_id": appointment_id,
            "description": request.description,
            "prescription": request.prescription,
        });

        let rows = match self
            .supabase
            .write_returning(Method::POST, "/rest/v1/visit_records", Some(auth_token), Some(body))
            .await
        {
            Ok(rows) => rows,
            Err(e) => match SupabaseError::from_anyhow(&e) {
                Some(db) if db.violates(VISIT_RECORD_CONSTRAINT) => {
                    self.complete(&appointment, auth_token).await;
                    return Err(AppointmentError::VisitRecordExists(appointment_id));
                }
                _ => return Err(AppointmentError::database(e)),
            },
        };

        let record: VisitRecord = first_row(rows)?.ok_or_else(|| {
            AppointmentError::DatabaseError("Visit record insert returned no row".to_string())
        })?;

        info!("Visit record {} created for appointment {}", record.id, appointment_id);
        self.complete(&appointment, auth_token).await;
        Ok(record)
    }

    async fn complete(&self, appointment: &Appointment, auth_token: &str) {
        if appointment.status == AppointmentStatus::Completed {
            return;
        }

        if let Err(e) = self
            .appointments
            .set_status(appointment.id, AppointmentStatus::Completed, auth_token)
            .await
        {
            warn!(
                "Appointment {} has a visit record but is still {}: {}",
                appointment.id, appointment.status, e
            );
        }
    }

    /// Edits the text of a record; its creation time is left alone.
    pub async fn update_record(
        &self,
        caller: &Caller,
        record_id: Uuid,
        request: UpdateVisitRecordRequest,
        auth_token: &str,
    ) -> Result<VisitRecord, AppointmentError> {
        let path = format!("/rest/v1/visit_records?id=eq.{}", record_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(AppointmentError::database)?;
        let current: VisitRecord = first_row(rows)?.ok_or(AppointmentError::VisitRecordNotFound)?;

        let appointment = self
            .appointments
            .get_appointment(current.appointment_id, auth_token)
            .await?;
        if !can_write(caller, &appointment) {
            return Err(AppointmentError::Unauthorized);
        }

        let mut changes = Map::new();
        if let Some(description) = request.description {
            changes.insert("description".to_string(), json!(description));
        }
        if let Some(prescription) = request.prescription {
            changes.insert("prescription".to_string(), json!(prescription));
        }
        if changes.is_empty() {
            return Ok(current);
        }

        let rows = self
            .supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(Value::Object(changes)))
            .await
            .map_err(AppointmentError::database)?;

        info!("Visit record {} updated", record_id);
        first_row(rows)?.ok_or(AppointmentError::VisitRecordNotFound)
    }

    pub async fn get_for_appointment(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<VisitRecord, AppointmentError> {
        let appointment = self.appointments.get_appointment(appointment_id, auth_token).await?;
        if !can_read(caller, &appointment) {
            return Err(AppointmentError::Unauthorized);
        }

        self.find_record(appointment_id, auth_token)
            .await?
            .ok_or(AppointmentError::VisitRecordNotFound)
    }

    async fn find_record(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<VisitRecord>, AppointmentError> {
        let path = format!("/rest/v1/visit_records?appointment_id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(AppointmentError::database)?;

        first_row(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn appointment(patient_id: Uuid, physician_id: Uuid) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            physician_id,
            room_id: Uuid::new_v4(),
            scheduled_at: Utc::now(),
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_the_treating_physician_or_admin_writes() {
        let (patient_id, physician_id) = (Uuid::new_v4(), Uuid::new_v4());
        let appt = appointment(patient_id, physician_id);

        assert!(can_write(&Caller::Physician { physician_id }, &appt));
        assert!(can_write(&Caller::Administrator, &appt));
        assert!(!can_write(&Caller::Physician { physician_id: Uuid::new_v4() }, &appt));
        assert!(!can_write(&Caller::Patient { patient_id }, &appt));
    }

    #[test]
    fn the_patient_may_read_their_own_record() {
        let (patient_id, physician_id) = (Uuid::new_v4(), Uuid::new_v4());
        let appt = appointment(patient_id, physician_id);

        assert!(can_read(&Caller::Patient { patient_id }, &appt));
        assert!(!can_read(&Caller::Patient { patient_id: Uuid::new_v4() }, &appt));
        assert!(can_read(&Caller::Physician { physician_id }, &appt));
    }
}
