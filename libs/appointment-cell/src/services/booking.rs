use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::{notifier_from_config, Notifier};
use patient_cell::{PatientError, PatientService};
use physician_cell::{AvailabilityService, PhysicianError, PhysicianService};
use shared_config::{AppConfig, SchedulingPolicy};
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::Caller;

use crate::models::{
    display_instant, Appointment, AppointmentError, AppointmentStatus, BookingOutcome, Room,
    PATIENT_SLOT_CONSTRAINT, ROOM_SLOT_CONSTRAINT,
};
use crate::services::first_row;

#[derive(Debug, Deserialize)]
struct OccupiedRoom {
    room_id: Uuid,
}

/// Rooms not occupied at the instant, in listing order.
pub fn free_rooms(rooms: &[Room], occupied: &HashSet<Uuid>) -> Vec<Uuid> {
    rooms
        .iter()
        .map(|room| room.id)
        .filter(|id| !occupied.contains(id))
        .collect()
}

pub fn confirmation_message(physician_name: &str, at: &DateTime<Utc>) -> String {
    format!(
        "Your appointment with Dr(a). {} is confirmed for {}.",
        physician_name,
        display_instant(at)
    )
}

/// Validates and commits patient bookings.
///
/// Room and patient exclusivity are backed by partial unique indexes on
/// `appointments`, so a lost race surfaces as a unique violation on insert
/// and the next free room is tried.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    physicians: PhysicianService,
    patients: PatientService,
    availability: AvailabilityService,
    notifier: Arc<dyn Notifier>,
    policy: SchedulingPolicy,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_notifier(config, notifier_from_config(config))
    }

    pub fn with_notifier(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            physicians: PhysicianService::with_client(Arc::clone(&supabase)),
            patients: PatientService::with_client(Arc::clone(&supabase)),
            availability: AvailabilityService::with_client(
                Arc::clone(&supabase),
                config.scheduling.clone(),
            ),
            supabase,
            notifier,
            policy: config.scheduling.clone(),
        }
    }

    /// Books `scheduled_at` with the physician for the calling patient.
    ///
    /// Checks run in order and the first failure wins; nothing is written
    /// unless every check passes.
    pub async fn book(
        &self,
        caller: &Caller,
        physician_id: Uuid,
        scheduled_at: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<BookingOutcome, AppointmentError> {
        // **Step 1: Role**
        let Caller::Patient { patient_id } = *caller else {
            return Err(AppointmentError::RoleNotAuthorized);
        };

        info!(
            "Booking {} with physician {} for patient {}",
            scheduled_at, physician_id, patient_id
        );

        // **Step 2: Referenced records**
        let patient = self
            .patients
            .get_patient(patient_id, auth_token)
            .await
            .map_err(|e| match e {
                PatientError::NotFound(id) => AppointmentError::PatientNotFound(id),
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        let physician = self
            .physicians
            .get_physician(physician_id, Some(auth_token))
            .await
            .map_err(|e| match e {
                PhysicianError::PhysicianNotFound(id) => AppointmentError::PhysicianNotFound(id),
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        if self.policy.require_availability_window {
            let within = self
                .availability
                .is_within_availability(physician_id, scheduled_at, Some(auth_token))
                .await
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

            if !within {
                return Err(AppointmentError::SlotOutsideAvailability { at: scheduled_at });
            }
        }

        // **Step 3: Patient already booked at this instant, with anyone**
        if self.patient_has_booking(patient_id, scheduled_at, auth_token).await? {
            return Err(AppointmentError::DuplicatePatientBooking { at: scheduled_at });
        }

        // **Step 4: Free rooms at this instant, across all physicians**
        let candidates = self.free_rooms_at(scheduled_at, auth_token).await?;
        if candidates.is_empty() {
            return Err(AppointmentError::NoRoomAvailable { at: scheduled_at });
        }

        // **Step 5: Insert, moving on to the next room if one was taken meanwhile**
        let appointment = self
            .insert_first_free(patient_id, physician_id, scheduled_at, &candidates, auth_token)
            .await?;

        info!(
            "Appointment {} booked in room {} at {}",
            appointment.id, appointment.room_id, appointment.scheduled_at
        );

        // **Step 6: Confirmation, best effort**
        let message = confirmation_message(&physician.full_name, &appointment.scheduled_at);
        let warning = match patient.email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(address) => match self.notifier.send(address, &message).await {
                Ok(()) => None,
                Err(e) => {
                    warn!("Confirmation for appointment {} not delivered: {}", appointment.id, e);
                    Some(format!(
                        "Appointment booked, but the confirmation could not be sent: {}",
                        e
                    ))
                }
            },
            None => {
                warn!("Patient {} has no email address, confirmation skipped", patient_id);
                Some("Appointment booked, but no email address is on file for confirmation".to_string())
            }
        };

        Ok(BookingOutcome {
            appointment,
            message,
            warning,
        })
    }

    async fn patient_has_booking(
        &self,
        patient_id: Uuid,
        at: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?select=id&patient_id=eq.{}&scheduled_at=eq.{}&status=neq.cancelled",
            patient_id,
            urlencoding::encode(&at.to_rfc3339())
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(AppointmentError::database)?;

        Ok(!rows.is_empty())
    }

    async fn free_rooms_at(
        &self,
        at: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Uuid>, AppointmentError> {
        let rooms: Vec<Room> = self
            .supabase
            .request(Method::GET, "/rest/v1/rooms?order=name.asc", Some(auth_token), None)
            .await
            .map_err(AppointmentError::database)?;

        let path = format!(
            "/rest/v1/appointments?select=room_id&scheduled_at=eq.{}&status=neq.cancelled",
            urlencoding::encode(&at.to_rfc3339())
        );
        let occupied: Vec<OccupiedRoom> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(AppointmentError::database)?;

        let occupied: HashSet<Uuid> = occupied.into_iter().map(|row| row.room_id).collect();
        let free = free_rooms(&rooms, &occupied);

        debug!(
            "{} of {} rooms free at {}",
            free.len(),
            rooms.len(),
            at
        );
        Ok(free)
    }

    async fn insert_first_free(
        &self,
        patient_id: Uuid,
        physician_id: Uuid,
        at: DateTime<Utc>,
        candidates: &[Uuid],
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        for room_id in candidates {
            let body = json!({
                "patient_id": patient_id,
                "physician_id": physician_id,
                "room_id": room_id,
                "scheduled_at": at.to_rfc3339(),
                "status": AppointmentStatus::Scheduled,
            });

            match self
                .supabase
                .write_returning(Method::POST, "/rest/v1/appointments", Some(auth_token), Some(body))
                .await
            {
                Ok(rows) => {
                    return first_row(rows)?.ok_or_else(|| {
                        AppointmentError::DatabaseError("Appointment insert returned no row".to_string())
                    });
                }
                Err(e) => match SupabaseError::from_anyhow(&e) {
                    Some(db) if db.violates(ROOM_SLOT_CONSTRAINT) => {
                        warn!("Room {} was taken at {} by a concurrent booking", room_id, at);
                        continue;
                    }
                    Some(db) if db.violates(PATIENT_SLOT_CONSTRAINT) => {
                        return Err(AppointmentError::DuplicatePatientBooking { at });
                    }
                    Some(db) if db.is_foreign_key_violation() => {
                        return Err(AppointmentError::InvalidReference);
                    }
                    _ => return Err(AppointmentError::database(e)),
                },
            }
        }

        Err(AppointmentError::NoRoomAvailable { at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn room(name: &str) -> Room {
        Room {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn free_rooms_keeps_listing_order() {
        let rooms = vec![room("A"), room("B"), room("C")];
        let occupied = HashSet::from([rooms[1].id]);

        assert_eq!(free_rooms(&rooms, &occupied), vec![rooms[0].id, rooms[2].id]);
    }

    #[test]
    fn all_rooms_occupied_leaves_nothing() {
        let rooms = vec![room("A"), room("B")];
        let occupied: HashSet<Uuid> = rooms.iter().map(|r| r.id).collect();

        assert!(free_rooms(&rooms, &occupied).is_empty());
        assert!(free_rooms(&[], &HashSet::new()).is_empty());
    }

    #[test]
    fn confirmation_names_physician_and_time() {
        let at = Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap();
        assert_eq!(
            confirmation_message("Helena Costa", &at),
            "Your appointment with Dr(a). Helena Costa is confirmed for 02/06/2025 at 14:00."
        );
    }
}
