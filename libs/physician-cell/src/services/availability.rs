use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingPolicy};
use shared_database::supabase::SupabaseClient;

use crate::models::{
    is_foreign_key_violation, AvailabilityWindow, CreateAvailabilityWindowRequest,
    PhysicianError, UpdateAvailabilityWindowRequest,
};
use crate::services::slots::{compute_slots, is_slot_start};

#[derive(Debug, Deserialize)]
struct BookedRow {
    scheduled_at: DateTime<Utc>,
}

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    policy: SchedulingPolicy,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config.scheduling.clone())
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, policy: SchedulingPolicy) -> Self {
        Self { supabase, policy }
    }

    /// All windows of a physician, ordered by weekday then start time.
    pub async fn list_windows(
        &self,
        physician_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityWindow>, PhysicianError> {
        debug!("Fetching availability windows for physician {}", physician_id);

        let path = format!(
            "/rest/v1/availability_windows?physician_id=eq.{}&order=weekday.asc,start_time.asc",
            physician_id
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(PhysicianError::database)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(PhysicianError::from))
            .collect()
    }

    /// Timestamps of the physician's non-cancelled appointments at or after `now`.
    pub async fn booked_slots(
        &self,
        physician_id: Uuid,
        now: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<HashSet<DateTime<Utc>>, PhysicianError> {
        let path = format!(
            "/rest/v1/appointments?select=scheduled_at&physician_id=eq.{}&status=neq.cancelled&scheduled_at=gte.{}",
            physician_id,
            urlencoding::encode(&now.to_rfc3339())
        );
        let rows: Vec<BookedRow> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(PhysicianError::database)?;

        Ok(rows.into_iter().map(|row| row.scheduled_at).collect())
    }

    /// Bookable slot starts for the physician over the configured horizon.
    ///
    /// Read-only: nothing is written.
    pub async fn resolve_slots(
        &self,
        physician_id: Uuid,
        from_date: NaiveDate,
        now: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Vec<DateTime<Utc>>, PhysicianError> {
        let (windows, booked) = try_join(
            self.list_windows(physician_id, auth_token),
            self.booked_slots(physician_id, now, auth_token),
        )
        .await?;

        let slots = compute_slots(&windows, &booked, from_date, now, &self.policy);
        debug!(
            "Resolved {} slots for physician {} from {} ({} windows, {} booked)",
            slots.len(),
            physician_id,
            from_date,
            windows.len(),
            booked.len()
        );

        Ok(slots)
    }

    /// Whether `at` is a slot start generated by one of the physician's windows.
    pub async fn is_within_availability(
        &self,
        physician_id: Uuid,
        at: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<bool, PhysicianError> {
        let windows = self.list_windows(physician_id, auth_token).await?;
        Ok(is_slot_start(&windows, at, &self.policy))
    }

    pub async fn get_window(
        &self,
        window_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<AvailabilityWindow, PhysicianError> {
        let path = format!("/rest/v1/availability_windows?id=eq.{}", window_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(PhysicianError::database)?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(PhysicianError::WindowNotFound(window_id))?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn create_window(
        &self,
        physician_id: Uuid,
        request: CreateAvailabilityWindowRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, PhysicianError> {
        validate_weekday(request.weekday)?;
        warn_if_empty(request.start_time, request.end_time);

        let body = json!({
            "physician_id": physician_id,
            "weekday": request.weekday,
            "start_time": request.start_time,
            "end_time": request.end_time,
        });

        let rows = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/availability_windows", Some(auth_token), Some(body))
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PhysicianError::PhysicianNotFound(physician_id)
                } else {
                    PhysicianError::database(e)
                }
            })?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| PhysicianError::Database("Window insert returned no row".to_string()))?;
        let window: AvailabilityWindow = serde_json::from_value(row)?;

        info!(
            "Created availability window {} for physician {} (weekday {})",
            window.id, physician_id, window.weekday
        );
        Ok(window)
    }

    pub async fn update_window(
        &self,
        window_id: Uuid,
        request: UpdateAvailabilityWindowRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, PhysicianError> {
        let current = self.get_window(window_id, Some(auth_token)).await?;

        let mut changes = Map::new();
        if let Some(weekday) = request.weekday {
            validate_weekday(weekday)?;
            changes.insert("weekday".to_string(), json!(weekday));
        }
        if let Some(start) = request.start_time {
            changes.insert("start_time".to_string(), json!(start));
        }
        if let Some(end) = request.end_time {
            changes.insert("end_time".to_string(), json!(end));
        }

        if changes.is_empty() {
            return Ok(current);
        }

        warn_if_empty(
            request.start_time.unwrap_or(current.start_time),
            request.end_time.unwrap_or(current.end_time),
        );

        let path = format!("/rest/v1/availability_windows?id=eq.{}", window_id);
        let rows = self
            .supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(Value::Object(changes)))
            .await
            .map_err(PhysicianError::database)?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(PhysicianError::WindowNotFound(window_id))?;

        info!("Updated availability window {}", window_id);
        Ok(serde_json::from_value(row)?)
    }

    pub async fn delete_window(&self, window_id: Uuid, auth_token: &str) -> Result<(), PhysicianError> {
        let path = format!("/rest/v1/availability_windows?id=eq.{}", window_id);
        let rows = self
            .supabase
            .write_returning(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(PhysicianError::database)?;

        if rows.is_empty() {
            return Err(PhysicianError::WindowNotFound(window_id));
        }

        info!("Deleted availability window {}", window_id);
        Ok(())
    }
}

fn validate_weekday(weekday: u8) -> Result<(), PhysicianError> {
    if (1..=7).contains(&weekday) {
        Ok(())
    } else {
        Err(PhysicianError::InvalidWeekday(weekday))
    }
}

// start >= end is stored as-is; such a window simply produces no slots
fn warn_if_empty(start: chrono::NaiveTime, end: chrono::NaiveTime) {
    if start >= end {
        warn!("Availability window {} - {} is empty and will produce no slots", start, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn weekday_range() {
        assert!(validate_weekday(1).is_ok());
        assert!(validate_weekday(7).is_ok());
        assert_matches!(validate_weekday(0), Err(PhysicianError::InvalidWeekday(0)));
        assert_matches!(validate_weekday(8), Err(PhysicianError::InvalidWeekday(8)));
    }
}
