use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{AppointmentError, Room, RoomRequest};
use crate::services::first_row;

pub struct RoomService {
    supabase: Arc<SupabaseClient>,
}

impl RoomService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_rooms(&self, auth_token: &str) -> Result<Vec<Room>, AppointmentError> {
        self.supabase
            .request(Method::GET, "/rest/v1/rooms?order=name.asc", Some(auth_token), None)
            .await
            .map_err(AppointmentError::database)
    }

    pub async fn create_room(&self, request: RoomRequest, auth_token: &str) -> Result<Room, AppointmentError> {
        let body = json!({
            "name": request.name.trim(),
            "description": request.description,
        });

        let rows = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/rooms", Some(auth_token), Some(body))
            .await
            .map_err(AppointmentError::database)?;

        let room: Room = first_row(rows)?
            .ok_or_else(|| AppointmentError::DatabaseError("Room insert returned no row".to_string()))?;

        info!("Room {} ({}) created", room.name, room.id);
        Ok(room)
    }

    pub async fn update_room(
        &self,
        room_id: Uuid,
        request: RoomRequest,
        auth_token: &str,
    ) -> Result<Room, AppointmentError> {
        let body = json!({
            "name": request.name.trim(),
            "description": request.description,
        });

        let path = format!("/rest/v1/rooms?id=eq.{}", room_id);
        let rows: Vec<Value> = self
            .supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(AppointmentError::database)?;

        first_row(rows)?.ok_or(AppointmentError::RoomNotFound(room_id))
    }

    /// Rooms referenced by any appointment, cancelled or not, are kept.
    pub async fn delete_room(&self, room_id: Uuid, auth_token: &str) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/rooms?id=eq.{}", room_id);
        let rows = self
            .supabase
            .write_returning(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| match SupabaseError::from_anyhow(&e) {
                Some(db) if db.is_foreign_key_violation() => {
                    warn!("Refusing to delete room {}: referenced by appointments", room_id);
                    AppointmentError::RoomInUse(room_id)
                }
                _ => AppointmentError::database(e),
            })?;

        if rows.is_empty() {
            return Err(AppointmentError::RoomNotFound(room_id));
        }

        info!("Room {} deleted", room_id);
        Ok(())
    }
}
