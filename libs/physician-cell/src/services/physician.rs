use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    is_foreign_key_violation, is_unique_violation, CreatePhysicianRequest, Physician,
    PhysicianError, UpdatePhysicianRequest,
};

const PHYSICIAN_SELECT: &str = "select=*,specialties(id,name)";

pub struct PhysicianService {
    supabase: Arc<SupabaseClient>,
}

impl PhysicianService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn list_physicians(&self, auth_token: Option<&str>) -> Result<Vec<Physician>, PhysicianError> {
        debug!("Listing physicians");

        let path = format!("/rest/v1/physicians?{}&order=full_name.asc", PHYSICIAN_SELECT);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(PhysicianError::database)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(PhysicianError::from))
            .collect()
    }

    pub async fn get_physician(
        &self,
        physician_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Physician, PhysicianError> {
        debug!("Fetching physician {}", physician_id);

        let path = format!("/rest/v1/physicians?{}&id=eq.{}", PHYSICIAN_SELECT, physician_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(PhysicianError::database)?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(PhysicianError::PhysicianNotFound(physician_id))?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn create_physician(
        &self,
        request: CreatePhysicianRequest,
        auth_token: &str,
    ) -> Result<Physician, PhysicianError> {
        debug!("Creating physician profile for {}", request.full_name);

        let body = json!({
            "id": request.id,
            "full_name": request.full_name,
            "license_number": request.license_number,
            "email": request.email,
        });

        self.supabase
            .write_returning(Method::POST, "/rest/v1/physicians", Some(auth_token), Some(body))
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PhysicianError::DuplicateLicense(request.license_number.clone())
                } else {
                    PhysicianError::database(e)
                }
            })?;

        self.insert_specialties(request.id, &request.specialty_ids, auth_token).await?;

        info!("Physician {} created", request.id);
        self.get_physician(request.id, Some(auth_token)).await
    }

    pub async fn update_physician(
        &self,
        physician_id: Uuid,
        request: UpdatePhysicianRequest,
        auth_token: &str,
    ) -> Result<Physician, PhysicianError> {
        // 404 before touching anything
        self.get_physician(physician_id, Some(auth_token)).await?;

        let mut changes = Map::new();
        if let Some(name) = request.full_name {
            changes.insert("full_name".to_string(), json!(name));
        }
        if let Some(license) = &request.license_number {
            changes.insert("license_number".to_string(), json!(license));
        }
        if let Some(email) = request.email {
            changes.insert("email".to_string(), json!(email));
        }

        if !changes.is_empty() {
            let path = format!("/rest/v1/physicians?id=eq.{}", physician_id);
            self.supabase
                .write_returning(Method::PATCH, &path, Some(auth_token), Some(Value::Object(changes)))
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        PhysicianError::DuplicateLicense(request.license_number.clone().unwrap_or_default())
                    } else {
                        PhysicianError::database(e)
                    }
                })?;
        }

        if let Some(specialty_ids) = request.specialty_ids {
            let path = format!("/rest/v1/physician_specialties?physician_id=eq.{}", physician_id);
            self.supabase
                .write_returning(Method::DELETE, &path, Some(auth_token), None)
                .await
                .map_err(PhysicianError::database)?;

            self.insert_specialties(physician_id, &specialty_ids, auth_token).await?;
        }

        info!("Physician {} updated", physician_id);
        self.get_physician(physician_id, Some(auth_token)).await
    }

    /// Deletes the physician; windows and appointments go with it.
    pub async fn delete_physician(&self, physician_id: Uuid, auth_token: &str) -> Result<(), PhysicianError> {
        let path = format!("/rest/v1/physicians?id=eq.{}", physician_id);
        let rows = self
            .supabase
            .write_returning(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(PhysicianError::database)?;

        if rows.is_empty() {
            return Err(PhysicianError::PhysicianNotFound(physician_id));
        }

        info!("Physician {} deleted", physician_id);
        Ok(())
    }

    async fn insert_specialties(
        &self,
        physician_id: Uuid,
        specialty_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<(), PhysicianError> {
        if specialty_ids.is_empty() {
            return Ok(());
        }

        let links: Vec<Value> = specialty_ids
            .iter()
            .map(|specialty_id| json!({ "physician_id": physician_id, "specialty_id": specialty_id }))
            .collect();

        self.supabase
            .write_returning(
                Method::POST,
                "/rest/v1/physician_specialties",
                Some(auth_token),
                Some(Value::Array(links)),
            )
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PhysicianError::UnknownSpecialty
                } else {
                    PhysicianError::database(e)
                }
            })?;

        Ok(())
    }
}
