use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{is_unique_violation, PhysicianError, Specialty, SpecialtyRequest};

pub struct SpecialtyService {
    supabase: Arc<SupabaseClient>,
}

impl SpecialtyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_specialties(&self, auth_token: Option<&str>) -> Result<Vec<Specialty>, PhysicianError> {
        let rows: Vec<Specialty> = self
            .supabase
            .request(Method::GET, "/rest/v1/specialties?order=name.asc", auth_token, None)
            .await
            .map_err(PhysicianError::database)?;
        Ok(rows)
    }

    pub async fn create_specialty(
        &self,
        request: SpecialtyRequest,
        auth_token: &str,
    ) -> Result<Specialty, PhysicianError> {
        let name = request.name.trim().to_string();
        let rows = self
            .supabase
            .write_returning(
                Method::POST,
                "/rest/v1/specialties",
                Some(auth_token),
                Some(json!({ "name": name })),
            )
            .await
            .map_err(|e| unique_as_duplicate(e, &name))?;

        let specialty = first_row(rows)?;
        info!("Specialty {} created", specialty.name);
        Ok(specialty)
    }

    pub async fn update_specialty(
        &self,
        specialty_id: Uuid,
        request: SpecialtyRequest,
        auth_token: &str,
    ) -> Result<Specialty, PhysicianError> {
        let name = request.name.trim().to_string();
        let path = format!("/rest/v1/specialties?id=eq.{}", specialty_id);
        let rows = self
            .supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(json!({ "name": name })))
            .await
            .map_err(|e| unique_as_duplicate(e, &name))?;

        if rows.is_empty() {
            return Err(PhysicianError::SpecialtyNotFound(specialty_id));
        }
        first_row(rows)
    }

    pub async fn delete_specialty(&self, specialty_id: Uuid, auth_token: &str) -> Result<(), PhysicianError> {
        let path = format!("/rest/v1/specialties?id=eq.{}", specialty_id);
        let rows = self
            .supabase
            .write_returning(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(PhysicianError::database)?;

        if rows.is_empty() {
            return Err(PhysicianError::SpecialtyNotFound(specialty_id));
        }

        info!("Specialty {} deleted", specialty_id);
        Ok(())
    }
}

fn unique_as_duplicate(err: anyhow::Error, name: &str) -> PhysicianError {
    if is_unique_violation(&err) {
        PhysicianError::DuplicateSpecialty(name.to_string())
    } else {
        PhysicianError::database(err)
    }
}

fn first_row(rows: Vec<Value>) -> Result<Specialty, PhysicianError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| PhysicianError::Database("Specialty write returned no row".to_string()))?;
    Ok(serde_json::from_value(row)?)
}
