use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    normalize_national_id, supabase_error, CreatePatientRequest, Patient, PatientError,
    PatientSearchQuery, UpdatePatientRequest,
};

const DEFAULT_PAGE_SIZE: u32 = 50;

pub struct PatientService {
    supabase: Arc<SupabaseClient>,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let national_id = normalize_national_id(&request.national_id)?;
        validate_birth_date(request.birth_date)?;

        debug!("Creating patient record {}", request.id);

        let patient_data = json!({
            "id": request.id,
            "full_name": request.full_name.trim(),
            "email": request.email,
            "national_id": national_id,
            "birth_date": request.birth_date,
            "insurance_plan_id": request.insurance_plan_id,
        });

        let rows = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/patients", Some(auth_token), Some(patient_data))
            .await
            .map_err(|e| write_error(e, &national_id))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Patient insert returned no row".to_string()))?;
        let patient: Patient = serde_json::from_value(row)?;

        info!("Patient record {} created", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient record {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(PatientError::database)?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(PatientError::NotFound(patient_id))?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let mut update_data = Map::new();
        let mut national_id = String::new();

        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(raw) = request.national_id {
            national_id = normalize_national_id(&raw)?;
            update_data.insert("national_id".to_string(), json!(national_id));
        }
        if let Some(birth_date) = request.birth_date {
            validate_birth_date(birth_date)?;
            update_data.insert("birth_date".to_string(), json!(birth_date));
        }
        if let Some(plan) = request.insurance_plan_id {
            update_data.insert("insurance_plan_id".to_string(), json!(plan));
        }

        if update_data.is_empty() {
            return self.get_patient(patient_id, auth_token).await;
        }

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows = self
            .supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(Value::Object(update_data)))
            .await
            .map_err(|e| write_error(e, &national_id))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(PatientError::NotFound(patient_id))?;

        info!("Patient record {} updated", patient_id);
        Ok(serde_json::from_value(row)?)
    }

    /// Deletes the patient; their appointments go with it.
    pub async fn delete_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<(), PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows = self
            .supabase
            .write_returning(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(PatientError::database)?;

        if rows.is_empty() {
            return Err(PatientError::NotFound(patient_id));
        }

        info!("Patient record {} deleted", patient_id);
        Ok(())
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let mut query_parts = vec!["order=full_name.asc".to_string()];

        if let Some(name) = query.name.filter(|n| !n.trim().is_empty()) {
            query_parts.push(format!(
                "full_name=ilike.{}",
                urlencoding::encode(&format!("*{}*", name.trim()))
            ));
        }
        if let Some(raw) = query.national_id {
            query_parts.push(format!("national_id=eq.{}", normalize_national_id(&raw)?));
        }

        query_parts.push(format!("limit={}", query.limit.unwrap_or(DEFAULT_PAGE_SIZE)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!("/rest/v1/patients?{}", query_parts.join("&"));
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(PatientError::database)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(PatientError::from))
            .collect()
    }
}

fn validate_birth_date(birth_date: NaiveDate) -> Result<(), PatientError> {
    if birth_date > Utc::now().date_naive() {
        return Err(PatientError::InvalidBirthDate);
    }
    Ok(())
}

fn write_error(err: anyhow::Error, national_id: &str) -> PatientError {
    match supabase_error(&err) {
        Some(db) if db.violates("patients_pkey") => PatientError::AlreadyRegistered,
        Some(db) if db.is_unique_violation() => {
            PatientError::DuplicateNationalId(national_id.to_string())
        }
        Some(db) if db.is_foreign_key_violation() && db.to_string().contains("insurance_plan") => {
            PatientError::UnknownInsurancePlan
        }
        _ => PatientError::database(err),
    }
}
