use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{supabase_error, InsurancePlan, InsurancePlanRequest, PatientError};

pub struct InsurancePlanService {
    supabase: Arc<SupabaseClient>,
}

impl InsurancePlanService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_plans(&self, auth_token: Option<&str>) -> Result<Vec<InsurancePlan>, PatientError> {
        self.supabase
            .request(Method::GET, "/rest/v1/insurance_plans?order=name.asc", auth_token, None)
            .await
            .map_err(PatientError::database)
    }

    pub async fn create_plan(
        &self,
        request: InsurancePlanRequest,
        auth_token: &str,
    ) -> Result<InsurancePlan, PatientError> {
        let name = request.name.trim().to_string();
        let rows = self
            .supabase
            .write_returning(
                Method::POST,
                "/rest/v1/insurance_plans",
                Some(auth_token),
                Some(json!({ "name": name })),
            )
            .await
            .map_err(|e| duplicate_name(e, &name))?;

        let plan = single(rows)?;
        info!("Insurance plan {} created", plan.name);
        Ok(plan)
    }

    pub async fn update_plan(
        &self,
        plan_id: Uuid,
        request: InsurancePlanRequest,
        auth_token: &str,
    ) -> Result<InsurancePlan, PatientError> {
        let name = request.name.trim().to_string();
        let path = format!("/rest/v1/insurance_plans?id=eq.{}", plan_id);
        let rows = self
            .supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Some(json!({ "name": name })))
            .await
            .map_err(|e| duplicate_name(e, &name))?;

        if rows.is_empty() {
            return Err(PatientError::InsurancePlanNotFound(plan_id));
        }
        single(rows)
    }

    /// Patients on the plan keep their record with no plan.
    pub async fn delete_plan(&self, plan_id: Uuid, auth_token: &str) -> Result<(), PatientError> {
        let path = format!("/rest/v1/insurance_plans?id=eq.{}", plan_id);
        let rows = self
            .supabase
            .write_returning(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(PatientError::database)?;

        if rows.is_empty() {
            return Err(PatientError::InsurancePlanNotFound(plan_id));
        }

        info!("Insurance plan {} deleted", plan_id);
        Ok(())
    }
}

fn duplicate_name(err: anyhow::Error, name: &str) -> PatientError {
    match supabase_error(&err) {
        Some(db) if db.is_unique_violation() => PatientError::DuplicateInsurancePlan(name.to_string()),
        _ => PatientError::database(err),
    }
}

fn single(rows: Vec<Value>) -> Result<InsurancePlan, PatientError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| PatientError::DatabaseError("Insurance plan write returned no row".to_string()))?;
    Ok(serde_json::from_value(row)?)
}
