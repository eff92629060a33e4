use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::error::AppError;

/// Longest national ID the register accepts, in digits.
pub const NATIONAL_ID_MAX_DIGITS: usize = 14;

/// A patient record. The id is the patient's user account id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub national_id: String,
    pub birth_date: NaiveDate,
    pub insurance_plan_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePlan {
    pub id: Uuid,
    pub name: String,
}

/// Administrator-created patient, bound to an existing user account.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatientRequest {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub national_id: String,
    pub birth_date: NaiveDate,
    pub insurance_plan_id: Option<Uuid>,
}

/// Self-registration by a signed-in patient account.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPatientRequest {
    pub full_name: String,
    pub email: Option<String>,
    pub national_id: String,
    pub birth_date: NaiveDate,
    pub insurance_plan_id: Option<Uuid>,
}

impl RegisterPatientRequest {
    pub fn into_create(self, id: Uuid, fallback_email: Option<String>) -> CreatePatientRequest {
        CreatePatientRequest {
            id,
            full_name: self.full_name,
            email: self.email.or(fallback_email),
            national_id: self.national_id,
            birth_date: self.birth_date,
            insurance_plan_id: self.insurance_plan_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub national_id: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// `Some(None)` clears the plan.
    #[serde(default, with = "double_option")]
    pub insurance_plan_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub national_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsurancePlanRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatientError {
    #[error("Patient {0} not found")]
    NotFound(Uuid),

    #[error("Insurance plan {0} not found")]
    InsurancePlanNotFound(Uuid),

    #[error("National ID {0} is already registered")]
    DuplicateNationalId(String),

    #[error("A patient record already exists for this account")]
    AlreadyRegistered,

    #[error("Insurance plan {0} already exists")]
    DuplicateInsurancePlan(String),

    #[error("Insurance plan does not exist")]
    UnknownInsurancePlan,

    #[error("Invalid national ID: {0}")]
    InvalidNationalId(String),

    #[error("Birth date cannot be in the future")]
    InvalidBirthDate,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl PatientError {
    pub(crate) fn database(err: anyhow::Error) -> Self {
        PatientError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for PatientError {
    fn from(err: serde_json::Error) -> Self {
        PatientError::DatabaseError(format!("Unexpected row shape: {}", err))
    }
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound(_) | PatientError::InsurancePlanNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            PatientError::DuplicateNationalId(_)
            | PatientError::AlreadyRegistered
            | PatientError::DuplicateInsurancePlan(_) => AppError::Conflict(err.to_string()),
            PatientError::UnknownInsurancePlan
            | PatientError::InvalidNationalId(_)
            | PatientError::InvalidBirthDate => AppError::ValidationError(err.to_string()),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub(crate) fn supabase_error(err: &anyhow::Error) -> Option<&SupabaseError> {
    SupabaseError::from_anyhow(err)
}

fn national_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[0-9][0-9./ -]*$").ok())
        .as_ref()
}

/// Strips punctuation from a national ID, keeping only digits.
///
/// `123.456.789-01` and `12345678901` are the same ID. Letters are rejected.
pub fn normalize_national_id(raw: &str) -> Result<String, PatientError> {
    let trimmed = raw.trim();
    let well_formed = national_id_pattern().map_or(true, |re| re.is_match(trimmed));
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();

    if !well_formed || digits.is_empty() || digits.len() > NATIONAL_ID_MAX_DIGITS {
        return Err(PatientError::InvalidNationalId(raw.to_string()));
    }

    Ok(digits)
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
