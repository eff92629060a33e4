use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Resolves the authenticated user into a clinic caller.
    pub fn caller(&self) -> Result<Caller, AppError> {
        let role = self
            .role
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("Account has no clinic role".to_string()))?
            .parse::<Role>()?;

        Caller::from_role(role, &self.id)
    }
}

/// The three kinds of clinic account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Physician,
    Administrator,
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "physician" | "doctor" => Ok(Role::Physician),
            "admin" | "administrator" | "receptionist" => Ok(Role::Administrator),
            other => Err(AppError::Forbidden(format!("Unknown role: {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Physician => write!(f, "physician"),
            Role::Administrator => write!(f, "administrator"),
        }
    }
}

/// Who is calling, with the record they own.
///
/// Patient and physician profiles share their id with the user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Caller {
    Patient { patient_id: Uuid },
    Physician { physician_id: Uuid },
    Administrator,
}

impl Caller {
    pub fn from_role(role: Role, user_id: &str) -> Result<Self, AppError> {
        let parse_id = || {
            Uuid::parse_str(user_id)
                .map_err(|_| AppError::Auth(format!("Invalid user id: {}", user_id)))
        };

        Ok(match role {
            Role::Patient => Caller::Patient { patient_id: parse_id()? },
            Role::Physician => Caller::Physician { physician_id: parse_id()? },
            Role::Administrator => Caller::Administrator,
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Caller::Patient { .. } => Role::Patient,
            Caller::Physician { .. } => Role::Physician,
            Caller::Administrator => Role::Administrator,
        }
    }

    pub fn require_administrator(&self) -> Result<(), AppError> {
        match self {
            Caller::Administrator => Ok(()),
            Caller::Patient { .. } | Caller::Physician { .. } => Err(AppError::Forbidden(
                "Only administrators can manage clinic records".to_string(),
            )),
        }
    }
}
