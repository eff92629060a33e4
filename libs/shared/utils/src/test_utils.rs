use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn physician(email: &str) -> Self {
        Self::new(email, "physician")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test users have uuid ids")
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// PostgREST row shapes for the clinic tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn physician_row(physician_id: &str, full_name: &str) -> serde_json::Value {
        json!({
            "id": physician_id,
            "full_name": full_name,
            "license_number": format!("CRM-{}", &physician_id[..8]),
            "email": "physician@clinic.test",
            "specialties": [
                { "id": Uuid::new_v4(), "name": "Cardiology" }
            ],
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_row(patient_id: &str, full_name: &str, email: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": full_name,
            "email": email,
            "national_id": "12345678901",
            "birth_date": "1990-05-17",
            "insurance_plan_id": null,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn room_row(room_id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": room_id,
            "name": name,
            "description": null
        })
    }

    pub fn availability_window_row(
        window_id: &str,
        physician_id: &str,
        weekday: u8,
        start_time: &str,
        end_time: &str,
    ) -> serde_json::Value {
        json!({
            "id": window_id,
            "physician_id": physician_id,
            "weekday": weekday,
            "start_time": start_time,
            "end_time": end_time
        })
    }

    pub fn appointment_row(
        appointment_id: &str,
        patient_id: &str,
        physician_id: &str,
        room_id: &str,
        scheduled_at: DateTime<Utc>,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "physician_id": physician_id,
            "room_id": room_id,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "status": status,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn unique_violation(constraint: &str) -> serde_json::Value {
        json!({
            "code": "23505",
            "message": format!("duplicate key value violates unique constraint \"{}\"", constraint),
            "details": null,
            "hint": null
        })
    }

    pub fn foreign_key_violation(constraint: &str) -> serde_json::Value {
        json!({
            "code": "23503",
            "message": format!("update or delete violates foreign key constraint \"{}\"", constraint),
            "details": null,
            "hint": null
        })
    }
}
