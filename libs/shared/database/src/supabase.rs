use anyhow::Result;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Postgres error code for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";
/// Postgres error code for foreign key violations.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict ({code}): {message}")]
    Conflict { code: String, message: String },

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl SupabaseError {
    /// Returns the database error carried by an `anyhow::Error`, if any.
    pub fn from_anyhow(err: &anyhow::Error) -> Option<&SupabaseError> {
        err.downcast_ref::<SupabaseError>()
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, SupabaseError::Conflict { code, .. } if code == UNIQUE_VIOLATION)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, SupabaseError::Conflict { code, .. } if code == FOREIGN_KEY_VIOLATION)
    }

    /// True when the error is a unique violation raised by `constraint`.
    pub fn violates(&self, constraint: &str) -> bool {
        match self {
            SupabaseError::Conflict { code, message } => {
                code == UNIQUE_VIOLATION && message.contains(constraint)
            }
            _ => false,
        }
    }

    fn from_response(status: u16, body: String) -> Self {
        match status {
            401 | 403 => SupabaseError::Auth(body),
            404 => SupabaseError::NotFound(body),
            409 => {
                // PostgREST reports the Postgres error as {"code", "message", "details", "hint"}
                let parsed: Option<Value> = serde_json::from_str(&body).ok();
                let code = parsed
                    .as_ref()
                    .and_then(|v| v["code"].as_str())
                    .unwrap_or(UNIQUE_VIOLATION)
                    .to_string();
                let message = parsed
                    .as_ref()
                    .and_then(|v| v["message"].as_str())
                    .map(str::to_string)
                    .unwrap_or(body);
                SupabaseError::Conflict { code, message }
            }
            _ => SupabaseError::Api { status, body },
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::from_response(status.as_u16(), error_text).into());
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Insert or update rows and return the stored representation.
    pub async fn write_returning(&self, method: Method, path: &str,
                                 auth_token: Option<&str>, body: Option<Value>)
                                 -> Result<Vec<Value>> {
        self.request_with_headers(method, path, auth_token, body, Some(Self::return_representation()))
            .await
    }

    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SupabaseClient {
        let config = AppConfig {
            supabase_url: server.uri(),
            supabase_anon_key: "anon".to_string(),
            ..AppConfig::default()
        };
        SupabaseClient::new(&config)
    }

    #[tokio::test]
    async fn unique_violation_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/specialties"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"specialties_name_key\"",
                "details": null,
                "hint": null
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .write_returning(Method::POST, "/rest/v1/specialties", Some("token"), Some(json!({"name": "A"})))
            .await
            .unwrap_err();

        let db_err = SupabaseError::from_anyhow(&err).expect("typed error");
        assert!(db_err.is_unique_violation());
        assert!(db_err.violates("specialties_name_key"));
        assert!(!db_err.violates("specialties_pkey"));
    }

    #[tokio::test]
    async fn forwards_bearer_token_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/rooms"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let rows: Vec<Value> = client_for(&server)
            .request(Method::GET, "/rest/v1/rooms", Some("user-token"), None)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn maps_not_found_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/secret"))
            .respond_with(ResponseTemplate::new(401).set_body_string("jwt expired"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.request::<Vec<Value>>(Method::GET, "/rest/v1/missing", None, None).await.unwrap_err();
        assert_matches!(SupabaseError::from_anyhow(&err), Some(SupabaseError::NotFound(_)));

        let err = client.request::<Vec<Value>>(Method::GET, "/rest/v1/secret", None, None).await.unwrap_err();
        assert_matches!(SupabaseError::from_anyhow(&err), Some(SupabaseError::Auth(_)));
    }
}
