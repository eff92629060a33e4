use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::router::{insurance_plan_routes, patient_routes};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn setup() -> (MockServer, TestConfig) {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    (server, config)
}

fn app(config: &TestConfig) -> Router {
    patient_routes(config.to_arc())
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json");

    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn self_registration_uses_account_id_and_normalized_national_id() {
    let (server, config) = setup().await;
    let user = TestUser::patient("ana@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({
            "id": user.id,
            "national_id": "12345678901",
            "email": "ana@example.com"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_row(&user.id, "Ana Souza", "ana@example.com")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&config)
        .oneshot(request(
            "POST",
            "/register",
            &token,
            Some(json!({
                "full_name": "Ana Souza",
                "national_id": "123.456.789-01",
                "birth_date": "1990-05-17"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["patient"]["id"], user.id);
}

#[tokio::test]
async fn duplicate_national_id_is_a_conflict() {
    let (server, config) = setup().await;
    let user = TestUser::patient("bruno@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::unique_violation("patients_national_id_key"),
        ))
        .mount(&server)
        .await;

    let response = app(&config)
        .oneshot(request(
            "POST",
            "/register",
            &token,
            Some(json!({
                "full_name": "Bruno Lima",
                "national_id": "12345678901",
                "birth_date": "1985-01-02"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn physicians_cannot_register_as_patients() {
    let (_server, config) = setup().await;
    let user = TestUser::physician("doc@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let response = app(&config)
        .oneshot(request(
            "POST",
            "/register",
            &token,
            Some(json!({
                "full_name": "Dr. Who",
                "national_id": "12345678901",
                "birth_date": "1970-01-01"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_national_id_is_rejected_before_storage() {
    let (server, config) = setup().await;
    let token = JwtTestUtils::create_test_token(
        &TestUser::admin("admin@clinic.test"),
        &config.jwt_secret,
        Some(1),
    );

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let response = app(&config)
        .oneshot(request(
            "POST",
            "/",
            &token,
            Some(json!({
                "id": Uuid::new_v4(),
                "full_name": "Carla Dias",
                "national_id": "ABC-123",
                "birth_date": "1992-03-04"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patients_only_see_their_own_record() {
    let (server, config) = setup().await;
    let user = TestUser::patient("ana@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&user.id, "Ana Souza", "ana@example.com")
        ])))
        .mount(&server)
        .await;

    let own = app(&config)
        .oneshot(request("GET", "/me", &token, None))
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::OK);

    let other = app(&config)
        .oneshot(request("GET", &format!("/{}", Uuid::new_v4()), &token, None))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_unknown_patient_is_not_found() {
    let (server, config) = setup().await;
    let token = JwtTestUtils::create_test_token(
        &TestUser::admin("admin@clinic.test"),
        &config.jwt_secret,
        Some(1),
    );

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let response = app(&config)
        .oneshot(request("DELETE", &format!("/{}", Uuid::new_v4()), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn insurance_plans_are_public_to_read() {
    let (server, config) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/insurance_plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "name": "Unimed" },
            { "id": Uuid::new_v4(), "name": "Amil" }
        ])))
        .mount(&server)
        .await;

    let response = insurance_plan_routes(config.to_arc())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["total"], 2);
}
