use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{
    AppointmentError, BookingService, PATIENT_SLOT_CONSTRAINT, ROOM_SLOT_CONSTRAINT,
};
use notification_cell::{NotificationError, Notifier};
use shared_config::AppConfig;
use shared_models::auth::Caller;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

mock! {
    pub Courier {}

    #[async_trait]
    impl Notifier for Courier {
        async fn send(&self, address: &str, message: &str) -> Result<(), NotificationError>;
    }
}

const TOKEN: &str = "patient-token";

// A Monday
fn slot() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 3, 9, 0, 0).unwrap()
}

struct Clinic {
    server: MockServer,
    patient_id: Uuid,
    physician_id: Uuid,
}

impl Clinic {
    async fn open() -> Self {
        let clinic = Self {
            server: MockServer::start().await,
            patient_id: Uuid::new_v4(),
            physician_id: Uuid::new_v4(),
        };

        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::patient_row(
                    &clinic.patient_id.to_string(),
                    "Ana Souza",
                    "ana@example.com"
                )
            ])))
            .mount(&clinic.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/physicians"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::physician_row(&clinic.physician_id.to_string(), "Helena Costa")
            ])))
            .mount(&clinic.server)
            .await;

        clinic
    }

    fn config(&self) -> AppConfig {
        TestConfig::with_supabase_url(&self.server.uri()).to_app_config()
    }

    fn caller(&self) -> Caller {
        Caller::Patient { patient_id: self.patient_id }
    }

    async fn patient_bookings_at_slot(&self, rows: Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("select", "id"))
            .and(query_param("patient_id", format!("eq.{}", self.patient_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.server)
            .await;
    }

    async fn rooms(&self, rooms: &[Uuid], occupied: &[Uuid]) {
        let rooms: Vec<Value> = rooms
            .iter()
            .enumerate()
            .map(|(i, id)| MockSupabaseResponses::room_row(&id.to_string(), &format!("Room {}", i + 1)))
            .collect();
        let occupied: Vec<Value> = occupied.iter().map(|id| json!({ "room_id": id })).collect();

        Mock::given(method("GET"))
            .and(path("/rest/v1/rooms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rooms))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("select", "room_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(occupied))
            .mount(&self.server)
            .await;
    }

    fn stored_row(&self, room_id: Uuid) -> Value {
        json!([MockSupabaseResponses::appointment_row(
            &Uuid::new_v4().to_string(),
            &self.patient_id.to_string(),
            &self.physician_id.to_string(),
            &room_id.to_string(),
            slot(),
            "scheduled"
        )])
    }
}

fn silent_courier() -> MockCourier {
    let mut courier = MockCourier::new();
    courier.expect_send().never();
    courier
}

#[tokio::test]
async fn books_first_free_room_and_confirms() {
    let clinic = Clinic::open().await;
    let (busy, free) = (Uuid::new_v4(), Uuid::new_v4());
    clinic.patient_bookings_at_slot(json!([])).await;
    clinic.rooms(&[busy, free], &[busy]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "patient_id": clinic.patient_id,
            "physician_id": clinic.physician_id,
            "room_id": free,
            "status": "scheduled"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(clinic.stored_row(free)))
        .expect(1)
        .mount(&clinic.server)
        .await;

    let mut courier = MockCourier::new();
    courier
        .expect_send()
        .withf(|address, message| {
            address == "ana@example.com"
                && message.contains("Helena Costa")
                && message.contains("03/06/2030 at 09:00")
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let service = BookingService::with_notifier(&clinic.config(), Arc::new(courier));
    let outcome = service
        .book(&clinic.caller(), clinic.physician_id, slot(), TOKEN)
        .await
        .unwrap();

    assert_eq!(outcome.appointment.room_id, free);
    assert_eq!(outcome.appointment.scheduled_at, slot());
    assert!(outcome.warning.is_none());
}

#[tokio::test]
async fn notification_failure_is_reported_as_warning() {
    let clinic = Clinic::open().await;
    let room = Uuid::new_v4();
    clinic.patient_bookings_at_slot(json!([])).await;
    clinic.rooms(&[room], &[]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(clinic.stored_row(room)))
        .expect(1)
        .mount(&clinic.server)
        .await;

    let mut courier = MockCourier::new();
    courier
        .expect_send()
        .times(1)
        .returning(|_, _| Err(NotificationError::DeliveryFailed("relay unreachable".to_string())));

    let service = BookingService::with_notifier(&clinic.config(), Arc::new(courier));
    let outcome = service
        .book(&clinic.caller(), clinic.physician_id, slot(), TOKEN)
        .await
        .unwrap();

    assert_eq!(outcome.appointment.room_id, room);
    assert!(outcome.warning.unwrap().contains("relay unreachable"));
}

#[tokio::test]
async fn second_booking_at_same_instant_is_a_duplicate() {
    let clinic = Clinic::open().await;
    clinic
        .patient_bookings_at_slot(json!([{ "id": Uuid::new_v4() }]))
        .await;
    clinic.rooms(&[Uuid::new_v4()], &[]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&clinic.server)
        .await;

    let service = BookingService::with_notifier(&clinic.config(), Arc::new(silent_courier()));
    let err = service
        .book(&clinic.caller(), clinic.physician_id, slot(), TOKEN)
        .await
        .unwrap_err();

    assert_eq!(err, AppointmentError::DuplicatePatientBooking { at: slot() });
    assert!(err.to_string().contains("03/06/2030 at 09:00"));
}

#[tokio::test]
async fn every_room_occupied_means_no_room() {
    let clinic = Clinic::open().await;
    let rooms = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    clinic.patient_bookings_at_slot(json!([])).await;
    clinic.rooms(&rooms, &rooms).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&clinic.server)
        .await;

    let service = BookingService::with_notifier(&clinic.config(), Arc::new(silent_courier()));
    let err = service
        .book(&clinic.caller(), clinic.physician_id, slot(), TOKEN)
        .await
        .unwrap_err();

    assert_eq!(err, AppointmentError::NoRoomAvailable { at: slot() });
}

#[tokio::test]
async fn only_patients_may_book() {
    let clinic = Clinic::open().await;
    let service = BookingService::with_notifier(&clinic.config(), Arc::new(silent_courier()));

    let as_physician = Caller::Physician { physician_id: clinic.physician_id };
    assert_matches!(
        service.book(&as_physician, clinic.physician_id, slot(), TOKEN).await,
        Err(AppointmentError::RoleNotAuthorized)
    );
    assert_matches!(
        service.book(&Caller::Administrator, clinic.physician_id, slot(), TOKEN).await,
        Err(AppointmentError::RoleNotAuthorized)
    );
}

#[tokio::test]
async fn unknown_physician_is_not_found() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let physician_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id.to_string(), "Ana Souza", "ana@example.com")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/physicians"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    let service = BookingService::with_notifier(&config, Arc::new(silent_courier()));

    let err = service
        .book(&Caller::Patient { patient_id }, physician_id, slot(), TOKEN)
        .await
        .unwrap_err();
    assert_eq!(err, AppointmentError::PhysicianNotFound(physician_id));
}

#[tokio::test]
async fn missing_patient_record_is_not_found() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    let service = BookingService::with_notifier(&config, Arc::new(silent_courier()));

    let err = service
        .book(&Caller::Patient { patient_id }, Uuid::new_v4(), slot(), TOKEN)
        .await
        .unwrap_err();
    assert_eq!(err, AppointmentError::PatientNotFound(patient_id));
}

#[tokio::test]
async fn concurrent_bookings_for_last_room_yield_one_success() {
    let clinic = Clinic::open().await;
    let last_room = Uuid::new_v4();
    let other_patient = Uuid::new_v4();

    // Both requests see the room as free before either writes
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&clinic.server)
        .await;
    clinic.rooms(&[last_room], &[]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(clinic.stored_row(last_room)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&clinic.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(MockSupabaseResponses::unique_violation(ROOM_SLOT_CONSTRAINT)),
        )
        .with_priority(2)
        .mount(&clinic.server)
        .await;

    let mut courier = MockCourier::new();
    courier.expect_send().times(1).returning(|_, _| Ok(()));

    let service = BookingService::with_notifier(&clinic.config(), Arc::new(courier));
    let first_caller = clinic.caller();
    let second_caller = Caller::Patient { patient_id: other_patient };

    let (first, second) = tokio::join!(
        service.book(&first_caller, clinic.physician_id, slot(), TOKEN),
        service.book(&second_caller, clinic.physician_id, slot(), TOKEN),
    );

    let results = [first, second];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let no_room = results
        .iter()
        .filter(|r| matches!(r, Err(AppointmentError::NoRoomAvailable { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(no_room, 1);
}

#[tokio::test]
async fn patient_slot_violation_on_insert_is_a_duplicate() {
    let clinic = Clinic::open().await;
    clinic.patient_bookings_at_slot(json!([])).await;
    clinic.rooms(&[Uuid::new_v4(), Uuid::new_v4()], &[]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(MockSupabaseResponses::unique_violation(PATIENT_SLOT_CONSTRAINT)),
        )
        .expect(1)
        .mount(&clinic.server)
        .await;

    let service = BookingService::with_notifier(&clinic.config(), Arc::new(silent_courier()));
    let err = service
        .book(&clinic.caller(), clinic.physician_id, slot(), TOKEN)
        .await
        .unwrap_err();

    assert_eq!(err, AppointmentError::DuplicatePatientBooking { at: slot() });
}

#[tokio::test]
async fn window_check_rejects_off_schedule_times_when_enabled() {
    let clinic = Clinic::open().await;
    clinic.patient_bookings_at_slot(json!([])).await;
    clinic.rooms(&[Uuid::new_v4()], &[]).await;

    // Monday afternoons only
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_window_row(
                &Uuid::new_v4().to_string(),
                &clinic.physician_id.to_string(),
                1,
                "14:00:00",
                "18:00:00"
            )
        ])))
        .mount(&clinic.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&clinic.server)
        .await;

    let mut config = clinic.config();
    config.scheduling.require_availability_window = true;

    let service = BookingService::with_notifier(&config, Arc::new(silent_courier()));
    let err = service
        .book(&clinic.caller(), clinic.physician_id, slot(), TOKEN)
        .await
        .unwrap_err();

    assert_eq!(err, AppointmentError::SlotOutsideAvailability { at: slot() });
}
