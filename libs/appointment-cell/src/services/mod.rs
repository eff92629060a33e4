pub mod admin;
pub mod booking;
pub mod room;
pub mod visit_record;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::AppointmentError;

pub use admin::AppointmentAdminService;
pub use booking::BookingService;
pub use room::RoomService;
pub use visit_record::VisitRecordService;

/// First row of a PostgREST result, if any.
pub(crate) fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, AppointmentError> {
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}
