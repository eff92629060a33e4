pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::*;
pub use services::*;

pub use services::slots::{compute_slots, format_slot, is_slot_start, parse_slot, SLOT_FORMAT};
