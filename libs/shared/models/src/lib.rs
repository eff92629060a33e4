pub mod auth;
pub mod error;

pub use auth::{Caller, Role, User};
pub use error::AppError;
