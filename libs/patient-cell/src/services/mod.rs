pub mod insurance;
pub mod patient;

pub use insurance::InsurancePlanService;
pub use patient::PatientService;
