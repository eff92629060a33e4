pub mod availability;
pub mod physician;
pub mod slots;
pub mod specialty;

pub use availability::AvailabilityService;
pub use physician::PhysicianService;
pub use specialty::SpecialtyService;
