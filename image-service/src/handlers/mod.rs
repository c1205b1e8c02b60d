pub mod generations;
pub mod health;

pub use generations::{create_generation, list_generations};
pub use health::{health_check, readiness_check};
