pub mod models;
pub mod services;

pub use models::{Mandate, MandateEvent, MandateStatus};
pub use services::MandateService;
