pub mod models;

pub use models::{AttemptStatus, PaymentAttempt};
