pub mod payment_attempt;

pub use payment_attempt::{AttemptStatus, PaymentAttempt};
