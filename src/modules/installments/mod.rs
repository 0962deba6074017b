pub mod models;
pub mod services;

pub use models::{Installment, InstallmentStatus};
pub use services::{ChargeOutcome, ChargeService, RetryScheduler, RunSummary, ScheduleGenerator};
