pub mod charge_service;
pub mod retry_scheduler;
pub mod schedule_generator;

pub use charge_service::{ChargeOutcome, ChargeService};
pub use retry_scheduler::{RetryScheduler, RunSummary};
pub use schedule_generator::ScheduleGenerator;
