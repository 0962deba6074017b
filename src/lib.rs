//! Education loan repayment engine
//!
//! EMI computation, repayment schedules, payment allocation and loan closure,
//! e-mandate lifecycle, gateway webhooks, and the daily installment charge run.

pub mod config;
pub mod core;
pub mod modules;
pub mod store;

// Re-export commonly used types
pub use modules::installments;
pub use modules::loans;
pub use modules::mandates;
pub use modules::webhooks;
