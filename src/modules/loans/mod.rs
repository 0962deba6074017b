pub mod models;
pub mod services;

pub use models::{Loan, LoanLedger, LoanStatus, LoanTerms};
pub use services::{DisbursementService, EmiCalculator, LoanService, PaymentAllocator, RepaymentService};
