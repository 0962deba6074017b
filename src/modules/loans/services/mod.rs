pub mod disbursement_service;
pub mod emi_calculator;
pub mod loan_service;
pub mod payment_allocator;
pub mod repayment_service;

pub use disbursement_service::{Disbursement, DisbursementService};
pub use emi_calculator::EmiCalculator;
pub use loan_service::LoanService;
pub use payment_allocator::{Allocation, PaymentAllocator, PostedRepayment, RepaymentPosting};
pub use repayment_service::{ManualRepayment, RepaymentHistory, RepaymentOutcome, RepaymentService};
