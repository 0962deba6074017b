pub mod ledger;
pub mod loan;

pub use ledger::{ClosureCertificate, LedgerEntry, LoanLedger, RepaymentSource, CLOSURE_EPSILON};
pub use loan::{Applicant, InterestPayer, InterestType, Loan, LoanStatus, LoanTerms};
