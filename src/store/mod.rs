//! Transactional persistence for loan servicing.
//!
//! Every multi-record change (ledger update plus entry plus installment plus
//! attempt) happens inside one [`StoreTx`]. Dropping a transaction without
//! calling [`StoreTx::commit`] rolls it back.
//!
//! Lock order: a payment attempt (only webhooks lock those), then the loan,
//! then the loan's ledger, mandate, and installments. Callers that start from
//! an installment or a mandate reference read the owning loan id with the
//! `find_*_loan_id` methods and lock the loan before anything else.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::Result;
use crate::modules::installments::models::Installment;
use crate::modules::loans::models::{ClosureCertificate, LedgerEntry, Loan, LoanLedger, LoanStatus};
use crate::modules::mandates::models::Mandate;
use crate::modules::payments::models::PaymentAttempt;

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// Entry point to the store; hands out transactions
#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> Result<()>;
}

/// Unit of work. `lock_*` methods take a row lock held until commit or drop.
#[async_trait]
pub trait StoreTx: Send {
    // Loans
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()>;
    async fn lock_loan(&mut self, loan_id: &str) -> Result<Option<Loan>>;
    async fn update_loan_status(&mut self, loan_id: &str, status: LoanStatus) -> Result<()>;

    // Ledger
    async fn insert_ledger(&mut self, ledger: &LoanLedger) -> Result<()>;
    async fn lock_ledger(&mut self, loan_id: &str) -> Result<Option<LoanLedger>>;
    async fn update_ledger(&mut self, ledger: &LoanLedger) -> Result<()>;
    async fn append_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()>;
    async fn find_ledger_entry(
        &mut self,
        loan_id: &str,
        payment_ref: &str,
    ) -> Result<Option<LedgerEntry>>;
    async fn list_ledger_entries(&mut self, loan_id: &str) -> Result<Vec<LedgerEntry>>;
    async fn find_closure_certificate(&mut self, loan_id: &str)
        -> Result<Option<ClosureCertificate>>;
    async fn insert_closure_certificate(&mut self, certificate: &ClosureCertificate)
        -> Result<()>;

    // Mandates
    async fn insert_mandate(&mut self, mandate: &Mandate) -> Result<()>;
    async fn lock_mandate_for_loan(&mut self, loan_id: &str) -> Result<Option<Mandate>>;
    /// Look a mandate up by gateway order id, falling back to the token id
    async fn lock_mandate_by_gateway_ref(
        &mut self,
        order_ref: Option<&str>,
        token_ref: Option<&str>,
    ) -> Result<Option<Mandate>>;
    async fn update_mandate(&mut self, mandate: &Mandate) -> Result<()>;
    /// Owning loan of a mandate, by order id then token id. Takes no lock.
    async fn find_mandate_loan_id(
        &mut self,
        order_ref: Option<&str>,
        token_ref: Option<&str>,
    ) -> Result<Option<String>>;

    // Installments
    async fn insert_installments(&mut self, installments: &[Installment]) -> Result<()>;
    async fn count_installments(&mut self, mandate_id: &str) -> Result<u64>;
    async fn list_installments(&mut self, mandate_id: &str) -> Result<Vec<Installment>>;
    async fn lock_installment(&mut self, installment_id: &str) -> Result<Option<Installment>>;
    /// Owning loan of an installment. Takes no lock.
    async fn find_installment_loan_id(&mut self, installment_id: &str) -> Result<Option<String>>;
    async fn update_installment(&mut self, installment: &Installment) -> Result<()>;
    /// Due on or before `due_on`, chargeable, and under an ACTIVE mandate
    async fn find_due_installments(
        &mut self,
        due_on: NaiveDate,
        max_retries: u32,
    ) -> Result<Vec<Installment>>;
    /// Compare-and-set PENDING|FAILED -> PROCESSING. `false` when another
    /// worker already claimed it or it stopped being chargeable.
    async fn claim_installment(&mut self, installment_id: &str, max_retries: u32) -> Result<bool>;

    // Payment attempts
    async fn insert_attempt(&mut self, attempt: &PaymentAttempt) -> Result<()>;
    async fn lock_attempt(&mut self, gateway_payment_ref: &str) -> Result<Option<PaymentAttempt>>;
    async fn update_attempt(&mut self, attempt: &PaymentAttempt) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
