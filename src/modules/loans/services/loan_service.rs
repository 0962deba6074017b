use std::sync::Arc;
use tracing::info;

use crate::core::{AppError, Result};
use crate::modules::loans::models::{Applicant, Loan, LoanTerms};
use crate::store::LoanStore;

/// Intake of loans approved upstream
pub struct LoanService {
    store: Arc<dyn LoanStore>,
}

impl LoanService {
    pub fn new(store: Arc<dyn LoanStore>) -> Self {
        Self { store }
    }

    /// Record an approved loan and fix its EMI
    pub async fn register(
        &self,
        reference: String,
        applicant: Applicant,
        terms: LoanTerms,
    ) -> Result<Loan> {
        if reference.trim().is_empty() {
            return Err(AppError::validation("loan reference is required"));
        }

        let loan = Loan::approved(reference, applicant, terms)?;

        let mut tx = self.store.begin().await?;
        tx.insert_loan(&loan).await?;
        tx.commit().await?;

        info!(
            loan_id = %loan.id,
            reference = %loan.reference,
            principal = %loan.terms.principal,
            emi = %loan.emi_amount,
            "Loan registered"
        );

        Ok(loan)
    }

    pub async fn get(&self, loan_id: &str) -> Result<Loan> {
        let mut tx = self.store.begin().await?;
        let loan = tx.lock_loan(loan_id).await?;
        drop(tx);

        loan.ok_or_else(|| AppError::not_found(format!("loan {}", loan_id)))
    }
}
