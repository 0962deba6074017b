use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::core::{AppError, Clock, Result};
use crate::modules::installments::models::Installment;
use crate::modules::installments::services::ScheduleGenerator;
use crate::modules::loans::models::{LedgerEntry, Loan, LoanLedger, LoanStatus, RepaymentSource};
use crate::modules::loans::services::{EmiCalculator, PaymentAllocator};
use crate::modules::mandates::models::MandateStatus;
use crate::store::LoanStore;

/// Result of disbursing a loan
#[derive(Debug, Clone)]
pub struct Disbursement {
    pub loan: Loan,
    pub ledger: LoanLedger,
    pub advance_entry: Option<LedgerEntry>,
    pub installments: Vec<Installment>,
}

/// Opens the ledger and repayment schedule when funds go out
pub struct DisbursementService {
    store: Arc<dyn LoanStore>,
    clock: Arc<dyn Clock>,
}

impl DisbursementService {
    pub fn new(store: Arc<dyn LoanStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Disburse a loan whose mandate is active.
    ///
    /// Books the opening ledger (principal plus the interest the borrower
    /// owes), applies an optional advance EMI, and generates the installment
    /// schedule over what remains, all in one transaction.
    ///
    /// # Arguments
    /// * `loan_id` - Loan to disburse
    /// * `advance_emi` - Amount collected up front, if any
    ///
    /// # Errors
    /// * `MandateStateConflict` - loan already disbursed or mandate not active
    /// * `Validation` - advance not positive or covering the whole loan
    pub async fn disburse(&self, loan_id: &str, advance_emi: Option<Decimal>) -> Result<Disbursement> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut loan = tx
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("loan {}", loan_id)))?;

        match loan.status {
            LoanStatus::MandateActive => {}
            LoanStatus::Disbursed | LoanStatus::Closed => {
                return Err(AppError::conflict(format!(
                    "loan {} is already disbursed",
                    loan.id
                )))
            }
            other => {
                return Err(AppError::conflict(format!(
                    "loan {} is {}; an active mandate is required before disbursement",
                    loan.id, other
                )))
            }
        }

        let mandate = tx
            .lock_mandate_for_loan(&loan.id)
            .await?
            .filter(|m| m.status == MandateStatus::Active)
            .ok_or_else(|| {
                AppError::conflict(format!("loan {} has no active mandate", loan.id))
            })?;

        if tx.lock_ledger(&loan.id).await?.is_some() {
            return Err(AppError::conflict(format!(
                "loan {} already has a ledger",
                loan.id
            )));
        }

        let interest = EmiCalculator::total_interest(&loan.terms, loan.emi_amount)?;
        let mut ledger = LoanLedger::opening(loan.id.clone(), loan.terms.principal, interest);
        ledger.updated_at = now;

        let advance_entry = match advance_emi {
            Some(amount) => {
                if amount >= ledger.total_outstanding {
                    return Err(AppError::validation(format!(
                        "advance EMI {} must be below the total outstanding {}",
                        amount, ledger.total_outstanding
                    )));
                }

                let allocation = PaymentAllocator::apply_advance(&ledger, amount, now)?;
                ledger = allocation.ledger;

                Some(LedgerEntry::new(
                    loan.id.clone(),
                    format!("ADVANCE-{}", loan.reference),
                    RepaymentSource::AdvanceEmi,
                    amount,
                    allocation.principal_portion,
                    allocation.interest_portion,
                    ledger.total_outstanding,
                    now,
                ))
            }
            None => None,
        };

        tx.insert_ledger(&ledger).await?;
        if let Some(entry) = &advance_entry {
            tx.append_ledger_entry(entry).await?;
        }

        let installments = ScheduleGenerator::generate(
            tx.as_mut(),
            &mandate,
            ledger.total_outstanding,
            loan.emi_amount,
        )
        .await?;

        tx.update_loan_status(&loan.id, LoanStatus::Disbursed).await?;
        tx.commit().await?;

        loan.status = LoanStatus::Disbursed;
        loan.updated_at = now;

        info!(
            loan_id = %loan.id,
            principal = %ledger.principal_outstanding,
            interest = %ledger.interest_outstanding,
            advance = ?advance_emi,
            installments = installments.len(),
            "Loan disbursed"
        );

        Ok(Disbursement {
            loan,
            ledger,
            advance_entry,
            installments,
        })
    }
}
