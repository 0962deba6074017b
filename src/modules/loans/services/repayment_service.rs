use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::core::{AppError, Clock, Result};
use crate::modules::installments::models::Installment;
use crate::modules::loans::models::{ClosureCertificate, LedgerEntry, Loan, LoanLedger, RepaymentSource};
use crate::modules::loans::services::payment_allocator::{
    PaymentAllocator, PostedRepayment, RepaymentPosting,
};
use crate::modules::notifications::services::{NotificationKind, Notifier};
use crate::store::LoanStore;

/// Out-of-band repayment identified by its bank UTR
#[derive(Debug, Clone)]
pub struct ManualRepayment {
    pub utr: String,
    pub amount: Decimal,
    /// Installment this transfer settles, if the borrower paid a specific EMI
    pub installment_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RepaymentOutcome {
    Applied(Box<PostedRepayment>),
    /// UTR already recorded; nothing changed
    Duplicate(LedgerEntry),
}

#[derive(Debug, Clone, Serialize)]
pub struct RepaymentHistory {
    pub loan: Loan,
    pub ledger: Option<LoanLedger>,
    pub entries: Vec<LedgerEntry>,
    pub installments: Vec<Installment>,
}

/// Manual repayments, statements, and closure certificates
pub struct RepaymentService {
    store: Arc<dyn LoanStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl RepaymentService {
    pub fn new(store: Arc<dyn LoanStore>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    /// Record a repayment made outside the mandate.
    ///
    /// Idempotent on the UTR: a repeated UTR returns the entry already posted.
    pub async fn record_manual(
        &self,
        loan_id: &str,
        repayment: ManualRepayment,
    ) -> Result<RepaymentOutcome> {
        let utr = repayment.utr.trim().to_string();
        if utr.is_empty() {
            return Err(AppError::validation("UTR is required"));
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        if let Some(existing) = tx.find_ledger_entry(loan_id, &utr).await? {
            info!(loan_id, utr = %utr, "Manual repayment already recorded");
            return Ok(RepaymentOutcome::Duplicate(existing));
        }

        tx.lock_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("loan {}", loan_id)))?;

        let mut installment = match &repayment.installment_id {
            Some(id) => {
                let installment = tx
                    .lock_installment(id)
                    .await?
                    .filter(|i| i.loan_id == loan_id)
                    .ok_or_else(|| AppError::not_found(format!("installment {}", id)))?;

                if !installment.accepts_manual_payment() {
                    return Err(AppError::conflict(format!(
                        "installment {} is {} and cannot be settled manually",
                        installment.id, installment.status
                    )));
                }
                Some(installment)
            }
            None => None,
        };

        let posted = PaymentAllocator::post(
            tx.as_mut(),
            RepaymentPosting {
                loan_id: loan_id.to_string(),
                payment_ref: utr.clone(),
                source: RepaymentSource::Manual,
                amount: repayment.amount,
                installment_id: repayment.installment_id.clone(),
                at: now,
            },
        )
        .await?;

        if let Some(installment) = installment.as_mut() {
            installment.mark_paid_manually(utr.clone(), now);
            tx.update_installment(installment).await?;
        }

        tx.commit().await?;

        info!(
            loan_id,
            utr = %utr,
            amount = %repayment.amount,
            outstanding = %posted.ledger.total_outstanding,
            closed = posted.closed,
            "Manual repayment recorded"
        );

        notify_repayment(self.notifier.as_ref(), &posted).await;

        Ok(RepaymentOutcome::Applied(Box::new(posted)))
    }

    /// Ledger position, applied repayments (newest first), and the
    /// installment schedule
    pub async fn history(&self, loan_id: &str) -> Result<RepaymentHistory> {
        let mut tx = self.store.begin().await?;

        let loan = tx
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("loan {}", loan_id)))?;
        let ledger = tx.lock_ledger(loan_id).await?;
        let mut entries = tx.list_ledger_entries(loan_id).await?;
        entries.reverse();
        let installments = match tx.lock_mandate_for_loan(loan_id).await? {
            Some(mandate) => tx.list_installments(&mandate.id).await?,
            None => Vec::new(),
        };
        drop(tx);

        Ok(RepaymentHistory {
            loan,
            ledger,
            entries,
            installments,
        })
    }

    /// Certificate issued when the loan closed
    pub async fn closure_certificate(&self, loan_id: &str) -> Result<ClosureCertificate> {
        let mut tx = self.store.begin().await?;
        let certificate = tx.find_closure_certificate(loan_id).await?;
        drop(tx);

        certificate.ok_or_else(|| {
            AppError::not_found(format!("closure certificate for loan {}", loan_id))
        })
    }
}

/// Receipt and closure notifications after a repayment commits
pub async fn notify_repayment(notifier: &dyn Notifier, posted: &PostedRepayment) {
    let recipient = &posted.loan.applicant.email;

    notifier
        .notify(
            recipient,
            NotificationKind::PaymentReceived,
            serde_json::json!({
                "loan_reference": posted.loan.reference,
                "payment_ref": posted.entry.payment_ref,
                "amount": posted.entry.amount.to_string(),
                "outstanding": posted.ledger.total_outstanding.to_string(),
            }),
        )
        .await;

    if let Some(certificate) = &posted.certificate {
        notifier
            .notify(
                recipient,
                NotificationKind::LoanClosed,
                serde_json::json!({
                    "loan_reference": posted.loan.reference,
                    "certificate_number": certificate.certificate_number,
                    "total_paid": certificate.total_paid.to_string(),
                }),
            )
            .await;
    }
}
