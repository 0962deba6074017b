use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::core::{AppError, Currency, Result};
use crate::modules::loans::models::{
    ClosureCertificate, InterestPayer, InterestType, LedgerEntry, Loan, LoanLedger, LoanStatus,
    LoanTerms, RepaymentSource,
};
use crate::modules::mandates::models::{MandateEvent, Transition};
use crate::store::StoreTx;

/// Split of one payment between principal and interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub principal_portion: Decimal,
    pub interest_portion: Decimal,
    /// Ledger after the payment; zeroed when the loan settles
    pub ledger: LoanLedger,
    pub closes_loan: bool,
}

/// A repayment to post against a loan ledger
#[derive(Debug, Clone)]
pub struct RepaymentPosting {
    pub loan_id: String,
    /// Gateway payment id, UTR, or advance marker; unique per ledger
    pub payment_ref: String,
    pub source: RepaymentSource,
    pub amount: Decimal,
    pub installment_id: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PostedRepayment {
    pub loan: Loan,
    pub entry: LedgerEntry,
    pub ledger: LoanLedger,
    pub closed: bool,
    pub certificate: Option<ClosureCertificate>,
}

/// Applies repayments to loan ledgers and closes fully repaid loans
pub struct PaymentAllocator;

impl PaymentAllocator {
    /// Split `amount_paid` into principal and interest and compute the new ledger.
    ///
    /// The interest share follows the loan's regime (none for PARTNER, pro-rata
    /// for FLAT, one month's interest on the remaining principal for REDUCING),
    /// then is clamped so that neither component can go negative and the total
    /// drops by exactly `amount_paid`.
    ///
    /// # Errors
    /// * `Validation` - amount not positive or finer than a paisa
    /// * `Overpayment` - amount above the total outstanding
    /// * `LedgerInconsistency` - input ledger already broken
    pub fn apply_payment(
        ledger: &LoanLedger,
        terms: &LoanTerms,
        amount_paid: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Allocation> {
        Self::check_payment(ledger, amount_paid)?;
        let nominal_interest = Self::nominal_interest(ledger, terms, amount_paid);
        Self::allocate(ledger, amount_paid, nominal_interest, at)
    }

    /// Split an advance EMI collected at disbursement.
    ///
    /// The interest share is pro-rata over the opening balance for every
    /// regime, so a REDUCING loan does not book a month of accrued interest
    /// before its first period has started.
    pub fn apply_advance(
        ledger: &LoanLedger,
        amount_paid: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Allocation> {
        Self::check_payment(ledger, amount_paid)?;
        let nominal_interest = Self::pro_rata_interest(ledger, amount_paid);
        Self::allocate(ledger, amount_paid, nominal_interest, at)
    }

    fn check_payment(ledger: &LoanLedger, amount_paid: Decimal) -> Result<()> {
        ledger.check_invariants()?;

        if amount_paid <= Decimal::ZERO {
            return Err(AppError::validation(format!(
                "payment amount must be positive, got {}",
                amount_paid
            )));
        }
        if Currency::INR.round(amount_paid) != amount_paid {
            return Err(AppError::validation(format!(
                "payment amount {} has more than two decimal places",
                amount_paid
            )));
        }
        if amount_paid > ledger.total_outstanding {
            return Err(AppError::Overpayment {
                amount: amount_paid,
                outstanding: ledger.total_outstanding,
            });
        }
        Ok(())
    }

    fn allocate(
        ledger: &LoanLedger,
        amount_paid: Decimal,
        nominal_interest: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Allocation> {
        let principal_out = ledger.principal_outstanding;
        let interest_out = ledger.interest_outstanding;

        let floor = (amount_paid - principal_out).max(Decimal::ZERO);
        let ceiling = amount_paid.min(interest_out);
        let interest_portion = nominal_interest.max(floor).min(ceiling);
        let principal_portion = amount_paid - interest_portion;

        let mut updated = ledger.clone();
        updated.principal_outstanding = (principal_out - principal_portion).max(Decimal::ZERO);
        updated.interest_outstanding = (interest_out - interest_portion).max(Decimal::ZERO);
        updated.total_outstanding = updated.principal_outstanding + updated.interest_outstanding;
        updated.total_paid += amount_paid;
        updated.updated_at = at;

        if updated.total_outstanding != ledger.total_outstanding - amount_paid {
            return Err(AppError::inconsistency(format!(
                "ledger {} moved by {} for a payment of {}",
                ledger.loan_id,
                ledger.total_outstanding - updated.total_outstanding,
                amount_paid
            )));
        }

        let closes_loan = updated.is_settled();
        if closes_loan {
            updated.settle(at);
        }

        Ok(Allocation {
            principal_portion,
            interest_portion,
            ledger: updated,
            closes_loan,
        })
    }

    fn nominal_interest(ledger: &LoanLedger, terms: &LoanTerms, amount_paid: Decimal) -> Decimal {
        match (terms.interest_payer, terms.interest_type) {
            (InterestPayer::Partner, _) => Decimal::ZERO,
            (InterestPayer::Student, InterestType::Flat) => {
                Self::pro_rata_interest(ledger, amount_paid)
            }
            (InterestPayer::Student, InterestType::Reducing) => {
                let accrued =
                    Currency::INR.round(ledger.principal_outstanding * terms.monthly_rate());
                accrued.min(amount_paid)
            }
        }
    }

    /// amount × interest outstanding / total outstanding
    fn pro_rata_interest(ledger: &LoanLedger, amount_paid: Decimal) -> Decimal {
        if ledger.total_outstanding > Decimal::ZERO {
            Currency::INR.round(amount_paid * ledger.interest_outstanding / ledger.total_outstanding)
        } else {
            Decimal::ZERO
        }
    }

    /// Post a repayment inside `tx`: allocate, append the ledger entry, and
    /// close the loan when nothing is left outstanding.
    ///
    /// # Errors
    /// * `DuplicateEvent` - an entry with the same `payment_ref` already exists
    /// * `MandateStateConflict` - loan closed or not yet disbursed
    pub async fn post(tx: &mut dyn StoreTx, posting: RepaymentPosting) -> Result<PostedRepayment> {
        let mut loan = tx
            .lock_loan(&posting.loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("loan {}", posting.loan_id)))?;

        match loan.status {
            LoanStatus::Disbursed => {}
            LoanStatus::Closed => {
                return Err(AppError::conflict(format!(
                    "loan {} is already closed",
                    loan.id
                )))
            }
            other => {
                return Err(AppError::conflict(format!(
                    "loan {} is {} and cannot take repayments",
                    loan.id, other
                )))
            }
        }

        if tx
            .find_ledger_entry(&loan.id, &posting.payment_ref)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateEvent(posting.payment_ref));
        }

        let ledger = tx.lock_ledger(&loan.id).await?.ok_or_else(|| {
            AppError::inconsistency(format!("disbursed loan {} has no ledger", loan.id))
        })?;

        let allocation = Self::apply_payment(&ledger, &loan.terms, posting.amount, posting.at)?;

        let entry = LedgerEntry::new(
            loan.id.clone(),
            posting.payment_ref.clone(),
            posting.source,
            posting.amount,
            allocation.principal_portion,
            allocation.interest_portion,
            allocation.ledger.total_outstanding,
            posting.at,
        )
        .with_installment(posting.installment_id);

        tx.update_ledger(&allocation.ledger).await?;
        tx.append_ledger_entry(&entry).await?;

        info!(
            loan_id = %loan.id,
            payment_ref = %entry.payment_ref,
            source = %entry.source,
            amount = %entry.amount,
            principal = %entry.principal_portion,
            interest = %entry.interest_portion,
            outstanding = %allocation.ledger.total_outstanding,
            "Repayment posted"
        );

        let certificate = if allocation.closes_loan {
            Some(Self::close_loan(tx, &mut loan, &allocation.ledger, posting.at).await?)
        } else {
            None
        };

        Ok(PostedRepayment {
            loan,
            entry,
            ledger: allocation.ledger,
            closed: allocation.closes_loan,
            certificate,
        })
    }

    /// Mark the loan CLOSED, issue the closure certificate once, and complete
    /// the mandate.
    async fn close_loan(
        tx: &mut dyn StoreTx,
        loan: &mut Loan,
        ledger: &LoanLedger,
        at: DateTime<Utc>,
    ) -> Result<ClosureCertificate> {
        tx.update_loan_status(&loan.id, LoanStatus::Closed).await?;
        loan.status = LoanStatus::Closed;
        loan.updated_at = at;

        let certificate = match tx.find_closure_certificate(&loan.id).await? {
            Some(existing) => existing,
            None => {
                let certificate =
                    ClosureCertificate::issue(loan.id.clone(), &loan.reference, ledger.total_paid, at);
                tx.insert_closure_certificate(&certificate).await?;
                certificate
            }
        };

        if let Some(mut mandate) = tx.lock_mandate_for_loan(&loan.id).await? {
            match mandate.apply(&MandateEvent::FullyRepaid, at) {
                Transition::Applied { .. } => tx.update_mandate(&mandate).await?,
                Transition::Ignored { current } => warn!(
                    loan_id = %loan.id,
                    mandate_id = %mandate.id,
                    status = %current,
                    "Mandate not completed on loan closure"
                ),
            }
        }

        info!(
            loan_id = %loan.id,
            certificate = %certificate.certificate_number,
            total_paid = %ledger.total_paid,
            "Loan closed"
        );

        Ok(certificate)
    }
}
