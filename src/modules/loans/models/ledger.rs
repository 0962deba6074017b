use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::{AppError, Result};

/// Remaining balance at or below this is treated as settled
pub const CLOSURE_EPSILON: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Running balance of a disbursed loan.
///
/// `total_outstanding == principal_outstanding + interest_outstanding` holds
/// after every mutation and no component ever goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanLedger {
    pub loan_id: String,
    pub principal_outstanding: Decimal,
    pub interest_outstanding: Decimal,
    pub total_outstanding: Decimal,
    pub total_paid: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl LoanLedger {
    /// Opening position at disbursement
    pub fn opening(loan_id: String, principal: Decimal, interest: Decimal) -> Self {
        Self {
            loan_id,
            principal_outstanding: principal,
            interest_outstanding: interest,
            total_outstanding: principal + interest,
            total_paid: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn check_invariants(&self) -> Result<()> {
        if self.principal_outstanding < Decimal::ZERO
            || self.interest_outstanding < Decimal::ZERO
            || self.total_paid < Decimal::ZERO
        {
            return Err(AppError::inconsistency(format!(
                "negative balance on ledger {}",
                self.loan_id
            )));
        }

        if self.total_outstanding != self.principal_outstanding + self.interest_outstanding {
            return Err(AppError::inconsistency(format!(
                "ledger {} total {} != principal {} + interest {}",
                self.loan_id,
                self.total_outstanding,
                self.principal_outstanding,
                self.interest_outstanding
            )));
        }

        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        self.total_outstanding <= CLOSURE_EPSILON
    }

    /// Zero every outstanding component, keeping the paid total
    pub fn settle(&mut self, at: DateTime<Utc>) {
        self.principal_outstanding = Decimal::ZERO;
        self.interest_outstanding = Decimal::ZERO;
        self.total_outstanding = Decimal::ZERO;
        self.updated_at = at;
    }
}

/// Channel a repayment arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentSource {
    /// Auto-debit captured through the mandate
    Mandate,
    /// Out-of-band transfer recorded with its UTR
    Manual,
    /// EMI collected up front at disbursement
    AdvanceEmi,
}

impl RepaymentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentSource::Mandate => "MANDATE",
            RepaymentSource::Manual => "MANUAL",
            RepaymentSource::AdvanceEmi => "ADVANCE_EMI",
        }
    }
}

impl fmt::Display for RepaymentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepaymentSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MANDATE" => Ok(RepaymentSource::Mandate),
            "MANUAL" => Ok(RepaymentSource::Manual),
            "ADVANCE_EMI" => Ok(RepaymentSource::AdvanceEmi),
            _ => Err(format!("Invalid repayment source: {}", s)),
        }
    }
}

/// One applied repayment. `payment_ref` is unique per loan ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub loan_id: String,
    pub payment_ref: String,
    pub source: RepaymentSource,
    pub amount: Decimal,
    pub principal_portion: Decimal,
    pub interest_portion: Decimal,
    /// Total outstanding right after this entry was applied
    pub outstanding_after: Decimal,
    pub installment_id: Option<String>,
    pub applied_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        loan_id: String,
        payment_ref: String,
        source: RepaymentSource,
        amount: Decimal,
        principal_portion: Decimal,
        interest_portion: Decimal,
        outstanding_after: Decimal,
        applied_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            loan_id,
            payment_ref,
            source,
            amount,
            principal_portion,
            interest_portion,
            outstanding_after,
            installment_id: None,
            applied_at,
        }
    }

    pub fn with_installment(mut self, installment_id: Option<String>) -> Self {
        self.installment_id = installment_id;
        self
    }
}

/// Issued exactly once, when a loan closes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureCertificate {
    pub id: String,
    pub loan_id: String,
    pub certificate_number: String,
    pub total_paid: Decimal,
    pub issued_at: DateTime<Utc>,
}

impl ClosureCertificate {
    pub fn issue(loan_id: String, loan_reference: &str, total_paid: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            certificate_number: format!("NOC-{}-{}", loan_reference, at.format("%Y%m%d")),
            loan_id,
            total_paid,
            issued_at: at,
        }
    }
}
