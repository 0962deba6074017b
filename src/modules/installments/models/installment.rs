use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Installment status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    Pending,
    /// A charge has been handed to the gateway; the outcome arrives by webhook
    Processing,
    Success,
    Failed,
    PaidManually,
    /// Automatic retries exhausted; needs manual follow-up
    Escalated,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "PENDING",
            InstallmentStatus::Processing => "PROCESSING",
            InstallmentStatus::Success => "SUCCESS",
            InstallmentStatus::Failed => "FAILED",
            InstallmentStatus::PaidManually => "PAID_MANUALLY",
            InstallmentStatus::Escalated => "ESCALATED",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, InstallmentStatus::Success | InstallmentStatus::PaidManually)
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(InstallmentStatus::Pending),
            "PROCESSING" => Ok(InstallmentStatus::Processing),
            "SUCCESS" => Ok(InstallmentStatus::Success),
            "FAILED" => Ok(InstallmentStatus::Failed),
            "PAID_MANUALLY" => Ok(InstallmentStatus::PaidManually),
            "ESCALATED" => Ok(InstallmentStatus::Escalated),
            _ => Err(format!("Invalid installment status: {}", s)),
        }
    }
}

/// One scheduled EMI under a mandate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: String,
    pub mandate_id: String,
    pub loan_id: String,
    /// 1-based, unique per mandate
    pub sequence_number: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub retry_count: u32,
    pub linked_payment_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Installment {
    pub fn new(
        mandate_id: String,
        loan_id: String,
        sequence_number: u32,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            mandate_id,
            loan_id,
            sequence_number,
            amount,
            due_date,
            status: InstallmentStatus::Pending,
            retry_count: 0,
            linked_payment_ref: None,
            failure_reason: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Eligible for an automatic charge attempt
    pub fn is_chargeable(&self, max_retries: u32) -> bool {
        matches!(
            self.status,
            InstallmentStatus::Pending | InstallmentStatus::Failed
        ) && self.retry_count < max_retries
    }

    /// A manual repayment may settle anything not already settled or in flight
    pub fn accepts_manual_payment(&self) -> bool {
        matches!(
            self.status,
            InstallmentStatus::Pending | InstallmentStatus::Failed | InstallmentStatus::Escalated
        )
    }

    /// Gateway accepted the charge request
    pub fn link_payment(&mut self, payment_ref: String, at: DateTime<Utc>) {
        self.status = InstallmentStatus::Processing;
        self.linked_payment_ref = Some(payment_ref);
        self.updated_at = at;
    }

    /// Gateway refused to create the charge. The installment goes back to the
    /// status it had before it was claimed, or escalates at the retry cap.
    pub fn record_initiation_failure(
        &mut self,
        previous: InstallmentStatus,
        reason: String,
        max_retries: u32,
        at: DateTime<Utc>,
    ) {
        self.retry_count += 1;
        self.failure_reason = Some(reason);
        self.status = if self.retry_count >= max_retries {
            InstallmentStatus::Escalated
        } else {
            previous
        };
        self.updated_at = at;
    }

    /// Debit reported failed by the gateway
    pub fn mark_failed(&mut self, reason: String, max_retries: u32, at: DateTime<Utc>) {
        self.retry_count += 1;
        self.failure_reason = Some(reason);
        self.status = if self.retry_count >= max_retries {
            InstallmentStatus::Escalated
        } else {
            InstallmentStatus::Failed
        };
        self.updated_at = at;
    }

    pub fn mark_succeeded(&mut self, payment_ref: String, at: DateTime<Utc>) {
        self.status = InstallmentStatus::Success;
        self.linked_payment_ref = Some(payment_ref);
        self.failure_reason = None;
        self.paid_at = Some(at);
        self.updated_at = at;
    }

    /// Gateway collected this installment but the ledger could not take the
    /// money. Escalated with the payment linked so it can be reconciled.
    pub fn mark_unapplied(&mut self, payment_ref: String, reason: String, at: DateTime<Utc>) {
        self.status = InstallmentStatus::Escalated;
        self.linked_payment_ref = Some(payment_ref);
        self.failure_reason = Some(reason);
        self.updated_at = at;
    }

    pub fn mark_paid_manually(&mut self, utr: String, at: DateTime<Utc>) {
        self.status = InstallmentStatus::PaidManually;
        self.linked_payment_ref = Some(utr);
        self.paid_at = Some(at);
        self.updated_at = at;
    }
}
