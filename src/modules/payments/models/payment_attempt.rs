use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Gateway-side lifecycle of a single debit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Created,
    Authorized,
    Success,
    Failed,
    /// Captured by the gateway but not posted; the money needs a refund or
    /// manual reconciliation
    Unapplied,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Created => "CREATED",
            AttemptStatus::Authorized => "AUTHORIZED",
            AttemptStatus::Success => "SUCCESS",
            AttemptStatus::Failed => "FAILED",
            AttemptStatus::Unapplied => "UNAPPLIED",
        }
    }

    /// Terminal attempts never change again; later events for them are duplicates
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Success | AttemptStatus::Failed | AttemptStatus::Unapplied
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(AttemptStatus::Created),
            "AUTHORIZED" => Ok(AttemptStatus::Authorized),
            "SUCCESS" => Ok(AttemptStatus::Success),
            "FAILED" => Ok(AttemptStatus::Failed),
            "UNAPPLIED" => Ok(AttemptStatus::Unapplied),
            _ => Err(format!("Invalid attempt status: {}", s)),
        }
    }
}

/// A debit requested from the gateway, keyed by the gateway's payment id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub id: String,
    pub gateway_payment_ref: String,
    pub loan_id: String,
    pub mandate_id: String,
    pub installment_id: Option<String>,
    pub amount: Decimal,
    pub status: AttemptStatus,
    pub method: Option<String>,
    pub principal_portion: Option<Decimal>,
    pub interest_portion: Option<Decimal>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    pub fn created(
        gateway_payment_ref: String,
        loan_id: String,
        mandate_id: String,
        installment_id: Option<String>,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            gateway_payment_ref,
            loan_id,
            mandate_id,
            installment_id,
            amount,
            status: AttemptStatus::Created,
            method: None,
            principal_portion: None,
            interest_portion: None,
            failure_reason: None,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn mark_authorized(&mut self, method: Option<String>, at: DateTime<Utc>) {
        self.status = AttemptStatus::Authorized;
        if method.is_some() {
            self.method = method;
        }
        self.updated_at = at;
    }

    pub fn mark_success(
        &mut self,
        principal_portion: Decimal,
        interest_portion: Decimal,
        method: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.status = AttemptStatus::Success;
        self.principal_portion = Some(principal_portion);
        self.interest_portion = Some(interest_portion);
        if method.is_some() {
            self.method = method;
        }
        self.updated_at = at;
    }

    /// Money was collected but the ledger could not take it
    pub fn mark_unapplied(&mut self, reason: String, method: Option<String>, at: DateTime<Utc>) {
        self.status = AttemptStatus::Unapplied;
        self.principal_portion = Some(Decimal::ZERO);
        self.interest_portion = Some(Decimal::ZERO);
        self.failure_reason = Some(reason);
        if method.is_some() {
            self.method = method;
        }
        self.updated_at = at;
    }

    pub fn mark_failed(&mut self, reason: String, at: DateTime<Utc>) {
        self.status = AttemptStatus::Failed;
        self.failure_reason = Some(reason);
        self.updated_at = at;
    }
}
