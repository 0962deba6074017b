use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Recurring debit authorisation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MandateStatus {
    /// Registered with the gateway, waiting for the borrower's bank
    Created,
    Active,
    Paused,
    Cancelled,
    Rejected,
    /// Loan fully repaid
    Completed,
}

impl MandateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MandateStatus::Created => "CREATED",
            MandateStatus::Active => "ACTIVE",
            MandateStatus::Paused => "PAUSED",
            MandateStatus::Cancelled => "CANCELLED",
            MandateStatus::Rejected => "REJECTED",
            MandateStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MandateStatus::Cancelled | MandateStatus::Rejected | MandateStatus::Completed
        )
    }
}

impl fmt::Display for MandateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MandateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(MandateStatus::Created),
            "ACTIVE" => Ok(MandateStatus::Active),
            "PAUSED" => Ok(MandateStatus::Paused),
            "CANCELLED" => Ok(MandateStatus::Cancelled),
            "REJECTED" => Ok(MandateStatus::Rejected),
            "COMPLETED" => Ok(MandateStatus::Completed),
            _ => Err(format!("Invalid mandate status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_number: String,
    pub ifsc: String,
    pub account_type: Option<String>,
}

/// Everything that can move a mandate between states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MandateEvent {
    /// Bank approved the registration; carries the reusable token
    Confirmed {
        token_ref: Option<String>,
        bank_account: Option<BankAccount>,
    },
    Cancelled,
    Rejected,
    Paused,
    Resumed,
    /// Raised internally when the loan closes
    FullyRepaid,
}

impl MandateEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MandateEvent::Confirmed { .. } => "confirmed",
            MandateEvent::Cancelled => "cancelled",
            MandateEvent::Rejected => "rejected",
            MandateEvent::Paused => "paused",
            MandateEvent::Resumed => "resumed",
            MandateEvent::FullyRepaid => "fully_repaid",
        }
    }
}

/// Result of feeding an event to a mandate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied {
        from: MandateStatus,
        to: MandateStatus,
    },
    /// Event not valid from the current state; the mandate is unchanged
    Ignored { current: MandateStatus },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mandate {
    pub id: String,
    pub loan_id: String,
    pub status: MandateStatus,
    /// Gateway order created for the registration
    pub gateway_order_ref: String,
    /// Reusable debit token, known once confirmed
    pub gateway_token_ref: Option<String>,
    pub gateway_customer_ref: Option<String>,
    pub bank_account: Option<BankAccount>,
    pub max_amount: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub authorization_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mandate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        loan_id: String,
        gateway_order_ref: String,
        gateway_customer_ref: Option<String>,
        bank_account: Option<BankAccount>,
        max_amount: Decimal,
        valid_from: NaiveDate,
        valid_to: NaiveDate,
        authorization_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            loan_id,
            status: MandateStatus::Created,
            gateway_order_ref,
            gateway_token_ref: None,
            gateway_customer_ref,
            bank_account,
            max_amount,
            valid_from,
            valid_to,
            authorization_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an event according to the mandate state table.
    ///
    /// Events that are not valid from the current state leave the mandate
    /// untouched and report `Transition::Ignored`.
    pub fn apply(&mut self, event: &MandateEvent, at: DateTime<Utc>) -> Transition {
        use MandateStatus::*;

        let from = self.status;
        let to = match (from, event) {
            (Created, MandateEvent::Confirmed { .. }) => Active,
            (Created | Active | Paused, MandateEvent::Cancelled) => Cancelled,
            (Created | Active | Paused, MandateEvent::Rejected) => Rejected,
            (Active, MandateEvent::Paused) => Paused,
            (Paused, MandateEvent::Resumed) => Active,
            (Active | Paused, MandateEvent::FullyRepaid) => Completed,
            _ => return Transition::Ignored { current: from },
        };

        if let MandateEvent::Confirmed {
            token_ref,
            bank_account,
        } = event
        {
            if token_ref.is_some() {
                self.gateway_token_ref = token_ref.clone();
            }
            if bank_account.is_some() {
                self.bank_account = bank_account.clone();
            }
        }

        self.status = to;
        self.updated_at = at;
        Transition::Applied { from, to }
    }
}
