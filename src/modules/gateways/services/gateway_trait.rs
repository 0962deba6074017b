use crate::core::{Currency, Result};
use crate::modules::loans::models::Applicant;
use crate::modules::mandates::models::BankAccount;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Recurring-debit gateway operations used by loan servicing
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a recurring debit mandate and return the borrower's authorisation link
    async fn create_mandate_registration(
        &self,
        request: MandateRegistrationRequest,
    ) -> Result<MandateRegistration>;

    /// Current token status for a mandate registration order
    async fn fetch_mandate_status(&self, order_ref: &str) -> Result<MandateStatusReport>;

    /// Debit an installment against a confirmed mandate token
    async fn create_recurring_charge(&self, request: RecurringChargeRequest) -> Result<ChargeResponse>;

    /// Get gateway name
    fn name(&self) -> &str;
}

/// Mandate registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateRegistrationRequest {
    /// Loan reference, used as the order receipt
    pub loan_reference: String,

    pub customer: Applicant,

    pub bank_account: BankAccount,

    /// Upper bound for any single debit
    pub max_amount: Decimal,

    pub currency: Currency,

    pub expire_on: NaiveDate,

    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateRegistration {
    /// Registration order id; identifies the mandate in later gateway events
    pub order_ref: String,
    pub customer_ref: Option<String>,
    pub authorization_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateStatusReport {
    pub token_ref: Option<String>,
    pub confirmed: bool,
    pub bank_account: Option<BankAccount>,
}

/// Recurring debit request for one installment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringChargeRequest {
    pub token_ref: String,
    pub customer_ref: Option<String>,
    pub email: String,
    pub phone: String,

    /// Amount in major units; converted to paise on the wire
    pub amount: Decimal,
    pub currency: Currency,
    pub description: String,

    pub loan_id: String,
    pub installment_id: String,
    pub sequence_number: u32,
}

/// Charge accepted by the gateway; the outcome arrives by webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub payment_ref: String,
    pub order_ref: Option<String>,
}
