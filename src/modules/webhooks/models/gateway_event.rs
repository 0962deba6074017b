use serde::Deserialize;
use serde_json::Value;

use crate::core::Result;
use crate::modules::mandates::models::{BankAccount, MandateEvent};

/// Webhook notification, decoded once at the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Mandate(MandateNotice),
    Payment(PaymentNotice),
    /// Event type this service does not act on
    Unrecognized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MandateNoticeKind {
    Confirmed,
    Cancelled,
    Rejected,
    Paused,
    Resumed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MandateNotice {
    pub kind: MandateNoticeKind,
    pub token: TokenEntity,
}

impl MandateNotice {
    /// Mandate event carried by this notice
    pub fn to_event(&self) -> MandateEvent {
        match self.kind {
            MandateNoticeKind::Confirmed => MandateEvent::Confirmed {
                token_ref: self.token.id.clone(),
                bank_account: self.token.bank_account.as_ref().and_then(|b| b.to_bank_account()),
            },
            MandateNoticeKind::Cancelled => MandateEvent::Cancelled,
            MandateNoticeKind::Rejected => MandateEvent::Rejected,
            MandateNoticeKind::Paused => MandateEvent::Paused,
            MandateNoticeKind::Resumed => MandateEvent::Resumed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentNoticeKind {
    Authorized,
    Captured,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotice {
    pub kind: PaymentNoticeKind,
    pub payment: PaymentEntity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenEntity {
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub bank_account: Option<TokenBankAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenBankAccount {
    pub account_number: Option<String>,
    pub ifsc: Option<String>,
    pub account_type: Option<String>,
}

impl TokenBankAccount {
    fn to_bank_account(&self) -> Option<BankAccount> {
        Some(BankAccount {
            account_number: self.account_number.clone()?,
            ifsc: self.ifsc.clone()?,
            account_type: self.account_type.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaymentEntity {
    pub id: Option<String>,
    /// Minor units (paise)
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub method: Option<String>,
    pub order_id: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    pub error_reason: Option<String>,
    /// Razorpay sends `[]` when there are no notes
    #[serde(default)]
    pub notes: Value,
}

impl PaymentEntity {
    pub fn installment_id(&self) -> Option<&str> {
        self.notes
            .get("installment_id")
            .or_else(|| self.notes.get("emi_schedule_id"))
            .and_then(Value::as_str)
    }

    /// Human-readable failure reason, most specific first
    pub fn failure_reason(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.error_reason.clone())
            .or_else(|| self.error_code.clone())
            .unwrap_or_else(|| "payment failed".to_string())
    }
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct Wrapped<T> {
    entity: T,
}

impl GatewayEvent {
    /// Decode a raw webhook body
    pub fn parse(raw_body: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(raw_body)?;

        let mandate_kind = match envelope.event.as_str() {
            "token.confirmed" => Some(MandateNoticeKind::Confirmed),
            "token.cancelled" => Some(MandateNoticeKind::Cancelled),
            "token.rejected" => Some(MandateNoticeKind::Rejected),
            "token.paused" => Some(MandateNoticeKind::Paused),
            "token.resumed" => Some(MandateNoticeKind::Resumed),
            _ => None,
        };
        if let Some(kind) = mandate_kind {
            let token = Self::entity::<TokenEntity>(&envelope.payload, "token")?;
            return Ok(GatewayEvent::Mandate(MandateNotice { kind, token }));
        }

        let payment_kind = match envelope.event.as_str() {
            "payment.authorized" => Some(PaymentNoticeKind::Authorized),
            "payment.captured" => Some(PaymentNoticeKind::Captured),
            "payment.failed" => Some(PaymentNoticeKind::Failed),
            _ => None,
        };
        if let Some(kind) = payment_kind {
            let payment = Self::entity::<PaymentEntity>(&envelope.payload, "payment")?;
            return Ok(GatewayEvent::Payment(PaymentNotice { kind, payment }));
        }

        Ok(GatewayEvent::Unrecognized(envelope.event))
    }

    /// `payload.<key>.entity`, or an empty entity when absent
    fn entity<T: serde::de::DeserializeOwned + Default>(payload: &Value, key: &str) -> Result<T> {
        match payload.get(key) {
            Some(value) if !value.is_null() => {
                let wrapped: Wrapped<T> = serde_json::from_value(value.clone())?;
                Ok(wrapped.entity)
            }
            _ => Ok(T::default()),
        }
    }

    pub fn name(&self) -> String {
        match self {
            GatewayEvent::Mandate(notice) => format!("token.{:?}", notice.kind).to_lowercase(),
            GatewayEvent::Payment(notice) => format!("payment.{:?}", notice.kind).to_lowercase(),
            GatewayEvent::Unrecognized(event) => event.clone(),
        }
    }
}
