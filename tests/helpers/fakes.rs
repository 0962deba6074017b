use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use edu_loan_engine::core::{AppError, Result};
use edu_loan_engine::modules::gateways::services::{
    ChargeResponse, MandateRegistration, MandateRegistrationRequest, MandateStatusReport,
    PaymentGateway, RecurringChargeRequest,
};
use edu_loan_engine::modules::mandates::models::BankAccount;
use edu_loan_engine::modules::notifications::services::{NotificationKind, Notifier};

#[derive(Default)]
struct GatewayState {
    sequence: u32,
    registrations: Vec<MandateRegistrationRequest>,
    charges: Vec<RecurringChargeRequest>,
    failing_charges: usize,
    confirmed: bool,
}

/// Scripted gateway: hands out sequential references and fails the next
/// `n` charge requests on demand
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_charges(&self, n: usize) {
        self.state.lock().unwrap().failing_charges = n;
    }

    /// What `fetch_mandate_status` reports from now on
    pub fn set_confirmed(&self, confirmed: bool) {
        self.state.lock().unwrap().confirmed = confirmed;
    }

    pub fn charges(&self) -> Vec<RecurringChargeRequest> {
        self.state.lock().unwrap().charges.clone()
    }

    pub fn registrations(&self) -> Vec<MandateRegistrationRequest> {
        self.state.lock().unwrap().registrations.clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.sequence += 1;
        format!("{}_{}", prefix, state.sequence)
    }
}

/// Token id the fake gateway reports for a registration order
pub fn token_for(order_ref: &str) -> String {
    format!("token_{}", order_ref)
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_mandate_registration(
        &self,
        request: MandateRegistrationRequest,
    ) -> Result<MandateRegistration> {
        let order_ref = self.next_id("order");
        self.state.lock().unwrap().registrations.push(request);

        Ok(MandateRegistration {
            customer_ref: Some(format!("cust_{}", order_ref)),
            authorization_url: Some(format!("https://rzp.io/i/{}", order_ref)),
            order_ref,
        })
    }

    async fn fetch_mandate_status(&self, order_ref: &str) -> Result<MandateStatusReport> {
        let confirmed = self.state.lock().unwrap().confirmed;
        Ok(MandateStatusReport {
            token_ref: confirmed.then(|| token_for(order_ref)),
            confirmed,
            bank_account: None,
        })
    }

    async fn create_recurring_charge(&self, request: RecurringChargeRequest) -> Result<ChargeResponse> {
        {
            let mut state = self.state.lock().unwrap();
            if state.failing_charges > 0 {
                state.failing_charges -= 1;
                return Err(AppError::gateway("bank declined the debit request"));
            }
            state.charges.push(request);
        }

        Ok(ChargeResponse {
            payment_ref: self.next_id("pay"),
            order_ref: None,
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub recipient: String,
    pub kind: NotificationKind,
    pub data: Value,
}

/// Notifier that records every message
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent().into_iter().map(|n| n.kind).collect()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent().iter().filter(|n| n.kind == kind).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &str, kind: NotificationKind, data: Value) -> bool {
        self.sent.lock().unwrap().push(SentNotification {
            recipient: recipient.to_string(),
            kind,
            data,
        });
        true
    }
}

pub fn bank_account() -> BankAccount {
    BankAccount {
        account_number: "50100012345678".to_string(),
        ifsc: "HDFC0001234".to_string(),
        account_type: Some("savings".to_string()),
    }
}
