use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::fakes::{bank_account, token_for, FakeGateway, RecordingNotifier};
use super::payloads::token_event;
use edu_loan_engine::config::SchedulerConfig;
use edu_loan_engine::core::{Clock, Currency, FixedClock, Result};
use edu_loan_engine::modules::installments::models::Installment;
use edu_loan_engine::modules::installments::services::{ChargeService, RetryScheduler};
use edu_loan_engine::modules::loans::models::{
    Applicant, InterestPayer, InterestType, Loan, LoanLedger, LoanTerms,
};
use edu_loan_engine::modules::loans::services::{
    Disbursement, DisbursementService, LoanService, RepaymentService,
};
use edu_loan_engine::modules::mandates::models::Mandate;
use edu_loan_engine::modules::mandates::services::MandateService;
use edu_loan_engine::modules::payments::models::PaymentAttempt;
use edu_loan_engine::modules::webhooks::services::{
    SignatureVerifier, WebhookEventProcessor, WebhookOutcome,
};
use edu_loan_engine::store::{LoanStore, MemoryStore};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const MAX_RETRIES: u32 = 3;

/// Business date the environment starts on
pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn applicant() -> Applicant {
    Applicant {
        name: "Asha Rao".to_string(),
        email: "asha.rao@example.com".to_string(),
        phone: "+919800000001".to_string(),
    }
}

/// 1,00,000 at 12% flat over 12 months, borrower pays interest
pub fn flat_terms() -> LoanTerms {
    LoanTerms::new(
        dec!(100000),
        dec!(12),
        12,
        InterestType::Flat,
        InterestPayer::Student,
    )
    .unwrap()
}

/// Same principal and tenure, interest borne by the partner institute
pub fn partner_terms() -> LoanTerms {
    LoanTerms::new(
        dec!(100000),
        dec!(12),
        12,
        InterestType::Flat,
        InterestPayer::Partner,
    )
    .unwrap()
}

pub fn reducing_terms() -> LoanTerms {
    LoanTerms::new(
        dec!(100000),
        dec!(12),
        12,
        InterestType::Reducing,
        InterestPayer::Student,
    )
    .unwrap()
}

/// Fully wired services over one in-memory store
pub struct TestEnv {
    pub store: Arc<dyn LoanStore>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
    pub loans: LoanService,
    pub mandates: MandateService,
    pub disbursements: DisbursementService,
    pub repayments: RepaymentService,
    pub charges: Arc<ChargeService>,
    pub scheduler: RetryScheduler,
    pub webhooks: WebhookEventProcessor,
    pub signer: SignatureVerifier,
}

impl TestEnv {
    pub fn new() -> Self {
        let store: Arc<dyn LoanStore> = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(FixedClock::at_date(start_date()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let charges = Arc::new(ChargeService::new(
            store.clone(),
            gateway.clone(),
            dyn_clock.clone(),
            MAX_RETRIES,
            Duration::from_secs(5),
        ));
        let scheduler = RetryScheduler::new(
            store.clone(),
            charges.clone(),
            dyn_clock.clone(),
            SchedulerConfig {
                max_retries: MAX_RETRIES,
                ..SchedulerConfig::default()
            },
        );

        Self {
            loans: LoanService::new(store.clone()),
            mandates: MandateService::new(
                store.clone(),
                gateway.clone(),
                notifier.clone(),
                dyn_clock.clone(),
            ),
            disbursements: DisbursementService::new(store.clone(), dyn_clock.clone()),
            repayments: RepaymentService::new(store.clone(), notifier.clone(), dyn_clock.clone()),
            webhooks: WebhookEventProcessor::new(
                store.clone(),
                notifier.clone(),
                dyn_clock,
                SignatureVerifier::new(WEBHOOK_SECRET),
                MAX_RETRIES,
            ),
            signer: SignatureVerifier::new(WEBHOOK_SECRET),
            charges,
            scheduler,
            store,
            gateway,
            notifier,
            clock,
        }
    }

    pub async fn approved_loan(&self, reference: &str, terms: LoanTerms) -> Loan {
        self.loans
            .register(reference.to_string(), applicant(), terms)
            .await
            .expect("loan registration")
    }

    /// Loan with a mandate confirmed through the webhook path
    pub async fn mandated_loan(&self, reference: &str, terms: LoanTerms) -> (Loan, Mandate) {
        let loan = self.approved_loan(reference, terms).await;
        let mandate = self
            .mandates
            .initiate(&loan.id, bank_account())
            .await
            .expect("mandate initiation");

        let order_ref = mandate.gateway_order_ref.clone();
        let outcome = self
            .deliver(&token_event("token.confirmed", &order_ref, &token_for(&order_ref)))
            .await
            .expect("mandate confirmation");
        assert!(matches!(outcome, WebhookOutcome::Processed { .. }));

        (
            self.loans.get(&loan.id).await.unwrap(),
            self.mandate(&loan.id).await,
        )
    }

    pub async fn disbursed_loan(
        &self,
        reference: &str,
        terms: LoanTerms,
        advance_emi: Option<Decimal>,
    ) -> Disbursement {
        let (loan, _) = self.mandated_loan(reference, terms).await;
        self.disbursements
            .disburse(&loan.id, advance_emi)
            .await
            .expect("disbursement")
    }

    /// Sign and hand a webhook body to the processor
    pub async fn deliver(&self, body: &Value) -> Result<WebhookOutcome> {
        let raw = serde_json::to_vec(body).unwrap();
        let signature = self.signer.sign(&raw);
        self.webhooks.handle_event(&raw, Some(&signature)).await
    }

    pub async fn mandate(&self, loan_id: &str) -> Mandate {
        let mut tx = self.store.begin().await.unwrap();
        tx.lock_mandate_for_loan(loan_id).await.unwrap().expect("mandate")
    }

    pub async fn ledger(&self, loan_id: &str) -> LoanLedger {
        let mut tx = self.store.begin().await.unwrap();
        tx.lock_ledger(loan_id).await.unwrap().expect("ledger")
    }

    pub async fn installments(&self, mandate_id: &str) -> Vec<Installment> {
        let mut tx = self.store.begin().await.unwrap();
        tx.list_installments(mandate_id).await.unwrap()
    }

    pub async fn installment(&self, installment_id: &str) -> Installment {
        let mut tx = self.store.begin().await.unwrap();
        tx.lock_installment(installment_id).await.unwrap().expect("installment")
    }

    pub async fn attempt(&self, payment_ref: &str) -> Option<PaymentAttempt> {
        let mut tx = self.store.begin().await.unwrap();
        tx.lock_attempt(payment_ref).await.unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Amount in paise as the gateway sends it
pub fn paise(amount: Decimal) -> i64 {
    Currency::INR.to_minor_units(amount).unwrap()
}
