use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::{AppError, Clock, Currency, Result};
use crate::modules::gateways::services::{MandateRegistrationRequest, PaymentGateway};
use crate::modules::loans::models::{Loan, LoanStatus};
use crate::modules::mandates::models::{BankAccount, Mandate, MandateEvent, MandateStatus, Transition};
use crate::modules::notifications::services::{NotificationKind, Notifier};
use crate::store::{LoanStore, StoreTx};

/// Headroom over the EMI allowed for a single mandate debit
const MAX_AMOUNT_FACTOR: Decimal = Decimal::from_parts(11, 0, 0, false, 1);

/// Mandate registration and lifecycle
pub struct MandateService {
    store: Arc<dyn LoanStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl MandateService {
    pub fn new(
        store: Arc<dyn LoanStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            clock,
        }
    }

    /// Register a recurring mandate for an approved loan.
    ///
    /// The mandate starts on the first of next month and runs for the loan
    /// tenure; the debit cap is 110% of the EMI.
    ///
    /// # Errors
    /// * `NotFound` - unknown loan
    /// * `MandateStateConflict` - loan not APPROVED or already has a mandate
    /// * `GatewayUnavailable` - registration failed at the gateway
    pub async fn initiate(&self, loan_id: &str, bank_account: BankAccount) -> Result<Mandate> {
        let loan = {
            let mut tx = self.store.begin().await?;
            let loan = Self::load_registrable_loan(tx.as_mut(), loan_id).await?;
            drop(tx);
            loan
        };

        let valid_from = Self::first_of_next_month(self.clock.today())?;
        let valid_to = valid_from
            .checked_add_months(Months::new(loan.terms.tenure_months))
            .ok_or_else(|| AppError::invalid_terms("mandate end date out of range"))?;
        let max_amount = Currency::INR.round(loan.emi_amount * MAX_AMOUNT_FACTOR);

        let registration = self
            .gateway
            .create_mandate_registration(MandateRegistrationRequest {
                loan_reference: loan.reference.clone(),
                customer: loan.applicant.clone(),
                bank_account: bank_account.clone(),
                max_amount,
                currency: Currency::INR,
                expire_on: valid_to,
                description: format!("EMI mandate for loan {}", loan.reference),
            })
            .await?;

        let mandate = Mandate::new(
            loan.id.clone(),
            registration.order_ref,
            registration.customer_ref,
            Some(bank_account),
            max_amount,
            valid_from,
            valid_to,
            registration.authorization_url,
        );

        let mut tx = self.store.begin().await?;
        if let Err(e) = Self::load_registrable_loan(tx.as_mut(), loan_id).await {
            warn!(
                loan_id,
                order_ref = %mandate.gateway_order_ref,
                "Loan changed while registering mandate; gateway registration left orphaned"
            );
            return Err(e);
        }
        tx.insert_mandate(&mandate).await?;
        tx.update_loan_status(&loan.id, LoanStatus::MandatePending).await?;
        tx.commit().await?;

        info!(
            loan_id = %loan.id,
            mandate_id = %mandate.id,
            order_ref = %mandate.gateway_order_ref,
            max_amount = %mandate.max_amount,
            "Mandate registration initiated"
        );

        self.notifier
            .notify(
                &loan.applicant.email,
                NotificationKind::MandateAuthorizationRequested,
                serde_json::json!({
                    "loan_reference": loan.reference,
                    "authorization_url": mandate.authorization_url,
                    "max_amount": mandate.max_amount.to_string(),
                }),
            )
            .await;

        Ok(mandate)
    }

    /// Poll the gateway for a pending mandate and activate it once confirmed
    pub async fn sync_status(&self, loan_id: &str) -> Result<Mandate> {
        let mandate = {
            let mut tx = self.store.begin().await?;
            let mandate = tx
                .lock_mandate_for_loan(loan_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("mandate for loan {}", loan_id)))?;
            drop(tx);
            mandate
        };

        if mandate.status != MandateStatus::Created {
            return Ok(mandate);
        }

        let report = self
            .gateway
            .fetch_mandate_status(&mandate.gateway_order_ref)
            .await?;
        if !report.confirmed {
            return Ok(mandate);
        }

        let mut tx = self.store.begin().await?;
        tx.lock_loan(loan_id).await?;
        let mut mandate = tx
            .lock_mandate_for_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("mandate for loan {}", loan_id)))?;
        let event = MandateEvent::Confirmed {
            token_ref: report.token_ref,
            bank_account: report.bank_account,
        };
        let (transition, loan) =
            Self::apply_event(tx.as_mut(), &mut mandate, &event, self.clock.now()).await?;
        tx.commit().await?;

        if let (Transition::Applied { .. }, Some(loan)) = (transition, loan) {
            self.notify_transition(&loan, &mandate).await;
        }

        Ok(mandate)
    }

    /// Apply `event` to a locked mandate and carry the loan status along.
    ///
    /// Activation moves a pending loan to MANDATE_ACTIVE; cancellation or
    /// rejection before disbursement sends it back to APPROVED. Mismatched
    /// events are logged and leave everything unchanged. The caller locks the
    /// loan before the mandate.
    pub async fn apply_event(
        tx: &mut dyn StoreTx,
        mandate: &mut Mandate,
        event: &MandateEvent,
        at: DateTime<Utc>,
    ) -> Result<(Transition, Option<Loan>)> {
        let transition = mandate.apply(event, at);

        let (from, to) = match transition {
            Transition::Applied { from, to } => (from, to),
            Transition::Ignored { current } => {
                warn!(
                    mandate_id = %mandate.id,
                    status = %current,
                    event = event.name(),
                    "Mandate event ignored in current state"
                );
                return Ok((transition, None));
            }
        };

        tx.update_mandate(mandate).await?;

        let mut loan = tx.lock_loan(&mandate.loan_id).await?;
        if let Some(loan) = loan.as_mut() {
            let next = match to {
                MandateStatus::Active
                    if matches!(loan.status, LoanStatus::Approved | LoanStatus::MandatePending) =>
                {
                    Some(LoanStatus::MandateActive)
                }
                MandateStatus::Cancelled | MandateStatus::Rejected
                    if loan.status.is_pre_disbursement() =>
                {
                    Some(LoanStatus::Approved)
                }
                MandateStatus::Cancelled | MandateStatus::Rejected => {
                    warn!(
                        loan_id = %loan.id,
                        loan_status = %loan.status,
                        mandate_status = %to,
                        "Mandate ended on a disbursed loan; auto-debit stopped"
                    );
                    None
                }
                _ => None,
            };

            if let Some(next) = next {
                tx.update_loan_status(&loan.id, next).await?;
                loan.status = next;
            }
        }

        info!(
            mandate_id = %mandate.id,
            loan_id = %mandate.loan_id,
            from = %from,
            to = %to,
            event = event.name(),
            "Mandate transitioned"
        );

        Ok((transition, loan))
    }

    /// Notification for a transition that was just committed
    pub async fn notify_transition(&self, loan: &Loan, mandate: &Mandate) {
        notify_mandate_change(self.notifier.as_ref(), loan, mandate).await;
    }

    async fn load_registrable_loan(tx: &mut dyn StoreTx, loan_id: &str) -> Result<Loan> {
        let loan = tx
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("loan {}", loan_id)))?;

        if loan.status != LoanStatus::Approved {
            return Err(AppError::conflict(format!(
                "loan {} is {}; mandates can only be set up for approved loans",
                loan.id, loan.status
            )));
        }
        if tx.lock_mandate_for_loan(loan_id).await?.is_some() {
            return Err(AppError::conflict(format!(
                "loan {} already has a mandate",
                loan.id
            )));
        }

        Ok(loan)
    }

    fn first_of_next_month(today: NaiveDate) -> Result<NaiveDate> {
        today
            .with_day(1)
            .and_then(|d| d.checked_add_months(Months::new(1)))
            .ok_or_else(|| AppError::internal("cannot compute mandate start date"))
    }
}

/// Borrower notification for a mandate state change, if it warrants one
pub async fn notify_mandate_change(notifier: &dyn Notifier, loan: &Loan, mandate: &Mandate) {
    let kind = match mandate.status {
        MandateStatus::Active => NotificationKind::MandateActivated,
        MandateStatus::Cancelled | MandateStatus::Rejected => NotificationKind::MandateCancelled,
        _ => return,
    };

    notifier
        .notify(
            &loan.applicant.email,
            kind,
            serde_json::json!({
                "loan_reference": loan.reference,
                "mandate_status": mandate.status.as_str(),
            }),
        )
        .await;
}
