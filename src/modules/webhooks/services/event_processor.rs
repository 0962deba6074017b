use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::signature::SignatureVerifier;
use crate::core::{AppError, Clock, Currency, Result};
use crate::modules::installments::models::InstallmentStatus;
use crate::modules::loans::models::RepaymentSource;
use crate::modules::loans::services::repayment_service::notify_repayment;
use crate::modules::loans::services::{PaymentAllocator, RepaymentPosting};
use crate::modules::mandates::models::Transition;
use crate::modules::mandates::services::mandate_service::notify_mandate_change;
use crate::modules::mandates::services::MandateService;
use crate::modules::notifications::services::{NotificationKind, Notifier};
use crate::modules::payments::models::PaymentAttempt;
use crate::modules::webhooks::models::{
    GatewayEvent, MandateNotice, PaymentEntity, PaymentNotice, PaymentNoticeKind,
};
use crate::store::{LoanStore, StoreTx};

/// How a verified webhook was handled. All variants are acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WebhookOutcome {
    Processed { event: String, reference: String },
    /// Already applied earlier; nothing changed
    Duplicate { event: String, reference: String },
    Ignored { event: String, reason: String },
}

/// Verifies, decodes, and applies gateway webhooks.
///
/// Each event is applied in a single transaction with the affected rows
/// locked, so redelivered or concurrent copies of an event are applied once.
pub struct WebhookEventProcessor {
    store: Arc<dyn LoanStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    verifier: SignatureVerifier,
    max_retries: u32,
}

impl WebhookEventProcessor {
    pub fn new(
        store: Arc<dyn LoanStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        verifier: SignatureVerifier,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            verifier,
            max_retries,
        }
    }

    /// Handle one webhook delivery
    ///
    /// # Arguments
    /// * `raw_body` - Request body exactly as received
    /// * `signature` - Value of the signature header, if present
    ///
    /// # Errors
    /// * `SignatureInvalid` - missing or wrong signature; nothing is read or written
    /// * `Json` - body is not a gateway event
    /// * `MissingReference` - event lacks the id needed to find its target
    /// * `NotFound` - payment attempt unknown (yet); the gateway will redeliver
    pub async fn handle_event(&self, raw_body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        let verified = signature
            .map(|sig| self.verifier.verify(raw_body, sig))
            .unwrap_or(false);
        if !verified {
            warn!(
                has_signature = signature.is_some(),
                "Rejected webhook with invalid signature"
            );
            return Err(AppError::SignatureInvalid);
        }

        let event = GatewayEvent::parse(raw_body)?;
        let name = event.name();
        info!(event = %name, "Webhook received");

        match event {
            GatewayEvent::Mandate(notice) => self.handle_mandate(name, notice).await,
            GatewayEvent::Payment(notice) => self.handle_payment(name, notice).await,
            GatewayEvent::Unrecognized(event) => {
                info!(event = %event, "Ignoring unhandled webhook event");
                Ok(WebhookOutcome::Ignored {
                    event,
                    reason: "event type not handled".to_string(),
                })
            }
        }
    }

    async fn handle_mandate(&self, name: String, notice: MandateNotice) -> Result<WebhookOutcome> {
        let order_ref = notice.token.order_id.as_deref();
        let token_ref = notice.token.id.as_deref();
        let reference = order_ref
            .or(token_ref)
            .ok_or_else(|| AppError::MissingReference("token order_id or id".to_string()))?
            .to_string();

        let mut tx = self.store.begin().await?;
        let mandate = match tx.find_mandate_loan_id(order_ref, token_ref).await? {
            Some(loan_id) => {
                tx.lock_loan(&loan_id).await?;
                tx.lock_mandate_by_gateway_ref(order_ref, token_ref).await?
            }
            None => None,
        };
        let Some(mut mandate) = mandate else {
            warn!(event = %name, reference = %reference, "Webhook for unknown mandate");
            return Ok(WebhookOutcome::Ignored {
                event: name,
                reason: format!("no mandate for {}", reference),
            });
        };

        let (transition, loan) = MandateService::apply_event(
            tx.as_mut(),
            &mut mandate,
            &notice.to_event(),
            self.clock.now(),
        )
        .await?;
        tx.commit().await?;

        match transition {
            Transition::Applied { .. } => {
                if let Some(loan) = loan {
                    notify_mandate_change(self.notifier.as_ref(), &loan, &mandate).await;
                }
                Ok(WebhookOutcome::Processed {
                    event: name,
                    reference: mandate.id,
                })
            }
            Transition::Ignored { current } => Ok(WebhookOutcome::Ignored {
                event: name,
                reason: format!("mandate is {}", current),
            }),
        }
    }

    async fn handle_payment(&self, name: String, notice: PaymentNotice) -> Result<WebhookOutcome> {
        let payment_ref = notice
            .payment
            .id
            .clone()
            .ok_or_else(|| AppError::MissingReference("payment id".to_string()))?;

        let mut tx = self.store.begin().await?;
        let mut attempt = tx
            .lock_attempt(&payment_ref)
            .await?
            .ok_or_else(|| AppError::not_found(format!("payment attempt {}", payment_ref)))?;

        if attempt.status.is_terminal() {
            info!(
                event = %name,
                payment_ref = %payment_ref,
                status = %attempt.status,
                "Duplicate payment event"
            );
            return Ok(WebhookOutcome::Duplicate {
                event: name,
                reference: payment_ref,
            });
        }

        match notice.kind {
            PaymentNoticeKind::Authorized => {
                attempt.mark_authorized(notice.payment.method.clone(), self.clock.now());
                tx.update_attempt(&attempt).await?;
                tx.commit().await?;
                info!(payment_ref = %payment_ref, "Payment authorized");
            }
            PaymentNoticeKind::Captured => {
                return self
                    .apply_capture(tx, name, attempt, &notice.payment)
                    .await;
            }
            PaymentNoticeKind::Failed => {
                self.apply_failure(tx, attempt, &notice.payment).await?;
            }
        }

        Ok(WebhookOutcome::Processed {
            event: name,
            reference: payment_ref,
        })
    }

    /// Post the captured amount, mark the attempt and installment paid, and
    /// close the loan if this settles it. One transaction.
    async fn apply_capture(
        &self,
        mut tx: Box<dyn StoreTx>,
        name: String,
        mut attempt: PaymentAttempt,
        payment: &PaymentEntity,
    ) -> Result<WebhookOutcome> {
        let now = self.clock.now();
        let amount = payment
            .amount
            .map(|paise| Currency::INR.from_minor_units(paise))
            .unwrap_or(attempt.amount);
        let installment_id = attempt
            .installment_id
            .clone()
            .or_else(|| payment.installment_id().map(str::to_string));

        let posted = match PaymentAllocator::post(
            tx.as_mut(),
            RepaymentPosting {
                loan_id: attempt.loan_id.clone(),
                payment_ref: attempt.gateway_payment_ref.clone(),
                source: RepaymentSource::Mandate,
                amount,
                installment_id: installment_id.clone(),
                at: now,
            },
        )
        .await
        {
            Ok(posted) => posted,
            Err(AppError::DuplicateEvent(reference)) => {
                return Ok(WebhookOutcome::Duplicate {
                    event: name,
                    reference,
                })
            }
            Err(e @ (AppError::MandateStateConflict(_) | AppError::Overpayment { .. })) => {
                return self
                    .record_unapplied(tx, name, attempt, installment_id, payment, e.to_string())
                    .await;
            }
            Err(e) => return Err(e),
        };

        attempt.mark_success(
            posted.entry.principal_portion,
            posted.entry.interest_portion,
            payment.method.clone(),
            now,
        );
        tx.update_attempt(&attempt).await?;

        if let Some(id) = &installment_id {
            match tx.lock_installment(id).await? {
                Some(mut installment) => {
                    installment.mark_succeeded(attempt.gateway_payment_ref.clone(), now);
                    tx.update_installment(&installment).await?;
                }
                None => warn!(
                    installment_id = %id,
                    payment_ref = %attempt.gateway_payment_ref,
                    "Captured payment references unknown installment"
                ),
            }
        }

        tx.commit().await?;

        info!(
            payment_ref = %attempt.gateway_payment_ref,
            loan_id = %attempt.loan_id,
            amount = %amount,
            outstanding = %posted.ledger.total_outstanding,
            closed = posted.closed,
            "Payment captured"
        );

        notify_repayment(self.notifier.as_ref(), &posted).await;

        Ok(WebhookOutcome::Processed {
            event: name,
            reference: attempt.gateway_payment_ref,
        })
    }

    /// The gateway collected money the ledger cannot take (loan already
    /// closed, or the amount now exceeds what is owed). The capture is still
    /// final: the attempt and installment are flagged for reconciliation and
    /// the event is acknowledged so the gateway stops redelivering it.
    async fn record_unapplied(
        &self,
        mut tx: Box<dyn StoreTx>,
        name: String,
        mut attempt: PaymentAttempt,
        installment_id: Option<String>,
        payment: &PaymentEntity,
        reason: String,
    ) -> Result<WebhookOutcome> {
        let now = self.clock.now();

        attempt.mark_unapplied(reason.clone(), payment.method.clone(), now);
        tx.update_attempt(&attempt).await?;

        if let Some(id) = &installment_id {
            if let Some(mut installment) = tx.lock_installment(id).await? {
                if !installment.status.is_settled() {
                    installment.mark_unapplied(
                        attempt.gateway_payment_ref.clone(),
                        reason.clone(),
                        now,
                    );
                    tx.update_installment(&installment).await?;
                }
            }
        }

        tx.commit().await?;

        warn!(
            payment_ref = %attempt.gateway_payment_ref,
            loan_id = %attempt.loan_id,
            amount = %attempt.amount,
            reason = %reason,
            "Captured payment could not be applied; needs reconciliation"
        );

        Ok(WebhookOutcome::Ignored {
            event: name,
            reason: format!("payment not applied: {}", reason),
        })
    }

    async fn apply_failure(
        &self,
        mut tx: Box<dyn StoreTx>,
        mut attempt: PaymentAttempt,
        payment: &PaymentEntity,
    ) -> Result<()> {
        let now = self.clock.now();
        let reason = payment.failure_reason();

        attempt.mark_failed(reason.clone(), now);
        tx.update_attempt(&attempt).await?;

        let loan = tx.lock_loan(&attempt.loan_id).await?;
        let mut escalated = false;
        if let Some(id) = &attempt.installment_id {
            if let Some(mut installment) = tx.lock_installment(id).await? {
                installment.mark_failed(reason.clone(), self.max_retries, now);
                escalated = installment.status == InstallmentStatus::Escalated;
                tx.update_installment(&installment).await?;
            }
        }

        tx.commit().await?;

        warn!(
            payment_ref = %attempt.gateway_payment_ref,
            loan_id = %attempt.loan_id,
            reason = %reason,
            escalated,
            "Payment failed"
        );

        if let Some(loan) = loan {
            self.notifier
                .notify(
                    &loan.applicant.email,
                    NotificationKind::PaymentFailed,
                    serde_json::json!({
                        "loan_reference": loan.reference,
                        "amount": attempt.amount.to_string(),
                        "reason": reason,
                        "retries_exhausted": escalated,
                    }),
                )
                .await;
        }

        Ok(())
    }
}
