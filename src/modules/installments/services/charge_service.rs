use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::{AppError, Clock, Currency, Result};
use crate::modules::gateways::services::{PaymentGateway, RecurringChargeRequest};
use crate::modules::installments::models::{Installment, InstallmentStatus};
use crate::modules::mandates::models::MandateStatus;
use crate::modules::payments::models::PaymentAttempt;
use crate::store::{LoanStore, StoreTx};

/// What happened to one installment charge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// Gateway accepted the debit; the result arrives by webhook
    Initiated {
        installment_id: String,
        payment_ref: String,
    },
    /// Gateway refused or timed out
    Failed {
        installment_id: String,
        reason: String,
        escalated: bool,
    },
    /// Not chargeable right now (already claimed, settled, or mandate inactive)
    Skipped {
        installment_id: String,
        reason: String,
    },
}

/// Initiates mandate debits for single installments.
///
/// The installment is claimed (PENDING|FAILED -> PROCESSING) and committed
/// before the gateway is called, so two callers can never debit the same
/// installment twice.
pub struct ChargeService {
    store: Arc<dyn LoanStore>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    gateway_timeout: Duration,
}

struct ClaimedCharge {
    previous_status: InstallmentStatus,
    request: RecurringChargeRequest,
    mandate_id: String,
}

impl ChargeService {
    pub fn new(
        store: Arc<dyn LoanStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        max_retries: u32,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            max_retries,
            gateway_timeout,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Charge one installment on request of the borrower.
    ///
    /// Same path as the scheduler, but an installment that cannot be charged
    /// is an error instead of a skip.
    pub async fn charge_installment(&self, installment_id: &str) -> Result<ChargeOutcome> {
        match self.charge_due(installment_id).await? {
            ChargeOutcome::Skipped { reason, .. } => Err(AppError::conflict(format!(
                "installment {} cannot be charged: {}",
                installment_id, reason
            ))),
            outcome => Ok(outcome),
        }
    }

    /// Debit one installment through its mandate
    ///
    /// # Returns
    /// * `Initiated` - charge created, installment PROCESSING with the payment linked
    /// * `Failed` - installment restored (or escalated) with the retry count bumped
    /// * `Skipped` - nothing was sent to the gateway
    pub async fn charge_due(&self, installment_id: &str) -> Result<ChargeOutcome> {
        let claimed = match self.claim(installment_id).await? {
            Ok(claimed) => claimed,
            Err(reason) => {
                info!(installment_id, reason = %reason, "Installment charge skipped");
                return Ok(ChargeOutcome::Skipped {
                    installment_id: installment_id.to_string(),
                    reason,
                });
            }
        };

        let response = tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.create_recurring_charge(claimed.request.clone()),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::gateway(format!(
                "charge request timed out after {}s",
                self.gateway_timeout.as_secs()
            )))
        });

        match response {
            Ok(charge) => {
                self.record_initiated(installment_id, &claimed, charge.payment_ref.clone())
                    .await?;
                info!(
                    installment_id,
                    payment_ref = %charge.payment_ref,
                    amount = %claimed.request.amount,
                    "Installment charge initiated"
                );
                Ok(ChargeOutcome::Initiated {
                    installment_id: installment_id.to_string(),
                    payment_ref: charge.payment_ref,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                let escalated = self
                    .record_failure(
                        installment_id,
                        &claimed.request.loan_id,
                        claimed.previous_status,
                        reason.clone(),
                    )
                    .await?;
                warn!(
                    installment_id,
                    error = %reason,
                    escalated,
                    "Installment charge failed"
                );
                Ok(ChargeOutcome::Failed {
                    installment_id: installment_id.to_string(),
                    reason,
                    escalated,
                })
            }
        }
    }

    /// Claim the installment in its own transaction. The inner `Err` carries
    /// the reason the installment was skipped.
    async fn claim(&self, installment_id: &str) -> Result<std::result::Result<ClaimedCharge, String>> {
        let mut tx = self.store.begin().await?;

        let not_found = || AppError::not_found(format!("installment {}", installment_id));
        let loan_id = tx
            .find_installment_loan_id(installment_id)
            .await?
            .ok_or_else(not_found)?;
        let loan = tx
            .lock_loan(&loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("loan {}", loan_id)))?;
        let mandate = tx.lock_mandate_for_loan(&loan_id).await?;
        let installment = tx
            .lock_installment(installment_id)
            .await?
            .ok_or_else(not_found)?;

        if !installment.is_chargeable(self.max_retries) {
            return Ok(Err(format!(
                "installment is {} after {} attempts",
                installment.status, installment.retry_count
            )));
        }

        let mandate = match mandate {
            Some(m) if m.id == installment.mandate_id && m.status == MandateStatus::Active => m,
            Some(m) => return Ok(Err(format!("mandate is {}", m.status))),
            None => return Ok(Err("mandate not found".to_string())),
        };
        let Some(token_ref) = mandate.gateway_token_ref.clone() else {
            return Ok(Err("mandate has no debit token".to_string()));
        };

        if !tx.claim_installment(installment_id, self.max_retries).await? {
            return Ok(Err("installment already claimed".to_string()));
        }
        tx.commit().await?;

        Ok(Ok(ClaimedCharge {
            previous_status: installment.status,
            mandate_id: mandate.id,
            request: RecurringChargeRequest {
                token_ref,
                customer_ref: mandate.gateway_customer_ref,
                email: loan.applicant.email,
                phone: loan.applicant.phone,
                amount: installment.amount,
                currency: Currency::INR,
                description: format!(
                    "EMI {} for loan {}",
                    installment.sequence_number, loan.reference
                ),
                loan_id: loan.id,
                installment_id: installment.id,
                sequence_number: installment.sequence_number,
            },
        }))
    }

    async fn record_initiated(
        &self,
        installment_id: &str,
        claimed: &ClaimedCharge,
        payment_ref: String,
    ) -> Result<()> {
        let now = self.clock.now();
        let attempt = PaymentAttempt::created(
            payment_ref.clone(),
            claimed.request.loan_id.clone(),
            claimed.mandate_id.clone(),
            Some(installment_id.to_string()),
            claimed.request.amount,
            now,
        );

        let result: Result<()> = async {
            let mut tx = self.store.begin().await?;
            tx.lock_loan(&claimed.request.loan_id).await?;
            tx.insert_attempt(&attempt).await?;
            let mut installment = self.locked(tx.as_mut(), installment_id).await?;
            installment.link_payment(payment_ref.clone(), now);
            tx.update_installment(&installment).await?;
            tx.commit().await
        }
        .await;

        if let Err(e) = &result {
            // Installment stays PROCESSING, so it will not be charged again
            error!(
                installment_id,
                payment_ref = %payment_ref,
                error = %e,
                "Charge initiated but could not be recorded"
            );
        }
        result
    }

    async fn record_failure(
        &self,
        installment_id: &str,
        loan_id: &str,
        previous: InstallmentStatus,
        reason: String,
    ) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        tx.lock_loan(loan_id).await?;
        let mut installment = self.locked(tx.as_mut(), installment_id).await?;
        installment.record_initiation_failure(previous, reason, self.max_retries, self.clock.now());
        tx.update_installment(&installment).await?;
        tx.commit().await?;

        Ok(installment.status == InstallmentStatus::Escalated)
    }

    async fn locked(
        &self,
        tx: &mut dyn StoreTx,
        installment_id: &str,
    ) -> Result<Installment> {
        tx.lock_installment(installment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("installment {}", installment_id)))
    }
}
