use chrono::{Months, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::info;

use crate::core::{AppError, Result};
use crate::modules::installments::models::Installment;
use crate::modules::mandates::models::Mandate;
use crate::store::StoreTx;

/// Builds the installment schedule for an active mandate
pub struct ScheduleGenerator;

impl ScheduleGenerator {
    /// Split `total_outstanding` into EMIs due monthly after `valid_from`.
    ///
    /// Every installment is `emi` except the last, which carries the
    /// remainder so the schedule sums to exactly `total_outstanding`.
    ///
    /// # Arguments
    /// * `mandate_id` - Mandate the schedule will be charged against
    /// * `loan_id` - Loan being repaid
    /// * `total_outstanding` - Amount to schedule
    /// * `emi` - Regular installment amount
    /// * `valid_from` - Mandate start; the first EMI falls one month later
    pub fn build(
        mandate_id: &str,
        loan_id: &str,
        total_outstanding: Decimal,
        emi: Decimal,
        valid_from: NaiveDate,
    ) -> Result<Vec<Installment>> {
        if emi <= Decimal::ZERO {
            return Err(AppError::invalid_terms(format!(
                "EMI must be positive, got {}",
                emi
            )));
        }
        if total_outstanding <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let count = (total_outstanding / emi)
            .ceil()
            .to_u32()
            .ok_or_else(|| AppError::invalid_terms("installment count out of range"))?;

        let mut installments = Vec::with_capacity(count as usize);
        let mut scheduled = Decimal::ZERO;

        for sequence in 1..=count {
            let amount = if sequence == count {
                total_outstanding - scheduled
            } else {
                emi
            };
            scheduled += amount;

            let due_date = valid_from
                .checked_add_months(Months::new(sequence))
                .ok_or_else(|| AppError::invalid_terms("due date out of range"))?;

            installments.push(Installment::new(
                mandate_id.to_string(),
                loan_id.to_string(),
                sequence,
                amount,
                due_date,
            ));
        }

        Ok(installments)
    }

    /// Persist a fresh schedule for `mandate`
    ///
    /// # Errors
    /// * `ScheduleAlreadyExists` - the mandate already has installments
    pub async fn generate(
        tx: &mut dyn StoreTx,
        mandate: &Mandate,
        total_outstanding: Decimal,
        emi: Decimal,
    ) -> Result<Vec<Installment>> {
        if tx.count_installments(&mandate.id).await? > 0 {
            return Err(AppError::ScheduleAlreadyExists {
                mandate_id: mandate.id.clone(),
            });
        }

        let installments = Self::build(
            &mandate.id,
            &mandate.loan_id,
            total_outstanding,
            emi,
            mandate.valid_from,
        )?;
        tx.insert_installments(&installments).await?;

        info!(
            mandate_id = %mandate.id,
            loan_id = %mandate.loan_id,
            count = installments.len(),
            total = %total_outstanding,
            emi = %emi,
            "Installment schedule generated"
        );

        Ok(installments)
    }
}
