use rust_decimal::{Decimal, MathematicalOps};
use tracing::debug;

use crate::core::{AppError, Currency, Result};
use crate::modules::loans::models::{InterestPayer, InterestType, LoanTerms};

/// Equated monthly installment arithmetic.
///
/// EMIs are rounded *up* to the paisa so that `tenure` installments always
/// cover the amount owed; the schedule's final installment absorbs the excess.
pub struct EmiCalculator;

impl EmiCalculator {
    /// Compute the EMI for a set of terms
    ///
    /// # Arguments
    /// * `principal` - Amount disbursed, must be positive
    /// * `annual_rate` - Annual rate in percent, must not be negative
    /// * `tenure_months` - Number of monthly installments, at least 1
    /// * `interest_type` - FLAT or REDUCING
    /// * `interest_payer` - PARTNER removes interest from the borrower's EMI
    ///
    /// # Returns
    /// EMI in INR, rounded up to two decimals
    pub fn compute_emi(
        principal: Decimal,
        annual_rate: Decimal,
        tenure_months: u32,
        interest_type: InterestType,
        interest_payer: InterestPayer,
    ) -> Result<Decimal> {
        let terms = LoanTerms::new(
            principal,
            annual_rate,
            tenure_months,
            interest_type,
            interest_payer,
        )?;
        Self::for_terms(&terms)
    }

    pub fn for_terms(terms: &LoanTerms) -> Result<Decimal> {
        terms.validate()?;

        let tenure = Decimal::from(terms.tenure_months);
        let raw = match (terms.interest_payer, terms.interest_type) {
            (InterestPayer::Partner, _) => terms.principal / tenure,
            (InterestPayer::Student, InterestType::Flat) => {
                let interest = Self::flat_interest(terms)?;
                (terms.principal + interest) / tenure
            }
            (InterestPayer::Student, InterestType::Reducing) => Self::amortized(terms)?,
        };

        let emi = Currency::INR.round_up(raw);
        debug!(
            principal = %terms.principal,
            rate = %terms.annual_rate,
            tenure = terms.tenure_months,
            interest_type = %terms.interest_type,
            emi = %emi,
            "Computed EMI"
        );
        Ok(emi)
    }

    /// Interest the borrower owes over the whole tenure, as booked into the
    /// opening ledger.
    ///
    /// FLAT books the simple-interest total; REDUCING books whatever the
    /// rounded EMIs collect beyond the principal.
    pub fn total_interest(terms: &LoanTerms, emi: Decimal) -> Result<Decimal> {
        match (terms.interest_payer, terms.interest_type) {
            (InterestPayer::Partner, _) => Ok(Decimal::ZERO),
            (InterestPayer::Student, InterestType::Flat) => {
                Ok(Currency::INR.round(Self::flat_interest(terms)?))
            }
            (InterestPayer::Student, InterestType::Reducing) => {
                let collected = emi * Decimal::from(terms.tenure_months);
                Ok((collected - terms.principal).max(Decimal::ZERO))
            }
        }
    }

    fn flat_interest(terms: &LoanTerms) -> Result<Decimal> {
        terms
            .principal
            .checked_mul(terms.annual_rate)
            .and_then(|v| v.checked_mul(Decimal::from(terms.tenure_months)))
            .and_then(|v| v.checked_div(Decimal::from(1200)))
            .ok_or_else(|| AppError::invalid_terms("interest computation overflowed"))
    }

    /// P·r·(1+r)^n / ((1+r)^n − 1), degrading to P/n at a zero rate
    fn amortized(terms: &LoanTerms) -> Result<Decimal> {
        let rate = terms.monthly_rate();
        let tenure = Decimal::from(terms.tenure_months);

        if rate.is_zero() {
            return Ok(terms.principal / tenure);
        }

        let overflow = || AppError::invalid_terms("EMI computation overflowed");
        let factor = (Decimal::ONE + rate)
            .checked_powu(u64::from(terms.tenure_months))
            .ok_or_else(overflow)?;
        let denominator = factor - Decimal::ONE;
        if denominator.is_zero() {
            return Ok(terms.principal / tenure);
        }

        terms
            .principal
            .checked_mul(rate)
            .and_then(|v| v.checked_mul(factor))
            .and_then(|v| v.checked_div(denominator))
            .ok_or_else(overflow)
    }
}
