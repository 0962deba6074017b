use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::{AppError, Result};

/// How interest accrues over the tenure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterestType {
    /// Interest computed once on the original principal
    Flat,
    /// Interest computed each period on the remaining principal
    Reducing,
}

impl InterestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestType::Flat => "FLAT",
            InterestType::Reducing => "REDUCING",
        }
    }
}

impl fmt::Display for InterestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterestType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "FLAT" => Ok(InterestType::Flat),
            "REDUCING" => Ok(InterestType::Reducing),
            _ => Err(format!("Invalid interest type: {}", s)),
        }
    }
}

/// Who bears the interest cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterestPayer {
    Student,
    /// Financing partner absorbs all interest; the borrower repays principal only
    Partner,
}

impl InterestPayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestPayer::Student => "STUDENT",
            InterestPayer::Partner => "PARTNER",
        }
    }
}

impl fmt::Display for InterestPayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterestPayer {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "STUDENT" => Ok(InterestPayer::Student),
            "PARTNER" => Ok(InterestPayer::Partner),
            _ => Err(format!("Invalid interest payer: {}", s)),
        }
    }
}

/// Agreed financing terms. Immutable once the loan is disbursed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Decimal,
    /// Annual rate in percent (12 means 12% p.a.)
    pub annual_rate: Decimal,
    pub tenure_months: u32,
    pub interest_type: InterestType,
    pub interest_payer: InterestPayer,
}

impl LoanTerms {
    pub fn new(
        principal: Decimal,
        annual_rate: Decimal,
        tenure_months: u32,
        interest_type: InterestType,
        interest_payer: InterestPayer,
    ) -> Result<Self> {
        let terms = Self {
            principal,
            annual_rate,
            tenure_months,
            interest_type,
            interest_payer,
        };
        terms.validate()?;
        Ok(terms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.principal <= Decimal::ZERO {
            return Err(AppError::invalid_terms(format!(
                "principal must be positive, got {}",
                self.principal
            )));
        }
        if self.tenure_months == 0 {
            return Err(AppError::invalid_terms("tenure must be at least one month"));
        }
        if self.annual_rate < Decimal::ZERO {
            return Err(AppError::invalid_terms(format!(
                "annual rate cannot be negative, got {}",
                self.annual_rate
            )));
        }
        Ok(())
    }

    /// annual_rate / (12 × 100)
    pub fn monthly_rate(&self) -> Decimal {
        self.annual_rate / Decimal::from(1200)
    }

    pub fn borrower_pays_interest(&self) -> bool {
        self.interest_payer == InterestPayer::Student
    }
}

/// Lifecycle status of a loan as seen by servicing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// Approved, no recurring mandate yet
    Approved,
    MandatePending,
    MandateActive,
    Disbursed,
    Closed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Approved => "APPROVED",
            LoanStatus::MandatePending => "MANDATE_PENDING",
            LoanStatus::MandateActive => "MANDATE_ACTIVE",
            LoanStatus::Disbursed => "DISBURSED",
            LoanStatus::Closed => "CLOSED",
        }
    }

    /// Mandate changes may still move the loan between pre-disbursement states
    pub fn is_pre_disbursement(&self) -> bool {
        matches!(
            self,
            LoanStatus::Approved | LoanStatus::MandatePending | LoanStatus::MandateActive
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(LoanStatus::Approved),
            "MANDATE_PENDING" => Ok(LoanStatus::MandatePending),
            "MANDATE_ACTIVE" => Ok(LoanStatus::MandateActive),
            "DISBURSED" => Ok(LoanStatus::Disbursed),
            "CLOSED" => Ok(LoanStatus::Closed),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Loan account as serviced by the repayment engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    /// Human-facing loan reference
    pub reference: String,
    pub applicant: Applicant,
    pub terms: LoanTerms,
    pub emi_amount: Decimal,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Build an approved loan; the EMI is fixed here from the terms
    pub fn approved(reference: String, applicant: Applicant, terms: LoanTerms) -> Result<Self> {
        let emi_amount = crate::modules::loans::services::EmiCalculator::for_terms(&terms)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            reference,
            applicant,
            terms,
            emi_amount,
            status: LoanStatus::Approved,
            created_at: now,
            updated_at: now,
        })
    }
}
