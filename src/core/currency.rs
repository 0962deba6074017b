use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported currencies with their decimal precision rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Indian Rupee (2 decimal places, minor unit = paisa)
    INR,
}

impl Currency {
    /// Returns the decimal scale for this currency
    pub fn scale(&self) -> u32 {
        match self {
            Currency::INR => 2,
        }
    }

    /// Rounds a decimal value to the appropriate scale for this currency
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.scale(), RoundingStrategy::MidpointAwayFromZero)
    }

    /// Rounds up to the next minor unit
    pub fn round_up(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.scale(), RoundingStrategy::AwayFromZero)
    }

    /// Returns the smallest unit for this currency
    pub fn smallest_unit(&self) -> Decimal {
        Decimal::new(1, self.scale())
    }

    /// Converts a major-unit amount into integer minor units for the gateway
    pub fn to_minor_units(&self, amount: Decimal) -> Option<i64> {
        let scaled = self.round(amount) * Decimal::from(10i64.pow(self.scale()));
        i64::try_from(scaled.trunc()).ok()
    }

    /// Converts integer minor units reported by the gateway into a decimal amount
    pub fn from_minor_units(&self, minor: i64) -> Decimal {
        Decimal::new(minor, self.scale())
    }

    /// Formats an amount for display with the correct decimal places
    pub fn format_amount(&self, amount: Decimal) -> String {
        format!("{} {:.width$}", self, amount, width = self.scale() as usize)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::INR => write!(f, "INR"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INR" => Ok(Currency::INR),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}
