//! Input validation
//!
//! Pure, synchronous checks run before any ledger interaction. Mutating
//! operations validate every input up front; a request that fails here
//! never produces a ledger call.

use crate::types::Address;
use crate::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Longest accepted expiry window (100 years)
pub const MAX_EXPIRY_DAYS: u32 = 36_500;

/// True if `reference` is a well-formed ledger address
pub fn validate_identity(reference: &str) -> bool {
    Address::parse(reference).is_ok()
}

/// True if `amount` is a positive integer representable on the ledger
pub fn validate_amount(amount: Decimal) -> bool {
    amount > Decimal::ZERO && amount.fract().is_zero() && amount.to_u64().is_some()
}

/// True if `days` is a positive whole number of days within range
pub fn validate_expiry(days: Decimal) -> bool {
    days > Decimal::ZERO
        && days.fract().is_zero()
        && days
            .to_u32()
            .map(|d| d <= MAX_EXPIRY_DAYS)
            .unwrap_or(false)
}

/// Parse an identity or fail with a field-scoped validation error
pub fn parse_identity(field: &str, reference: &str) -> Result<Address> {
    Address::parse(reference).map_err(|e| Error::Validation(format!("{field}: {e}")))
}

/// Parse an amount or fail with a validation error
pub fn parse_amount(amount: Decimal) -> Result<u64> {
    if !validate_amount(amount) {
        return Err(Error::Validation(format!(
            "amount must be a positive integer, got {amount}"
        )));
    }
    amount
        .to_u64()
        .ok_or_else(|| Error::Validation(format!("amount {amount} out of range")))
}

/// Parse an expiry window or fail with a validation error
pub fn parse_expiry(days: Decimal) -> Result<u32> {
    if !validate_expiry(days) {
        return Err(Error::Validation(format!(
            "expiryDays must be a whole number between 1 and {MAX_EXPIRY_DAYS}, got {days}"
        )));
    }
    days.to_u32()
        .ok_or_else(|| Error::Validation(format!("expiryDays {days} out of range")))
}

/// Collects every validation failure of a request before reporting
#[derive(Debug, Default)]
pub struct ValidationReport {
    problems: Vec<String>,
}

impl ValidationReport {
    /// Empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one check, keeping the value on success
    pub fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(Error::Validation(msg)) => {
                self.problems.push(msg);
                None
            }
            Err(other) => {
                self.problems.push(other.to_string());
                None
            }
        }
    }

    /// Fail with all recorded problems, if any
    pub fn finish(self) -> Result<()> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.problems.join("; ")))
        }
    }
}
