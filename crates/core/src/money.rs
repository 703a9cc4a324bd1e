//! Fixed-point money helpers.
//!
//! All currency values are `rust_decimal::Decimal`. Binary floating point is
//! never used for money.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Currency amount (fixed-point decimal).
pub type Money = Decimal;

/// Fractional digits persisted for money columns.
pub const MONEY_SCALE: u32 = 2;

/// Default ISO currency code for new invoices and payments.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Round to the persisted money scale, half away from zero.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject negative values for fields such as tax or discount.
pub fn ensure_non_negative(field: &str, amount: Money) -> DomainResult<()> {
    if amount < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} must not be negative")));
    }
    Ok(())
}

/// Reject zero or negative values for fields such as payment amounts.
pub fn ensure_positive(field: &str, amount: Money) -> DomainResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} must be positive")));
    }
    Ok(())
}

/// Validate a three-letter uppercase currency code.
pub fn ensure_currency(code: &str) -> DomainResult<()> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(DomainError::validation(format!("invalid currency code '{code}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
    }

    #[test]
    fn repeated_cent_additions_do_not_drift() {
        let mut total = Decimal::ZERO;
        for _ in 0..1000 {
            total += dec!(0.01);
        }
        assert_eq!(total, dec!(10.00));
    }

    #[test]
    fn sign_checks() {
        assert!(ensure_non_negative("tax_amount", Decimal::ZERO).is_ok());
        assert!(ensure_non_negative("tax_amount", dec!(-0.01)).is_err());
        assert!(ensure_positive("amount", Decimal::ZERO).is_err());
        assert!(ensure_positive("amount", dec!(0.01)).is_ok());
    }

    #[test]
    fn currency_codes() {
        assert!(ensure_currency("EUR").is_ok());
        assert!(ensure_currency("eur").is_err());
        assert!(ensure_currency("EURO").is_err());
    }
}
