//! Human-readable invoice numbers: `INV-<YYYYMM>-<6 uppercase hex>`.
//!
//! The random generator gives probabilistic uniqueness only (24 bits per
//! month). Storage rejects duplicates and the caller draws a new number.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, NaiveDate};
use rand::Rng;

pub const INVOICE_NUMBER_PREFIX: &str = "INV";

/// Source of invoice numbers.
pub trait InvoiceNumberGenerator: Send + Sync {
    /// Produce a number for an invoice created on `today`.
    fn next_number(&self, today: NaiveDate) -> String;
}

fn format_number(prefix: &str, today: NaiveDate, suffix: u32) -> String {
    format!(
        "{prefix}-{:04}{:02}-{:06X}",
        today.year(),
        today.month(),
        suffix & 0x00FF_FFFF
    )
}

/// Random 24-bit suffix from the thread-local RNG.
#[derive(Debug, Clone)]
pub struct RandomInvoiceNumbers {
    prefix: String,
}

impl RandomInvoiceNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for RandomInvoiceNumbers {
    fn default() -> Self {
        Self::new(INVOICE_NUMBER_PREFIX)
    }
}

impl InvoiceNumberGenerator for RandomInvoiceNumbers {
    fn next_number(&self, today: NaiveDate) -> String {
        let suffix: u32 = rand::thread_rng().gen_range(0..=0x00FF_FFFF);
        format_number(&self.prefix, today, suffix)
    }
}

/// Deterministic counter, for tests and fixtures.
#[derive(Debug, Default)]
pub struct SequentialInvoiceNumbers {
    next: AtomicU64,
}

impl SequentialInvoiceNumbers {
    pub fn starting_at(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
        }
    }
}

impl InvoiceNumberGenerator for SequentialInvoiceNumbers {
    fn next_number(&self, today: NaiveDate) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format_number(INVOICE_NUMBER_PREFIX, today, n as u32)
    }
}

/// Whether `number` has the `PREFIX-YYYYMM-XXXXXX` shape.
pub fn is_well_formed(number: &str) -> bool {
    let mut parts = number.split('-');
    let (Some(prefix), Some(period), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    !prefix.is_empty()
        && period.len() == 6
        && period.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == 6
        && suffix.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    #[test]
    fn random_numbers_have_the_expected_shape() {
        let generator = RandomInvoiceNumbers::default();
        for _ in 0..100 {
            let number = generator.next_number(day());
            assert!(number.starts_with("INV-202603-"), "{number}");
            assert!(is_well_formed(&number), "{number}");
        }
    }

    #[test]
    fn sequential_numbers_are_zero_padded_hex() {
        let generator = SequentialInvoiceNumbers::starting_at(0xAB);
        assert_eq!(generator.next_number(day()), "INV-202603-0000AB");
        assert_eq!(generator.next_number(day()), "INV-202603-0000AC");
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(!is_well_formed("INV-2026-00000A"));
        assert!(!is_well_formed("INV-202603-00000a"));
        assert!(!is_well_formed("INV-202603-00000A-1"));
        assert!(!is_well_formed("-202603-00000A"));
    }
}
