//! Ticket numbers: `TKT-<8 uppercase hex>`.

use rand::Rng;

pub trait TicketNumberGenerator: Send + Sync {
    fn next_number(&self) -> String;
}

/// 32 random bits from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTicketNumbers;

impl TicketNumberGenerator for RandomTicketNumbers {
    fn next_number(&self) -> String {
        let suffix: u32 = rand::thread_rng().r#gen();
        format!("TKT-{suffix:08X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_have_eight_uppercase_hex_digits() {
        for _ in 0..50 {
            let number = RandomTicketNumbers.next_number();
            let suffix = number.strip_prefix("TKT-").unwrap();
            assert_eq!(suffix.len(), 8);
            assert!(suffix.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }
}
