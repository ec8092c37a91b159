//! Integer rupiah amounts.
//!
//! Midtrans and Komerce both exchange IDR as whole rupiah, so amounts are kept
//! as integers in the smallest unit the gateways accept. Arithmetic saturates
//! instead of wrapping; a cart never legitimately approaches `u64::MAX`.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// An amount of Indonesian rupiah.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rupiah(u64);

impl Rupiah {
    /// Zero rupiah.
    pub const ZERO: Self = Self(0);

    /// Create an amount.
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Get the raw amount.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub fn times(self, qty: u32) -> Self {
        Self(self.0.saturating_mul(u64::from(qty)))
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for Rupiah {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Rupiah {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<u64> for Rupiah {
    fn from(amount: u64) -> Self {
        Self(amount)
    }
}

/// Formats as `Rp 1.250.000` (Indonesian thousands separator).
impl fmt::Display for Rupiah {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        write!(f, "Rp {grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_grouping() {
        assert_eq!(Rupiah::ZERO.to_string(), "Rp 0");
        assert_eq!(Rupiah::new(950).to_string(), "Rp 950");
        assert_eq!(Rupiah::new(20_000).to_string(), "Rp 20.000");
        assert_eq!(Rupiah::new(1_250_000).to_string(), "Rp 1.250.000");
    }

    #[test]
    fn test_times_and_sum() {
        let total: Rupiah = [Rupiah::new(150_000).times(2), Rupiah::new(20_000)]
            .into_iter()
            .sum();
        assert_eq!(total, Rupiah::new(320_000));
    }

    #[test]
    fn test_saturates() {
        assert_eq!(Rupiah::new(u64::MAX) + Rupiah::new(1), Rupiah::new(u64::MAX));
        assert_eq!(Rupiah::new(u64::MAX).times(2), Rupiah::new(u64::MAX));
    }
}
