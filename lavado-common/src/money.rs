//! Exact money arithmetic
//!
//! Tiered batch pricing is a contractual, regulator-facing figure, so all
//! internal accumulation happens in integer cents. Floating point appears
//! only at the wire boundary (the balance endpoint reports dollars) and in
//! display formatting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// A USD amount in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    /// Convert a wire-format dollar amount to cents, rounding to the
    /// nearest cent (the balance endpoint reports `f64` dollars).
    pub fn from_dollars(dollars: f64) -> Self {
        Cents((dollars * 100.0).round() as i64)
    }

    /// Dollar value for display and wire serialization.
    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `self - other`, floored at zero. Used for shortfall reporting.
    pub fn saturating_deficit(self, other: Cents) -> Cents {
        Cents((self.0 - other.0).max(0))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for Cents {
    type Output = Cents;
    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl Sub for Cents {
    type Output = Cents;
    fn sub(self, rhs: Cents) -> Cents {
        Cents(self.0 - rhs.0)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents::ZERO, Add::add)
    }
}

impl fmt::Display for Cents {
    /// Formats as `$1234.50`. Negative amounts render as `-$12.00`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_dollars_rounds_to_nearest_cent() {
        assert_eq!(Cents::from_dollars(100.0), Cents(10_000));
        assert_eq!(Cents::from_dollars(100.01), Cents(10_001));
        assert_eq!(Cents::from_dollars(0.005), Cents(1));
        assert_eq!(Cents::from_dollars(0.0), Cents::ZERO);
    }

    #[test]
    fn saturating_deficit_floors_at_zero() {
        assert_eq!(Cents(10_001).saturating_deficit(Cents(10_000)), Cents(1));
        assert_eq!(Cents(10_000).saturating_deficit(Cents(10_001)), Cents::ZERO);
        assert_eq!(Cents(500).saturating_deficit(Cents(500)), Cents::ZERO);
    }

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(Cents(460_000).to_string(), "$4600.00");
        assert_eq!(Cents(400_050).to_string(), "$4000.50");
        assert_eq!(Cents(1).to_string(), "$0.01");
        assert_eq!(Cents(0).to_string(), "$0.00");
        assert_eq!(Cents(-1200).to_string(), "-$12.00");
    }

    #[test]
    fn sum_accumulates_exactly() {
        let total: Cents = [Cents(33), Cents(33), Cents(34)].into_iter().sum();
        assert_eq!(total, Cents(100));
    }
}
