use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};

/// An amount of money in integer cents.
///
/// Totals, shares, positions and transfers all use it, so sums over a ledger
/// are exact. Only the HTTP layer turns it into a two-decimal number.
///
/// A position's sign reads from the member's point of view: positive is
/// money to collect, negative is money owed.
///
/// ```rust
/// use engine::MoneyCents;
///
/// let share = MoneyCents::new(3_34);
/// assert_eq!(share.to_string(), "3.34");
/// assert_eq!((-share).to_string(), "-3.34");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Largest expense total the engine stores: 2^53 cents, the last integer
    /// an `f64` holds exactly. Any sum of such totals over a ledger snapshot
    /// is checked against `i64` overflow when the snapshot is built.
    pub const MAX_TOTAL: MoneyCents = MoneyCents(1 << 53);

    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> MoneyCents {
        MoneyCents(self.0.abs())
    }

    /// Returns `None` on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Returns `None` on overflow.
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// Returns `None` for `i64::MIN` cents.
    #[must_use]
    pub fn checked_neg(self) -> Option<MoneyCents> {
        self.0.checked_neg().map(MoneyCents)
    }

    /// Sums `amounts`, returning `None` as soon as the running total
    /// overflows.
    pub fn checked_sum<I>(amounts: I) -> Option<MoneyCents>
    where
        I: IntoIterator<Item = MoneyCents>,
    {
        amounts
            .into_iter()
            .try_fold(MoneyCents::ZERO, MoneyCents::checked_add)
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for MoneyCents {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> MoneyCents {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        *self = *self + rhs;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> MoneyCents {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        *self = *self - rhs;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> MoneyCents {
        MoneyCents(-self.0)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a MoneyCents> for MoneyCents {
    fn sum<I: Iterator<Item = &'a MoneyCents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_two_decimals() {
        assert_eq!(MoneyCents::ZERO.to_string(), "0.00");
        assert_eq!(MoneyCents::new(5).to_string(), "0.05");
        assert_eq!(MoneyCents::new(-5).to_string(), "-0.05");
        assert_eq!(MoneyCents::new(2000).to_string(), "20.00");
        assert_eq!(MoneyCents::new(-1750).to_string(), "-17.50");
    }

    #[test]
    fn arithmetic_and_sign() {
        let mut net = MoneyCents::new(750);
        net -= MoneyCents::new(1000);
        assert_eq!(net, MoneyCents::new(-250));
        assert!(net.is_negative());
        assert_eq!(net.abs(), MoneyCents::new(250));
        net += MoneyCents::new(250);
        assert!(net.is_zero() && !net.is_positive());
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let max = MoneyCents::new(i64::MAX);
        assert_eq!(max.checked_add(MoneyCents::new(1)), None);
        assert_eq!(MoneyCents::new(i64::MIN).checked_sub(MoneyCents::new(1)), None);
        assert_eq!(MoneyCents::new(i64::MIN).checked_neg(), None);
        assert_eq!(
            MoneyCents::new(-250).checked_neg(),
            Some(MoneyCents::new(250))
        );
        assert_eq!(MoneyCents::checked_sum([max, max]), None);
        assert_eq!(
            MoneyCents::checked_sum([MoneyCents::MAX_TOTAL, MoneyCents::MAX_TOTAL]),
            Some(MoneyCents::new(1 << 54))
        );
        assert_eq!(MoneyCents::checked_sum([]), Some(MoneyCents::ZERO));
    }

    #[test]
    fn shares_sum_to_total() {
        let shares = [MoneyCents::new(334), MoneyCents::new(333), MoneyCents::new(333)];
        assert_eq!(shares.iter().sum::<MoneyCents>(), MoneyCents::new(1000));
        assert_eq!(
            shares.into_iter().map(Neg::neg).sum::<MoneyCents>(),
            MoneyCents::new(-1000)
        );
    }
}
