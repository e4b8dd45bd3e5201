use std::{
    fmt,
    iter::Sum,
    num::ParseIntError,
    ops::{Add, AddAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// An amount of the chain's native coin in its smallest unit.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(u128);

impl Currency {
    pub const ZERO: Currency = Currency(0);

    pub const fn new(amount: u128) -> Self {
        Self(amount)
    }

    pub const fn amount(&self) -> u128 {
        self.0
    }

    pub fn checked_add(self, other: Currency) -> Option<Currency> {
        self.0.checked_add(other.0).map(Currency)
    }

    pub fn checked_sub(self, other: Currency) -> Option<Currency> {
        self.0.checked_sub(other.0).map(Currency)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for Currency {
    type Output = Currency;

    fn add(self, other: Currency) -> Currency {
        Currency(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Currency {
    fn add_assign(&mut self, other: Currency) {
        *self = *self + other;
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Currency>>(iter: I) -> Self {
        iter.fold(Currency::ZERO, Add::add)
    }
}

impl From<u64> for Currency {
    fn from(amount: u64) -> Self {
        Self(amount as u128)
    }
}

impl From<u128> for Currency {
    fn from(amount: u128) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.0)
    }
}

impl FromStr for Currency {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u128>().map(Currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_sub_underflow() {
        let a = Currency::new(5);
        assert_eq!(a.checked_sub(Currency::new(3)), Some(Currency::new(2)));
        assert_eq!(a.checked_sub(Currency::new(6)), None);
    }

    #[test]
    fn test_sum_and_parse() {
        let total: Currency = [50u64, 70, 5].into_iter().map(Currency::from).sum();
        assert_eq!(total, Currency::new(125));
        assert_eq!("125".parse::<Currency>().unwrap(), total);
        assert!("-1".parse::<Currency>().is_err());
    }
}
