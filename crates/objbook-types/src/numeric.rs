use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Exact rational number stored as `num/denom`.
///
/// The denominator is always positive. Equality is structural: `1/2` and
/// `2/4` are different values, which keeps textual round-trips exact. Use
/// [`Numeric::reduce`] when a canonical fraction is needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Numeric {
    num: i64,
    denom: i64,
}

impl Numeric {
    pub fn new(num: i64, denom: i64) -> Result<Self, TypeError> {
        if denom <= 0 {
            return Err(TypeError::InvalidDenominator(denom));
        }
        Ok(Self { num, denom })
    }

    pub const fn zero() -> Self {
        Self { num: 0, denom: 1 }
    }

    pub const fn from_int(num: i64) -> Self {
        Self { num, denom: 1 }
    }

    pub fn num(&self) -> i64 {
        self.num
    }

    pub fn denom(&self) -> i64 {
        self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Lowest-terms form of the same value.
    pub fn reduce(&self) -> Self {
        let g = gcd(self.num.unsigned_abs(), self.denom.unsigned_abs());
        if g <= 1 {
            return *self;
        }
        // g divides both, and denom > 0, so the quotients fit.
        let g = g as i64;
        Self {
            num: self.num / g,
            denom: self.denom / g,
        }
    }

    /// Returns `true` if both values denote the same rational number.
    pub fn same_value(&self, other: &Self) -> bool {
        self.reduce() == other.reduce()
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Parse `"num/denom"` or a bare integer.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        match s.split_once('/') {
            Some((num, denom)) => {
                let num = num.trim().parse().map_err(|_| TypeError::text("numeric", s))?;
                let denom = denom.trim().parse().map_err(|_| TypeError::text("numeric", s))?;
                Self::new(num, denom)
            }
            None => s
                .parse()
                .map(Self::from_int)
                .map_err(|_| TypeError::text("numeric", s)),
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Default for Numeric {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Numeric {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.denom)
    }
}
