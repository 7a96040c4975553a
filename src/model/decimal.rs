//! Exact decimal numbers
//!
//! The record store keeps numbers as exact decimals. [`Decimal`] wraps
//! [`BigDecimal`] so they never pass through binary floating point, accepts
//! only plain numeric literals with a bounded exponent, and renders the
//! shortest exact plain notation.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;

/// Largest exponent magnitude accepted when parsing scientific notation.
///
/// Keeps `1e999999999` from expanding into a gigabyte of zeros.
const MAX_EXPONENT: u64 = 4096;

/// Exact decimal value, always held in normalized form.
///
/// Equality is numeric: `0.30 == 0.3` and `-0 == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(BigDecimal);

/// Error returned when text is not a decimal number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDecimalError(String);

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal literal: {}", self.0)
    }
}

impl std::error::Error for ParseDecimalError {}

impl Decimal {
    /// The value zero.
    pub fn zero() -> Self {
        Self(BigDecimal::default())
    }

    fn normalized(value: BigDecimal) -> Self {
        Self(value.normalized())
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_string());
        let text = s.trim();

        let (negative, rest) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let mantissa = match rest.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = rest[pos + 1..].parse().map_err(|_| err())?;
                if exp.unsigned_abs() > MAX_EXPONENT {
                    return Err(err());
                }
                &rest[..pos]
            }
            None => rest,
        };

        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(err());
        }

        let literal = if negative {
            format!("-{rest}")
        } else {
            rest.to_string()
        };
        let value = BigDecimal::from_str(&literal).map_err(|_| err())?;
        Ok(Self::normalized(value))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_plain_string())
    }
}

impl From<i64> for Decimal {
    fn from(n: i64) -> Self {
        Self::normalized(BigDecimal::from(n))
    }
}

impl From<u64> for Decimal {
    fn from(n: u64) -> Self {
        Self::normalized(BigDecimal::from(n))
    }
}
