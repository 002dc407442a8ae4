use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Mxn,
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Mxn => "MXN",
            Currency::Usd => "USD",
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MXN" => Ok(Currency::Mxn),
            "USD" => Ok(Currency::Usd),
            other => Err(Error::Ingestion(format!("Unknown currency: {}", other))),
        }
    }
}

/// Signed amount in minor units (cents) tagged with its currency.
///
/// Serializes as the bare integer cents; records that carry money also carry
/// their currency once at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Money {
    pub cents: i64,
    pub currency: Currency,
}

impl Money {
    pub const SCALE: i64 = 100; // 2 decimal places
    pub const TARGET_DECIMALS: u32 = 2;

    pub fn new(cents: i64, currency: Currency) -> Self {
        Self { cents, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    pub fn negated(self) -> Self {
        Self::new(-self.cents, self.currency)
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), Error> {
        if self.currency != other.currency {
            return Err(Error::CurrencyMismatch {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(())
    }

    pub fn checked_add(self, other: Money) -> Result<Self, Error> {
        self.ensure_same_currency(&other)?;
        self.cents
            .checked_add(other.cents)
            .map(|cents| Self::new(cents, self.currency))
            .ok_or(Error::Overflow)
    }

    pub fn checked_sub(self, other: Money) -> Result<Self, Error> {
        self.ensure_same_currency(&other)?;
        self.cents
            .checked_sub(other.cents)
            .map(|cents| Self::new(cents, self.currency))
            .ok_or(Error::Overflow)
    }

    /// Clamps negative amounts to zero.
    pub fn floor_zero(self) -> Self {
        Self::new(self.cents.max(0), self.currency)
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, Self::TARGET_DECIMALS)
    }

    pub fn from_scaled_i128(value: i128, scale: u32, currency: Currency) -> Option<Self> {
        let narrow = |v: i128| i64::try_from(v).ok().map(|cents| Self::new(cents, currency));

        if scale <= Self::TARGET_DECIMALS {
            let factor = 10i128.checked_pow(Self::TARGET_DECIMALS - scale)?;
            return narrow(value.checked_mul(factor)?);
        }

        // scale > TARGET_DECIMALS: need rounding
        let factor = 10i128.checked_pow(scale - Self::TARGET_DECIMALS)?;
        let div = value / factor; // truncated toward zero
        let rem = value % factor;
        let half = factor / 2;
        let abs_rem = rem.abs();
        let step = if value.is_negative() { -1 } else { 1 };
        let adjusted = if abs_rem > half || (abs_rem == half && div & 1 != 0) {
            // tie -> bankers (round half to even)
            div + step
        } else {
            div
        };
        narrow(adjusted)
    }

    /// Parses a major-unit string such as `125.5` or `-3.005`.
    pub fn from_decimal_str(s: &str, currency: Currency) -> Option<Self> {
        let s = s.trim();

        if s.is_empty() {
            return None;
        }
        let (neg, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut parts = body.split('.');
        let int_part = parts.next()?;
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let int_val: i128 = int_part.parse().ok()?;
        let frac_opt = parts.next();
        if parts.next().is_some() {
            return None;
        }
        let (raw, scale) = match frac_opt {
            Some(frac) if !frac.is_empty() => {
                if !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let scale = u32::try_from(frac.len()).ok()?;
                (
                    int_val.checked_mul(10i128.checked_pow(scale)?)? + frac.parse::<i128>().ok()?,
                    scale,
                )
            }
            _ => (int_val, 0),
        };
        let signed = if neg { -raw } else { raw };
        Money::from_scaled_i128(signed, scale, currency)
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        if self.currency != other.currency {
            return None;
        }
        Some(self.cents.cmp(&other.cents))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        let scale = Self::SCALE as u64;
        write!(
            f,
            "{}{}.{:02} {}",
            sign,
            abs / scale,
            abs % scale,
            self.currency
        )
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.cents)
    }
}
