// Fixed-point monetary amounts
// Stored as BIGINT minor units (cents); exposed over JSON as a plain number

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::BigInt;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const CENTS_PER_UNIT: i64 = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must not be negative")]
    Negative,

    #[error("amount supports at most two decimal places")]
    TooPrecise,

    #[error("amount is out of range")]
    OutOfRange,
}

/// Non-negative amount held in cents
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = BigInt)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Result<Self, AmountError> {
        if cents < 0 {
            return Err(AmountError::Negative);
        }
        Ok(Self(cents))
    }

    /// Amount worth exactly `units` whole currency units
    pub fn from_whole_units(units: i64) -> Result<Self, AmountError> {
        let cents = units
            .checked_mul(CENTS_PER_UNIT)
            .ok_or(AmountError::OutOfRange)?;
        Self::from_cents(cents)
    }

    /// Parse a JSON-style decimal, rejecting anything finer than a cent
    pub fn from_decimal(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::OutOfRange);
        }
        if value < 0.0 {
            return Err(AmountError::Negative);
        }

        let scaled = value * CENTS_PER_UNIT as f64;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            return Err(AmountError::TooPrecise);
        }
        if rounded > i64::MAX as f64 {
            return Err(AmountError::OutOfRange);
        }

        Self::from_cents(rounded as i64)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// floor(amount)
    pub fn whole_units(&self) -> i64 {
        self.0 / CENTS_PER_UNIT
    }

    /// floor(amount * 2)
    pub fn doubled_whole_units(&self) -> i64 {
        self.0.saturating_mul(2) / CENTS_PER_UNIT
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / CENTS_PER_UNIT as f64
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / CENTS_PER_UNIT, self.0 % CENTS_PER_UNIT)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative number with at most two decimal places")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        let units = i64::try_from(v).map_err(|_| E::custom(AmountError::OutOfRange))?;
        Amount::from_whole_units(units).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Amount::from_whole_units(v).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Amount::from_decimal(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

impl FromSql<BigInt, Pg> for Amount {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let cents = <i64 as FromSql<BigInt, Pg>>::from_sql(bytes)?;
        Amount::from_cents(cents).map_err(|e| e.into())
    }
}

impl ToSql<BigInt, Pg> for Amount {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <i64 as ToSql<BigInt, Pg>>::to_sql(&self.0, out)
    }
}
