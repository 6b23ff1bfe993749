//! Overflow-checked `Decimal` arithmetic.
//!
//! `Decimal`'s operators panic when a result leaves the 96-bit mantissa
//! range. Every calculation on user-supplied prices and quantities goes
//! through these helpers instead, naming the quantity being computed.

use crate::error::AnalyticsError;
use rust_decimal::Decimal;

pub(crate) fn add(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, AnalyticsError> {
    a.checked_add(b).ok_or(AnalyticsError::Overflow(what))
}

pub(crate) fn sub(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, AnalyticsError> {
    a.checked_sub(b).ok_or(AnalyticsError::Overflow(what))
}

pub(crate) fn mul(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, AnalyticsError> {
    a.checked_mul(b).ok_or(AnalyticsError::Overflow(what))
}

/// Callers guard against a zero divisor; a `None` here is an overflow.
pub(crate) fn div(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, AnalyticsError> {
    a.checked_div(b).ok_or(AnalyticsError::Overflow(what))
}
