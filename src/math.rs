//! 256-bit intermediate arithmetic with explicit rounding direction
//!
//! Every product of two `u128` amounts is formed in [`U256`] so that no
//! multiplication can overflow; only the final quotient is narrowed.

use crate::error::{DlmmError, Result};
use primitive_types::U256;

/// Rounding direction of a division.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero
    Floor,
    /// Away from zero: `(a + b - 1) / b`
    Ceil,
}

#[inline]
fn narrow(v: U256) -> Option<u128> {
    if v > U256::from(u128::MAX) { None } else { Some(v.low_u128()) }
}

/// `a * b / d` rounded as requested, computed in 256 bits.
pub fn mul_div_wide(a: u128, b: u128, d: u128, rounding: Rounding) -> Option<U256> {
    if d == 0 {
        return None;
    }
    let num = U256::from(a) * U256::from(b);
    let d = U256::from(d);
    Some(match rounding {
        Rounding::Floor => num / d,
        Rounding::Ceil => (num + d - U256::one()) / d,
    })
}

/// `a * b / d`, erroring when `d == 0` or the quotient exceeds `u128`.
pub fn mul_div(a: u128, b: u128, d: u128, rounding: Rounding) -> Result<u128> {
    mul_div_wide(a, b, d, rounding)
        .and_then(narrow)
        .ok_or(DlmmError::MathOverflow)
}

/// `a * b / d` clamped to `u128::MAX`. Used for capacities, where an
/// oversized bound is as good as unbounded.
pub fn mul_div_saturating(a: u128, b: u128, d: u128, rounding: Rounding) -> u128 {
    match mul_div_wide(a, b, d, rounding) {
        Some(v) => narrow(v).unwrap_or(u128::MAX),
        None => u128::MAX,
    }
}

/// Value of `(x, y)` in Y terms, scaled by the price denominator:
/// `x * price + y * price_scale`.
pub fn value_in_y(x: u128, y: u128, price: u128, price_scale: u128) -> U256 {
    U256::from(x) * U256::from(price) + U256::from(y) * U256::from(price_scale)
}

/// `floor(sqrt(v))`; always fits in `u128` for a 256-bit input.
pub fn isqrt(v: U256) -> u128 {
    v.integer_sqrt().low_u128()
}

/// `floor(a * b / d)` for 256-bit `a`, `d`.
pub fn mul_div_u256(a: U256, b: u128, d: U256) -> Result<u128> {
    if d.is_zero() {
        return Err(DlmmError::MathOverflow);
    }
    let num = a.checked_mul(U256::from(b)).ok_or(DlmmError::MathOverflow)?;
    narrow(num / d).ok_or(DlmmError::MathOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_and_floor_differ_only_on_remainder() {
        assert_eq!(mul_div(10, 1, 3, Rounding::Floor).unwrap(), 3);
        assert_eq!(mul_div(10, 1, 3, Rounding::Ceil).unwrap(), 4);
        assert_eq!(mul_div(9, 1, 3, Rounding::Ceil).unwrap(), 3);
    }

    #[test]
    fn wide_products_do_not_overflow() {
        let v = mul_div(u128::MAX, u128::MAX, u128::MAX, Rounding::Floor).unwrap();
        assert_eq!(v, u128::MAX);
        assert!(mul_div(u128::MAX, 2, 1, Rounding::Floor).is_err());
        assert_eq!(mul_div_saturating(u128::MAX, 2, 1, Rounding::Ceil), u128::MAX);
    }

    #[test]
    fn zero_divisor_is_an_error() {
        assert_eq!(mul_div(1, 1, 0, Rounding::Floor), Err(DlmmError::MathOverflow));
    }

    #[test]
    fn isqrt_floors() {
        assert_eq!(isqrt(U256::from(99u32)), 9);
        assert_eq!(isqrt(U256::from(100u32)), 10);
        assert_eq!(isqrt(U256::from(u128::MAX) * U256::from(u128::MAX)), u128::MAX);
    }
}
