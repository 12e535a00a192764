/*
 * Fixed-Point Arithmetic
 *
 * The MLFQ scheduling policy needs fractional math (load averages, decayed
 * CPU usage) but the kernel has no floating point unit available early in
 * boot and no desire to save/restore FPU state on every context switch.
 * This module implements a signed Q17.14 fixed-point format: 17 bits of
 * integer part, 14 bits of fractional part, carried in a plain i32.
 *
 * Why this is important:
 * - Gives the MLFQ recurrences (recent_cpu, load_avg) a stable, portable
 *   numeric representation that never touches the FPU
 * - Keeps rounding behavior explicit and testable instead of inheriting
 *   whatever a float-to-int cast happens to do
 */

use core::cmp::Ordering;
use core::ops::{Add, Div, Mul, Neg, Sub};

/// Fractional bits in the Q17.14 format.
const FRAC_BITS: u32 = 14;

/// Scale factor `F = 2^14`.
const F: i64 = 1 << FRAC_BITS;

/// A Q17.14 signed fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);

    /// Convert an integer to fixed point: `n * F`.
    pub const fn from_int(n: i32) -> Self {
        Fixed((n as i64 * F) as i32)
    }

    /// Truncate toward zero: `x / F`.
    pub fn to_int_trunc(self) -> i32 {
        (self.0 as i64 / F) as i32
    }

    /// Round to nearest, half away from zero.
    pub fn to_int_round(self) -> i32 {
        let x = self.0 as i64;
        let half = if x >= 0 { F / 2 } else { -(F / 2) };
        ((x + half) / F) as i32
    }

    /// Multiply by an integer.
    pub fn mul_int(self, n: i32) -> Self {
        Fixed((self.0 as i64 * n as i64) as i32)
    }

    /// Divide by an integer.
    pub fn div_int(self, n: i32) -> Self {
        Fixed((self.0 as i64 / n as i64) as i32)
    }

    /// Raw Q17.14 bit pattern, exposed for tests and debug formatting.
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl Add<i32> for Fixed {
    type Output = Fixed;
    fn add(self, n: i32) -> Fixed {
        Fixed(self.0 + (n as i64 * F) as i32)
    }
}

impl Sub<i32> for Fixed {
    type Output = Fixed;
    fn sub(self, n: i32) -> Fixed {
        Fixed(self.0 - (n as i64 * F) as i32)
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        // 64-bit intermediate avoids overflow for the products this scheduler
        // ever forms (recent_cpu, load_avg stay in a tiny range in practice).
        Fixed(((self.0 as i64 * rhs.0 as i64) / F) as i32)
    }
}

impl Div for Fixed {
    type Output = Fixed;
    fn div(self, rhs: Fixed) -> Fixed {
        Fixed(((self.0 as i64 * F) / rhs.0 as i64) as i32)
    }
}

impl PartialOrd for Fixed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.0.cmp(&other.0))
    }
}

impl Ord for Fixed {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_round_trips_for_whole_numbers() {
        assert_eq!(Fixed::from_int(5).to_int_trunc(), 5);
        assert_eq!(Fixed::from_int(-5).to_int_trunc(), -5);
    }

    #[test]
    fn round_to_nearest_is_half_away_from_zero() {
        // 2.5 rounds to 3; -2.5 rounds to -3.
        let two_and_half = Fixed(Fixed::from_int(2).raw() + F as i32 / 2);
        let neg_two_and_half = Fixed(Fixed::from_int(-2).raw() - F as i32 / 2);
        assert_eq!(two_and_half.to_int_round(), 3);
        assert_eq!(neg_two_and_half.to_int_round(), -3);
    }

    #[test]
    fn add_sub_with_int() {
        let x = Fixed::from_int(10);
        assert_eq!((x + 5).to_int_trunc(), 15);
        assert_eq!((x - 3).to_int_trunc(), 7);
    }

    #[test]
    fn multiply_and_divide_fixed_by_fixed() {
        let a = Fixed::from_int(4);
        let b = Fixed::from_int(2);
        assert_eq!((a * b).to_int_trunc(), 8);
        assert_eq!((a / b).to_int_trunc(), 2);
    }

    #[test]
    fn multiply_and_divide_by_int() {
        let a = Fixed::from_int(4);
        assert_eq!(a.mul_int(3).to_int_trunc(), 12);
        assert_eq!(a.div_int(2).to_int_trunc(), 2);
    }

    #[test]
    fn load_avg_recurrence_stays_stable_near_zero() {
        // (59/60)*0 + (1/60)*1, repeated, should climb monotonically and
        // never go negative or overflow for a reasonable number of steps.
        let fifty_nine_sixtieths = Fixed::from_int(59).div_int(60);
        let one_sixtieth = Fixed::from_int(1).div_int(60);
        let mut load_avg = Fixed::ZERO;
        let mut prev = -1i32;
        for _ in 0..120 {
            load_avg = fifty_nine_sixtieths * load_avg + one_sixtieth.mul_int(1);
            let as_percent = (load_avg.mul_int(100)).to_int_round();
            assert!(as_percent >= prev);
            prev = as_percent;
        }
        assert!(prev <= 100);
    }
}
