// Copyright 2026 the Decimal Machine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Finite decimal arithmetic in the decimal128 envelope.
//!
//! A [`Dec128`] is `coefficient * 10^exponent` with at most 34 significant
//! digits and the decimal128 exponent range. Special values (NaN, ±Inf) are
//! unrepresentable: every operation that would produce one returns a
//! [`DecError`] instead. Results are rounded half-even to 34 digits.

use core::cmp::Ordering;
use core::fmt;

/// Maximum significant digits of a coefficient.
const COEFF_DIGITS: u32 = 34;
/// Exclusive coefficient magnitude bound (`10^34`).
const COEFF_LIMIT: u128 = 10u128.pow(COEFF_DIGITS);
/// Maximum adjusted exponent (exponent of the most significant digit).
const EMAX: i32 = 6144;
/// Smallest exponent a coefficient may carry.
const ETINY: i32 = EMAX - 1 - 2 * (COEFF_DIGITS as i32 - 1); // -6176
/// Largest exponent a full-width coefficient may carry.
const ETOP: i32 = EMAX - (COEFF_DIGITS as i32 - 1); // 6111

/// An arithmetic fault.
///
/// These are the only ways an operation on in-range operands can fail; there
/// is no NaN/Inf propagation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecError {
    /// The result's adjusted exponent exceeded the decimal128 maximum.
    Overflow,
    /// The result was inexact below the smallest representable exponent.
    Underflow,
    /// Division by zero.
    DivisionByZero,
    /// The operation is undefined for its operands (e.g. `0 ^ -1`, a
    /// fractional power this machine does not evaluate).
    IllegalOperation,
}

impl fmt::Display for DecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "result was too large"),
            Self::Underflow => write!(f, "result was too small"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::IllegalOperation => write!(f, "illegal operation"),
        }
    }
}

impl core::error::Error for DecError {}

/// A literal that did not parse as a finite decimal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InvalidDecimal;

impl fmt::Display for InvalidDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal literal")
    }
}

impl core::error::Error for InvalidDecimal {}

/// A finite decimal value: `coefficient * 10^exponent`.
///
/// Invariants: `|coefficient| < 10^34`, `ETINY <= exponent`, and the adjusted
/// exponent never exceeds `EMAX`. Zero is `coefficient == 0`; there is no
/// negative zero. Equality and ordering are numeric, not structural.
#[derive(Copy, Clone, Debug)]
pub struct Dec128 {
    coeff: i128,
    exp: i32,
}

impl Dec128 {
    /// Numeric zero.
    pub const ZERO: Self = Self { coeff: 0, exp: 0 };
    /// Numeric one.
    pub const ONE: Self = Self { coeff: 1, exp: 0 };

    pub(crate) const fn new_raw(coeff: i128, exp: i32) -> Self {
        Self { coeff, exp }
    }

    /// Returns the signed coefficient.
    #[must_use]
    pub fn coefficient(self) -> i128 {
        self.coeff
    }

    /// Returns the exponent.
    #[must_use]
    pub fn exponent(self) -> i32 {
        self.exp
    }

    /// Parses a plain decimal literal: optional sign, digits, optional
    /// fractional part. Scientific notation and specials (NaN, Inf) are
    /// rejected; out-of-range values are rejected rather than clamped to a
    /// special.
    pub fn parse(s: &str) -> Result<Self, InvalidDecimal> {
        let bytes = s.as_bytes();
        let mut i = 0;
        let neg = match bytes.first() {
            Some(b'-') => {
                i = 1;
                true
            }
            Some(b'+') => {
                i = 1;
                false
            }
            _ => false,
        };

        let mut mag: u128 = 0;
        let mut ndigits: u32 = 0;
        let mut any_digit = false;
        let mut seen_point = false;
        let mut exp: i64 = 0;
        let mut sticky = false;

        while i < bytes.len() {
            match bytes[i] {
                c @ b'0'..=b'9' => {
                    any_digit = true;
                    let d = u128::from(c - b'0');
                    if ndigits < 38 {
                        if mag == 0 && d == 0 {
                            // Leading zero: contributes only to the scale.
                            if seen_point {
                                exp -= 1;
                            }
                        } else {
                            mag = mag * 10 + d;
                            ndigits += 1;
                            if seen_point {
                                exp -= 1;
                            }
                        }
                    } else if seen_point {
                        sticky |= d != 0;
                    } else {
                        exp += 1;
                        sticky |= d != 0;
                    }
                }
                b'.' => {
                    if seen_point {
                        return Err(InvalidDecimal);
                    }
                    seen_point = true;
                }
                _ => return Err(InvalidDecimal),
            }
            i += 1;
        }

        if !any_digit {
            return Err(InvalidDecimal);
        }
        finish(neg, mag, exp, sticky).map_err(|_| InvalidDecimal)
    }

    /// Builds a value from an `i32`. Always exact.
    #[must_use]
    pub fn from_i32(v: i32) -> Self {
        Self {
            coeff: i128::from(v),
            exp: 0,
        }
    }

    /// Builds a value from an `i64`. Always exact.
    #[must_use]
    pub fn from_i64(v: i64) -> Self {
        Self {
            coeff: i128::from(v),
            exp: 0,
        }
    }

    /// Returns `true` for any representation of zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.coeff == 0
    }

    /// Returns `true` for values strictly below zero.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.coeff < 0
    }

    /// Returns `true` when the value has no fractional part.
    #[must_use]
    pub fn is_integer(self) -> bool {
        if self.exp >= 0 || self.coeff == 0 {
            return true;
        }
        let drop = -i64::from(self.exp);
        if drop > 38 {
            return false;
        }
        self.coeff.unsigned_abs() % p10(drop as u32) == 0
    }

    /// Returns the value as an `i32` when it is an integer in range.
    #[must_use]
    pub fn to_i32(self) -> Option<i32> {
        if self.coeff == 0 {
            return Some(0);
        }
        let int = if self.exp >= 0 {
            if self.exp > 10 {
                return None;
            }
            self.coeff.checked_mul(p10(self.exp as u32) as i128)?
        } else {
            let drop = -i64::from(self.exp);
            if drop > 38 {
                return None;
            }
            let p = p10(drop as u32) as i128;
            if self.coeff % p != 0 {
                return None;
            }
            self.coeff / p
        };
        i32::try_from(int).ok()
    }

    /// Strips trailing zeros from the coefficient, keeping the exponent
    /// within the clamped range. Zero normalizes to exponent 0.
    #[must_use]
    pub fn reduce(self) -> Self {
        if self.coeff == 0 {
            return Self::ZERO;
        }
        let neg = self.coeff < 0;
        let mut mag = self.coeff.unsigned_abs();
        let mut exp = self.exp;
        while mag % 10 == 0 && exp < ETOP {
            mag /= 10;
            exp += 1;
        }
        let coeff = mag as i128;
        Self {
            coeff: if neg { -coeff } else { coeff },
            exp,
        }
    }

    /// Arithmetic negation. Always exact.
    #[must_use]
    pub fn neg(self) -> Self {
        Self {
            coeff: -self.coeff,
            exp: self.exp,
        }
    }

    /// Addition, rounded half-even to 34 digits.
    pub fn add(self, rhs: Self) -> Result<Self, DecError> {
        if self.coeff == 0 {
            return Ok(rhs);
        }
        if rhs.coeff == 0 {
            return Ok(self);
        }

        // A 38-digit window anchored at the higher of the two most
        // significant digit positions. Digits below the window only matter
        // as a sticky contribution: the lower-topped operand is then at
        // least five orders of magnitude smaller, so cancellation cannot
        // promote them into the kept 34 digits.
        let top_a = i64::from(self.exp) + i64::from(digits128(self.coeff.unsigned_abs()));
        let top_b = i64::from(rhs.exp) + i64::from(digits128(rhs.coeff.unsigned_abs()));
        let wexp = top_a.max(top_b) - 38;

        let (mag_a, sticky_a) = align(self, wexp);
        let (mag_b, sticky_b) = align(rhs, wexp);
        let neg_a = self.coeff < 0;
        let neg_b = rhs.coeff < 0;
        let sticky = sticky_a || sticky_b;

        let (neg, mut mag) = if neg_a == neg_b {
            (neg_a, mag_a + mag_b)
        } else if mag_a >= mag_b {
            (neg_a, mag_a - mag_b)
        } else {
            (neg_b, mag_b - mag_a)
        };
        if neg_a != neg_b && sticky {
            // Discarded digits on the subtractive side pull the magnitude
            // below the window value by less than one window unit.
            mag -= 1;
        }
        finish(neg, mag, wexp, sticky)
    }

    /// Subtraction, rounded half-even to 34 digits.
    pub fn sub(self, rhs: Self) -> Result<Self, DecError> {
        self.add(rhs.neg())
    }

    /// Multiplication, rounded half-even to 34 digits.
    pub fn mul(self, rhs: Self) -> Result<Self, DecError> {
        if self.coeff == 0 || rhs.coeff == 0 {
            return Ok(Self::ZERO);
        }
        let neg = (self.coeff < 0) != (rhs.coeff < 0);
        let mut wide = mul_u128(self.coeff.unsigned_abs(), rhs.coeff.unsigned_abs());
        let mut exp = i64::from(self.exp) + i64::from(rhs.exp);
        let mut sticky = false;
        // Bring the 68-digit product down to a u128 magnitude; anything
        // dropped here sits strictly below the guard digit finish() keeps.
        while wide.hi != 0 || wide.lo >= WIDE_LIMIT {
            let (q, r) = divrem10(wide);
            sticky |= r != 0;
            wide = q;
            exp += 1;
        }
        finish(neg, wide.lo, exp, sticky)
    }

    /// Division, rounded half-even to 34 digits.
    pub fn div(self, rhs: Self) -> Result<Self, DecError> {
        if rhs.coeff == 0 {
            return Err(DecError::DivisionByZero);
        }
        if self.coeff == 0 {
            return Ok(Self::ZERO);
        }
        let neg = (self.coeff < 0) != (rhs.coeff < 0);
        let nb = rhs.coeff.unsigned_abs();
        let mut rexp = i64::from(self.exp) - i64::from(rhs.exp);

        let na = self.coeff.unsigned_abs();
        let mut q = na / nb;
        let mut rem = na % nb;
        if q == 0 {
            // rem == na != 0 here; scale up to produce the first digit.
            while rem < nb {
                rem *= 10;
                rexp -= 1;
            }
            q = rem / nb;
            rem %= nb;
        }
        // Generate up to 35 significant digits (34 plus a guard).
        let mut qd = digits128(q);
        while qd < COEFF_DIGITS + 1 && rem != 0 {
            rem *= 10;
            rexp -= 1;
            q = q * 10 + rem / nb;
            rem %= nb;
            qd += 1;
        }
        finish(neg, q, rexp, rem != 0)
    }

    /// Power. Supports integer exponents (binary exponentiation) and
    /// half-integer exponents (via a decimal square root); any other
    /// fractional exponent is [`DecError::IllegalOperation`].
    pub fn pow(self, rhs: Self) -> Result<Self, DecError> {
        let e = rhs.reduce();
        if e.coeff == 0 {
            // 0^0 = 0 by machine convention, a^0 = 1.
            return Ok(if self.coeff == 0 { Self::ZERO } else { Self::ONE });
        }
        if self.coeff == 0 {
            return if e.coeff < 0 {
                Err(DecError::IllegalOperation)
            } else {
                Ok(Self::ZERO)
            };
        }

        let (base, k) = if e.is_integer() {
            match integral_exponent(e) {
                Some(k) => (self, k),
                // The exponent magnitude exceeds 10^38: the result either
                // pins to 1 or leaves the representable range entirely.
                None => {
                    let mag_cmp = abs_cmp_one(self);
                    if mag_cmp == Ordering::Equal {
                        // |base| == 1; such a huge integral exponent is even.
                        return Ok(Self::ONE);
                    }
                    let grows = (mag_cmp == Ordering::Greater) == (e.coeff > 0);
                    return Err(if grows {
                        DecError::Overflow
                    } else {
                        DecError::Underflow
                    });
                }
            }
        } else if e.exp == -1 && e.coeff.unsigned_abs() % 5 == 0 {
            // k/2 exponents: a^(k/2) = sqrt(a)^k, with k = coeff / 5.
            if self.coeff < 0 {
                return Err(DecError::IllegalOperation);
            }
            (self.sqrt()?, e.coeff / 5)
        } else {
            return Err(DecError::IllegalOperation);
        };
        ipow(base, k)
    }

    /// Rounds toward negative infinity to an integer. Infallible.
    #[must_use]
    pub fn floor(self) -> Self {
        self.round_int(IntRounding::Floor)
    }

    /// Rounds toward positive infinity to an integer. Infallible.
    #[must_use]
    pub fn ceil(self) -> Self {
        self.round_int(IntRounding::Ceil)
    }

    /// Rounds half-even to an integer. Infallible.
    #[must_use]
    pub fn round(self) -> Self {
        self.round_int(IntRounding::HalfEven)
    }

    fn round_int(self, mode: IntRounding) -> Self {
        if self.exp >= 0 || self.coeff == 0 {
            return self;
        }
        let neg = self.coeff < 0;
        let mag = self.coeff.unsigned_abs();
        let drop = -i64::from(self.exp);
        let (q, guard, sticky) = if drop > 38 {
            (0u128, 0u32, true)
        } else {
            let p = p10(drop as u32);
            let unit = p10(drop as u32 - 1);
            let r = mag % p;
            (mag / p, (r / unit) as u32, r % unit != 0)
        };
        let inexact = guard != 0 || sticky;
        let bump = match mode {
            IntRounding::Ceil => !neg && inexact,
            IntRounding::Floor => neg && inexact,
            IntRounding::HalfEven => guard > 5 || (guard == 5 && (sticky || q % 2 == 1)),
        };
        let q = q + u128::from(bump);
        if q == 0 {
            return Self::ZERO;
        }
        let (q, exp) = if q == COEFF_LIMIT { (q / 10, 1) } else { (q, 0) };
        let coeff = q as i128;
        Self {
            coeff: if neg { -coeff } else { coeff },
            exp,
        }
    }

    /// Square root by Newton iteration, for non-negative values.
    fn sqrt(self) -> Result<Self, DecError> {
        if self.coeff == 0 {
            return Ok(Self::ZERO);
        }
        let mut c = self.coeff.unsigned_abs();
        let mut e = i64::from(self.exp);
        if e.rem_euclid(2) == 1 {
            c *= 10;
            e -= 1;
        }
        // Integer square root of the (even-exponent) coefficient seeds the
        // iteration with half the significant digits; exact square inputs
        // converge immediately.
        let seed = c.isqrt().max(1);
        let mut x = finish(false, seed, e / 2, false)?;
        let half = Self { coeff: 5, exp: -1 };
        for _ in 0..20 {
            let t = self.div(x)?;
            let next = x.add(t)?.mul(half)?;
            if next == x {
                break;
            }
            x = next;
        }
        Ok(x.reduce())
    }
}

impl PartialEq for Dec128 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Dec128 {}

impl PartialOrd for Dec128 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dec128 {
    fn cmp(&self, other: &Self) -> Ordering {
        let sa = sign_of(self.coeff);
        let sb = sign_of(other.coeff);
        if sa != sb {
            return sa.cmp(&sb);
        }
        if sa == 0 {
            return Ordering::Equal;
        }
        let by_mag = cmp_mag(*self, *other);
        if sa > 0 { by_mag } else { by_mag.reverse() }
    }
}

impl fmt::Display for Dec128 {
    /// Plain notation only: an integer renders without a point, a fraction
    /// in minimal form with a leading zero before the point. Zero is `"0"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coeff == 0 {
            return f.write_str("0");
        }
        if self.coeff < 0 {
            f.write_str("-")?;
        }
        let digits = alloc::format!("{}", self.coeff.unsigned_abs());
        if self.exp >= 0 {
            f.write_str(&digits)?;
            for _ in 0..self.exp {
                f.write_str("0")?;
            }
            Ok(())
        } else {
            let frac = (-self.exp) as usize;
            if digits.len() > frac {
                let (int_part, frac_part) = digits.split_at(digits.len() - frac);
                write!(f, "{int_part}.{frac_part}")
            } else {
                f.write_str("0.")?;
                for _ in 0..(frac - digits.len()) {
                    f.write_str("0")?;
                }
                f.write_str(&digits)
            }
        }
    }
}

#[derive(Copy, Clone)]
enum IntRounding {
    Ceil,
    Floor,
    HalfEven,
}

fn sign_of(c: i128) -> i8 {
    match c {
        0 => 0,
        c if c > 0 => 1,
        _ => -1,
    }
}

/// Compares magnitudes of two nonzero values.
fn cmp_mag(a: Dec128, b: Dec128) -> Ordering {
    let ma = a.coeff.unsigned_abs();
    let mb = b.coeff.unsigned_abs();
    let top_a = i64::from(a.exp) + i64::from(digits128(ma));
    let top_b = i64::from(b.exp) + i64::from(digits128(mb));
    match top_a.cmp(&top_b) {
        Ordering::Equal => {
            // Equal digit span: the shift is bounded by the digit counts,
            // so the scaled coefficient stays within 34 digits.
            if a.exp >= b.exp {
                (ma * p10((a.exp - b.exp) as u32)).cmp(&mb)
            } else {
                ma.cmp(&(mb * p10((b.exp - a.exp) as u32)))
            }
        }
        other => other,
    }
}

/// Scales a value into the 38-digit window at `wexp`, returning the window
/// magnitude and whether nonzero digits fell below the window.
fn align(d: Dec128, wexp: i64) -> (u128, bool) {
    let mag = d.coeff.unsigned_abs();
    let shift = i64::from(d.exp) - wexp;
    if shift >= 0 {
        (mag * p10(shift as u32), false)
    } else {
        let k = -shift;
        if k > 38 {
            (0, mag != 0)
        } else {
            let p = p10(k as u32);
            (mag / p, mag % p != 0)
        }
    }
}

/// Extracts an integral exponent value when it fits in an `i128`.
///
/// Beyond `10^38` the caller's magnitude shortcut applies: the closest
/// representable base to one is `1 ± 1e-33`, and `(1 + 1e-33)^(10^38)`
/// already leaves the exponent range. Such exponents are also divisible by
/// ten, keeping the shortcut's parity reasoning valid.
fn integral_exponent(e: Dec128) -> Option<i128> {
    if e.exp < 0 {
        // Unreachable for reduced integral values.
        return None;
    }
    let exp = e.exp as u32;
    if digits128(e.coeff.unsigned_abs()) + exp > 38 {
        return None;
    }
    e.coeff.checked_mul(p10(exp) as i128)
}

/// Compares `|d|` against one.
fn abs_cmp_one(d: Dec128) -> Ordering {
    cmp_mag(d, Dec128::ONE)
}

/// Binary exponentiation with half-even rounding at each step.
fn ipow(base: Dec128, e: i128) -> Result<Dec128, DecError> {
    let mut remaining = e.unsigned_abs();
    let mut acc = Dec128::ONE;
    let mut b = base;
    loop {
        if remaining & 1 == 1 {
            acc = acc.mul(b)?;
        }
        remaining >>= 1;
        if remaining == 0 {
            break;
        }
        b = b.mul(b)?;
    }
    if e < 0 { Dec128::ONE.div(acc) } else { Ok(acc) }
}

fn digits128(v: u128) -> u32 {
    match v.checked_ilog10() {
        Some(l) => l + 1,
        None => 0,
    }
}

/// `10^n` for `n <= 38`.
fn p10(n: u32) -> u128 {
    10u128.pow(n)
}

/// Rounds `(mag, exp, sticky)` half-even into a valid [`Dec128`], applying
/// the decimal128 exponent clamp and range checks.
fn finish(neg: bool, mut mag: u128, mut exp: i64, sticky_in: bool) -> Result<Dec128, DecError> {
    let mut guard: u32 = 0;
    let mut sticky = sticky_in;
    while mag >= COEFF_LIMIT {
        sticky |= guard != 0;
        guard = (mag % 10) as u32;
        mag /= 10;
        exp += 1;
    }
    let inexact = guard != 0 || sticky;
    if guard > 5 || (guard == 5 && (sticky || mag % 2 == 1)) {
        mag += 1;
        if mag == COEFF_LIMIT {
            mag /= 10;
            exp += 1;
        }
    }
    if mag == 0 {
        return if inexact {
            Err(DecError::Underflow)
        } else {
            Ok(Dec128::ZERO)
        };
    }
    if exp < i64::from(ETINY) {
        // An inexact subnormal is an error; an exact shift into range is not.
        let drop = i64::from(ETINY) - exp;
        if drop > 38 {
            return Err(DecError::Underflow);
        }
        let p = p10(drop as u32);
        if inexact || mag % p != 0 {
            return Err(DecError::Underflow);
        }
        mag /= p;
        exp = i64::from(ETINY);
    }
    if exp > i64::from(ETOP) {
        let pad = exp - i64::from(ETOP);
        if pad > i64::from(COEFF_DIGITS) - 1 {
            return Err(DecError::Overflow);
        }
        if digits128(mag) + pad as u32 > COEFF_DIGITS {
            return Err(DecError::Overflow);
        }
        mag *= p10(pad as u32);
        exp = i64::from(ETOP);
    }
    let coeff = mag as i128;
    Ok(Dec128 {
        coeff: if neg { -coeff } else { coeff },
        exp: exp as i32,
    })
}

/// Exclusive bound on the wide-phase magnitude (`10^38`).
const WIDE_LIMIT: u128 = 10u128.pow(38);

#[derive(Copy, Clone)]
struct U256 {
    hi: u128,
    lo: u128,
}

fn mul_u128(a: u128, b: u128) -> U256 {
    const MASK: u128 = (1u128 << 64) - 1;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);
    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;
    let (mid, mid_carry) = lh.overflowing_add(hl);
    let (lo, carry) = ll.overflowing_add(mid << 64);
    let hi = hh + (mid >> 64) + u128::from(carry) + (u128::from(mid_carry) << 64);
    U256 { hi, lo }
}

fn divrem10(x: U256) -> (U256, u32) {
    const TWO128_DIV10: u128 = u128::MAX / 10;
    const TWO128_MOD10: u128 = u128::MAX % 10 + 1; // 2^128 mod 10 == 6
    let hi_q = x.hi / 10;
    let hi_r = x.hi % 10;
    let r_part = hi_r * TWO128_MOD10 + x.lo % 10;
    let lo_q = hi_r * TWO128_DIV10 + x.lo / 10 + r_part / 10;
    (U256 { hi: hi_q, lo: lo_q }, (r_part % 10) as u32)
}
