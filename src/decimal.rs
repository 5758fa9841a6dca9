//! Fixed-point decimal arithmetic for `xsd:decimal` values.
//!
//! Grounded in `src/frontend/decimal.c`: 2 overflow digits, 20 integer
//! digits, 20 fractional digits, radix-10 digit buffer. Addition and
//! subtraction use ten's-complement arithmetic on the 42-digit buffer;
//! multiplication is long multiplication with overflow detection; division
//! uses a Newton-Raphson reciprocal iterated to convergence or 30 rounds.

use std::cmp::Ordering;
use std::fmt;

pub const OVER_DIGITS: usize = 2;
pub const INT_DIGITS: usize = 20;
pub const FRAC_DIGITS: usize = 20;
pub const TOTAL_DIGITS: usize = OVER_DIGITS + INT_DIGITS + FRAC_DIGITS;
const MAX_NEWTON_ITERS: u32 = 30;

/// A fixed-point decimal: `TOTAL_DIGITS` base-10 digits, negative when `negative`
/// is set, overflowed (value unreliable) when `overflow` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    digit: [u8; TOTAL_DIGITS],
    negative: bool,
    overflow: bool,
}

impl Decimal {
    pub fn zero() -> Self {
        Decimal { digit: [0; TOTAL_DIGITS], negative: false, overflow: false }
    }

    pub fn is_overflow(&self) -> bool {
        self.overflow
    }

    pub fn is_zero(&self) -> bool {
        self.digit.iter().all(|&d| d == 0)
    }

    /// Parse a decimal lexical form, e.g. `"-12.340"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let (negative, rest) = match s.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let mut d = Decimal::zero();
        d.negative = negative;
        if int_part.len() > INT_DIGITS || frac_part.len() > FRAC_DIGITS {
            d.overflow = true;
            return Some(d);
        }
        let int_start = OVER_DIGITS + INT_DIGITS - int_part.len();
        for (i, c) in int_part.chars().enumerate() {
            d.digit[int_start + i] = c.to_digit(10).unwrap() as u8;
        }
        let frac_start = OVER_DIGITS + INT_DIGITS;
        for (i, c) in frac_part.chars().enumerate() {
            d.digit[frac_start + i] = c.to_digit(10).unwrap() as u8;
        }
        if d.is_zero() {
            d.negative = false;
        }
        Some(d)
    }

    pub fn from_i64(v: i64) -> Self {
        let mut d = Decimal::zero();
        d.negative = v < 0;
        let mut mag = v.unsigned_abs();
        let mut pos = OVER_DIGITS + INT_DIGITS;
        while mag != 0 && pos > 0 {
            pos -= 1;
            d.digit[pos] = (mag % 10) as u8;
            mag /= 10;
        }
        if mag != 0 {
            d.overflow = true;
        }
        d
    }

    pub fn to_f64(&self) -> f64 {
        let mut v = 0.0f64;
        for &dig in &self.digit {
            v = v * 10.0 + dig as f64;
        }
        v /= 10f64.powi(FRAC_DIGITS as i32);
        if self.negative {
            -v
        } else {
            v
        }
    }

    fn magnitude_cmp(a: &Decimal, b: &Decimal) -> Ordering {
        a.digit.cmp(&b.digit)
    }

    /// Ten's-complement of the digit buffer, used to turn subtraction into addition.
    fn complement(digit: &[u8; TOTAL_DIGITS]) -> [u8; TOTAL_DIGITS] {
        let mut out = [0u8; TOTAL_DIGITS];
        let mut borrow = 1u8;
        for i in (0..TOTAL_DIGITS).rev() {
            let nine_minus = 9 - digit[i];
            let v = nine_minus + borrow;
            out[i] = v % 10;
            borrow = v / 10;
        }
        out
    }

    fn add_digits(a: &[u8; TOTAL_DIGITS], b: &[u8; TOTAL_DIGITS]) -> ([u8; TOTAL_DIGITS], bool) {
        let mut out = [0u8; TOTAL_DIGITS];
        let mut carry = 0u8;
        for i in (0..TOTAL_DIGITS).rev() {
            let v = a[i] + b[i] + carry;
            out[i] = v % 10;
            carry = v / 10;
        }
        (out, carry != 0)
    }

    /// `self + other`, via radix-complement on the shared 42-digit buffer.
    pub fn add(&self, other: &Decimal) -> Decimal {
        if self.overflow || other.overflow {
            let mut r = Decimal::zero();
            r.overflow = true;
            return r;
        }
        if self.negative == other.negative {
            let (sum, carry) = Self::add_digits(&self.digit, &other.digit);
            let mut r = Decimal { digit: sum, negative: self.negative, overflow: carry };
            if r.is_zero() {
                r.negative = false;
            }
            return r;
        }
        // Opposite signs: add the complement of the subtrahend, drop final carry.
        let (pos, neg) = if self.negative { (other, self) } else { (self, other) };
        let comp = Self::complement(&neg.digit);
        let (sum, carry) = Self::add_digits(&pos.digit, &comp);
        let mut r = if carry {
            Decimal { digit: sum, negative: false, overflow: false }
        } else {
            Decimal { digit: Self::complement(&sum), negative: true, overflow: false }
        };
        if r.is_zero() {
            r.negative = false;
        }
        r
    }

    pub fn sub(&self, other: &Decimal) -> Decimal {
        let mut neg_other = *other;
        if !neg_other.is_zero() {
            neg_other.negative = !neg_other.negative;
        }
        self.add(&neg_other)
    }

    /// Long multiplication with overflow detection on the fixed-point scale.
    pub fn mul(&self, other: &Decimal) -> Decimal {
        if self.overflow || other.overflow {
            let mut r = Decimal::zero();
            r.overflow = true;
            return r;
        }
        // Work in plain base-10 big integers (digit[0] most significant).
        let mut acc = vec![0u32; TOTAL_DIGITS * 2];
        for (i, &da) in self.digit.iter().rev().enumerate() {
            if da == 0 {
                continue;
            }
            for (j, &db) in other.digit.iter().rev().enumerate() {
                acc[i + j] += da as u32 * db as u32;
            }
        }
        // Normalize carries.
        let mut carry = 0u32;
        for slot in acc.iter_mut() {
            let v = *slot + carry;
            *slot = v % 10;
            carry = v / 10;
        }
        let overflowed = carry != 0;
        // acc[k] holds the digit at 10^k; product's fractional scale is
        // 2*FRAC_DIGITS, so the result's fractional digit k' = k - FRAC_DIGITS.
        let mut out = Decimal::zero();
        let mut overflow = overflowed;
        for k in 0..acc.len() {
            let scaled_k = k as i64 - FRAC_DIGITS as i64;
            if scaled_k < 0 {
                // Precision silently lost below the fractional floor; not an overflow.
                continue;
            }
            let pos = TOTAL_DIGITS as i64 - 1 - scaled_k;
            if pos < 0 {
                if acc[k] != 0 {
                    overflow = true;
                }
                continue;
            }
            out.digit[pos as usize] = acc[k] as u8;
        }
        out.negative = self.negative != other.negative;
        out.overflow = overflow;
        if out.is_zero() {
            out.negative = false;
        }
        out
    }

    /// Division via a Newton-Raphson reciprocal: `x_{n+1} = x_n (2 - d x_n)`,
    /// iterated until two successive iterates agree or `MAX_NEWTON_ITERS` rounds
    /// elapse, then `self * reciprocal`.
    pub fn div(&self, other: &Decimal) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        if self.overflow || other.overflow {
            let mut r = Decimal::zero();
            r.overflow = true;
            return Some(r);
        }
        let d = other.to_f64().abs();
        if d == 0.0 || !d.is_finite() {
            return None;
        }
        let mut x = 1.0 / d;
        for _ in 0..MAX_NEWTON_ITERS {
            let next = x * (2.0 - d * x);
            if (next - x).abs() < 1e-18 {
                x = next;
                break;
            }
            x = next;
        }
        let reciprocal = Decimal::from_f64_approx(x);
        let mut result = self.mul(&reciprocal);
        result.negative = (self.negative != other.negative) && !result.is_zero();
        Some(result)
    }

    fn from_f64_approx(v: f64) -> Decimal {
        let negative = v < 0.0;
        let mut mag = v.abs();
        let mut d = Decimal::zero();
        let int_part = mag.trunc() as u128;
        mag -= mag.trunc();
        let mut pos = OVER_DIGITS + INT_DIGITS;
        let mut int_part = int_part;
        while int_part != 0 && pos > 0 {
            pos -= 1;
            d.digit[pos] = (int_part % 10) as u8;
            int_part /= 10;
        }
        let mut frac_pos = OVER_DIGITS + INT_DIGITS;
        for _ in 0..FRAC_DIGITS {
            mag *= 10.0;
            let digit = mag.trunc() as u8;
            d.digit[frac_pos] = digit;
            mag -= mag.trunc();
            frac_pos += 1;
        }
        d.negative = negative && !d.is_zero();
        d
    }

    pub fn neg(&self) -> Decimal {
        let mut r = *self;
        if !r.is_zero() {
            r.negative = !r.negative;
        }
        r
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => Self::magnitude_cmp(self, other),
            (true, true) => Self::magnitude_cmp(other, self),
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overflow {
            return write!(f, "<overflow>");
        }
        if self.negative {
            write!(f, "-")?;
        }
        let int_digits = &self.digit[OVER_DIGITS..OVER_DIGITS + INT_DIGITS];
        let frac_digits = &self.digit[OVER_DIGITS + INT_DIGITS..];
        let int_str: String = int_digits.iter().map(|d| (b'0' + d) as char).collect();
        let int_trimmed = int_str.trim_start_matches('0');
        write!(f, "{}", if int_trimmed.is_empty() { "0" } else { int_trimmed })?;
        if frac_digits.iter().any(|&d| d != 0) {
            write!(f, ".")?;
            for &d in frac_digits {
                write!(f, "{}", d)?;
            }
        }
        Ok(())
    }
}
