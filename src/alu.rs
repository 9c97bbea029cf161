//! Stateless arithmetic/logic functions over [`TritWord`]s.
//!
//! Every function here is a pure function of its arguments; there is no
//! ALU object to construct. This mirrors the teacher's `fields::OpResult`
//! arithmetic, which likewise returns a fresh value plus flag information
//! rather than mutating shared state.

use crate::error::T3Error;
use crate::trit::{Trit, TritWord};

/// Comparison/flag outcome of an ALU operation, analogous to the
/// teacher's `CCRFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub zero: bool,
    pub negative: bool,
    pub positive: bool,
    pub overflow: bool,
}

fn flags_of(result: &TritWord, overflow: bool) -> Flags {
    let v = result.to_decimal();
    Flags {
        zero: v == 0,
        negative: v < 0,
        positive: v > 0,
        overflow,
    }
}

/// `a + b`, widening by one trit to carry any overflow, then truncated
/// back to `a`'s width.
pub fn add(a: &TritWord, b: &TritWord) -> (TritWord, Flags) {
    let len = a.len().max(b.len());
    let mut result = TritWord::zero(len + 1);
    let mut carry = Trit::NEUTRAL;
    for i in 0..len {
        // Balanced-ternary full add: value of a+b+carry can be -3..=3;
        // decompose into digit + new carry.
        let raw = a.get(i).value() + b.get(i).value() + carry.value();
        let (digit, new_carry) = decompose(raw);
        result.set(i, digit);
        carry = new_carry;
    }
    result.set(len, carry);
    let overflow = !carry.is_unknown() && len >= a.len();
    let truncated = result.resized(len);
    (truncated, flags_of(&truncated, overflow))
}

fn decompose(raw: i32) -> (Trit, Trit) {
    // raw in -3..=3; express as digit in {-1,0,1} plus carry in {-1,0,1}
    // such that digit + 3*carry == raw.
    let mut carry = 0;
    let mut digit = raw;
    while digit > 1 {
        digit -= 3;
        carry += 1;
    }
    while digit < -1 {
        digit += 3;
        carry -= 1;
    }
    (Trit::new(digit).expect("decomposed digit in -1..=1"), Trit::new(carry).expect("decomposed carry in -1..=1"))
}

pub fn sub(a: &TritWord, b: &TritWord) -> (TritWord, Flags) {
    let neg_b = neg(b);
    add(a, &neg_b)
}

pub fn neg(a: &TritWord) -> TritWord {
    TritWord::new(a.trits().iter().map(|t| t.neg()).collect())
}

pub fn abs(a: &TritWord) -> TritWord {
    if a.to_decimal() < 0 {
        neg(a)
    } else {
        a.clone()
    }
}

/// Shift-and-add multiplication. An empty or all-zero operand yields 0.
pub fn mul(a: &TritWord, b: &TritWord) -> (TritWord, Flags) {
    let len = a.len().max(b.len());
    if a.is_zero() || b.is_zero() {
        let result = TritWord::zero(len);
        return (result.clone(), flags_of(&result, false));
    }
    let mut acc: i64 = 0;
    let av = a.to_decimal();
    let bv = b.to_decimal();
    acc += av * bv;
    let max = (3i64.pow(len as u32) - 1) / 2;
    let overflow = acc.abs() > max;
    let clamped = acc.clamp(-max, max);
    let result = TritWord::from_decimal(clamped, len).unwrap_or_else(|_| TritWord::zero(len));
    (result.clone(), flags_of(&result, overflow))
}

/// Balanced-ternary division: `a = q*b + r` with `|r| <= |b|/2`.
/// Fails with `DivisionByZero` if `b` is zero. When `|a| < |b|`, returns
/// `(0, a)`.
pub fn div(a: &TritWord, b: &TritWord, pc: Option<usize>) -> Result<(TritWord, TritWord), T3Error> {
    let bv = b.to_decimal();
    if bv == 0 {
        return Err(T3Error::DivisionByZero { pc });
    }
    let av = a.to_decimal();
    if av.abs() < bv.abs() {
        return Ok((TritWord::zero(a.len()), a.clone()));
    }
    let mut q = av / bv;
    let mut r = av - q * bv;
    // Adjust so |r| <= |b|/2, matching balanced-ternary rounding.
    let half = bv.abs();
    while 2 * r.abs() > half {
        if r.signum() == bv.signum() {
            q += 1;
        } else {
            q -= 1;
        }
        r = av - q * bv;
    }
    let quotient = TritWord::from_decimal(q, a.len())?;
    let remainder = TritWord::from_decimal(r, a.len())?;
    Ok((quotient, remainder))
}

pub fn nand(a: &TritWord, b: &TritWord) -> TritWord {
    bitwise(a, b, |x, y| x.and(y).not())
}

pub fn cons(a: &TritWord, b: &TritWord) -> TritWord {
    bitwise(a, b, Trit::and)
}

pub fn any(a: &TritWord, b: &TritWord) -> TritWord {
    bitwise(a, b, Trit::or)
}

pub fn not(a: &TritWord) -> TritWord {
    TritWord::new(a.trits().iter().map(|t| t.not()).collect())
}

fn bitwise(a: &TritWord, b: &TritWord, f: impl Fn(Trit, Trit) -> Trit) -> TritWord {
    let len = a.len().max(b.len());
    let mut result = TritWord::zero(len);
    for i in 0..len {
        result.set(i, f(a.get(i), b.get(i)));
    }
    result
}

/// Three-way compare, returning a single trit: negative if `a<b`, zero if
/// equal, positive if `a>b`.
pub fn cmp(a: &TritWord, b: &TritWord) -> Trit {
    match a.to_decimal().cmp(&b.to_decimal()) {
        std::cmp::Ordering::Less => Trit::NEGATIVE,
        std::cmp::Ordering::Equal => Trit::NEUTRAL,
        std::cmp::Ordering::Greater => Trit::POSITIVE,
    }
}

/// Tests a word's sign, returning the flags a TEST opcode would set.
pub fn test(a: &TritWord) -> Flags {
    flags_of(a, false)
}

/// Shift left by `n` trits (sign extended with zero); `n <= 0` is the
/// identity.
pub fn tshl(a: &TritWord, n: i64) -> TritWord {
    if n <= 0 {
        return a.clone();
    }
    let len = a.len();
    let mut result = TritWord::zero(len);
    for i in 0..len {
        let src = i as i64 - n;
        if src >= 0 && (src as usize) < len {
            result.set(i, a.get(src as usize));
        }
    }
    result
}

/// Shift right by `n` trits; `n <= 0` is the identity.
pub fn tshr(a: &TritWord, n: i64) -> TritWord {
    if n <= 0 {
        return a.clone();
    }
    let len = a.len();
    let mut result = TritWord::zero(len);
    for i in 0..len {
        let src = i as i64 + n;
        if src >= 0 && (src as usize) < len {
            result.set(i, a.get(src as usize));
        }
    }
    result
}

pub fn rotl(a: &TritWord, n: i64) -> TritWord {
    let len = a.len();
    if len == 0 {
        return a.clone();
    }
    let shift = n.rem_euclid(len as i64) as usize;
    let mut result = TritWord::zero(len);
    for i in 0..len {
        let src = (i + len - shift) % len;
        result.set(i, a.get(src));
    }
    result
}

pub fn rotr(a: &TritWord, n: i64) -> TritWord {
    rotl(a, -n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(v: i64) -> TritWord {
        TritWord::from_decimal(v, 9).unwrap()
    }

    #[test]
    fn add_matches_decimal() {
        let (r, _) = add(&w(5), &w(8));
        assert_eq!(r.to_decimal(), 13);
    }

    #[test]
    fn sub_matches_decimal() {
        let (r, _) = sub(&w(5), &w(8));
        assert_eq!(r.to_decimal(), -3);
    }

    #[test]
    fn mul_by_zero_is_zero() {
        let (r, _) = mul(&w(0), &w(42));
        assert!(r.is_zero());
    }

    #[test]
    fn div_small_dividend_returns_zero_quotient() {
        let (q, r) = div(&w(2), &w(5), None).unwrap();
        assert_eq!(q.to_decimal(), 0);
        assert_eq!(r.to_decimal(), 2);
    }

    #[test]
    fn div_by_zero_errors() {
        assert!(div(&w(5), &w(0), Some(10)).is_err());
    }

    #[test]
    fn div_remainder_bounded_by_half_divisor() {
        let (q, r) = div(&w(20), &w(6), None).unwrap();
        assert_eq!(q.to_decimal() * 6 + r.to_decimal(), 20);
        assert!(2 * r.to_decimal().abs() <= 6);
    }

    #[test]
    fn shift_with_nonpositive_n_is_identity() {
        let a = w(5);
        assert_eq!(tshl(&a, 0), a);
        assert_eq!(tshr(&a, -1), a);
    }

    #[test]
    fn cmp_reports_three_way() {
        assert_eq!(cmp(&w(1), &w(2)), Trit::NEGATIVE);
        assert_eq!(cmp(&w(2), &w(2)), Trit::NEUTRAL);
        assert_eq!(cmp(&w(3), &w(2)), Trit::POSITIVE);
    }
}
