//! Scalar bit-vector kernels
//!
//! Operands are payload words already masked to their width; results are
//! masked to the result width. Both engines evaluate arithmetic through
//! these functions.

use crate::ir::value::{compute_mask, sign_extend};

#[inline(always)]
pub fn not(a: u64, width: usize) -> u64 {
    !a & compute_mask(width)
}

#[inline(always)]
pub fn neg(a: u64, width: usize) -> u64 {
    a.wrapping_neg() & compute_mask(width)
}

#[inline(always)]
pub fn and_reduce(a: u64, width: usize) -> u64 {
    (a == compute_mask(width)) as u64
}

#[inline(always)]
pub fn or_reduce(a: u64) -> u64 {
    (a != 0) as u64
}

#[inline(always)]
pub fn xor_reduce(a: u64) -> u64 {
    (a.count_ones() & 1) as u64
}

#[inline(always)]
pub fn add(a: u64, b: u64, width: usize) -> u64 {
    a.wrapping_add(b) & compute_mask(width)
}

#[inline(always)]
pub fn sub(a: u64, b: u64, width: usize) -> u64 {
    a.wrapping_sub(b) & compute_mask(width)
}

/// Low `out_width` bits of the product. Operand widths may differ.
#[inline(always)]
pub fn umul(a: u64, b: u64, out_width: usize) -> u64 {
    a.wrapping_mul(b) & compute_mask(out_width)
}

#[inline(always)]
pub fn smul(a: u64, a_width: usize, b: u64, b_width: usize, out_width: usize) -> u64 {
    let product = sign_extend(a, a_width).wrapping_mul(sign_extend(b, b_width));
    product as u64 & compute_mask(out_width)
}

/// Division by zero yields all ones.
#[inline(always)]
pub fn udiv(a: u64, b: u64, width: usize) -> u64 {
    if b == 0 { compute_mask(width) } else { a / b }
}

/// Truncates toward zero. Division by zero saturates toward the sign of
/// the dividend.
pub fn sdiv(a: u64, b: u64, width: usize) -> u64 {
    if width == 0 {
        return 0;
    }
    let mask = compute_mask(width);
    let lhs = sign_extend(a, width);
    let rhs = sign_extend(b, width);
    if rhs == 0 {
        let max = mask >> 1;
        return if lhs < 0 { (max + 1) & mask } else { max };
    }
    lhs.wrapping_div(rhs) as u64 & mask
}

#[inline(always)]
pub fn umod(a: u64, b: u64) -> u64 {
    if b == 0 { 0 } else { a % b }
}

/// Result takes the sign of the dividend; modulus by zero is zero.
pub fn smod(a: u64, b: u64, width: usize) -> u64 {
    let rhs = sign_extend(b, width);
    if rhs == 0 {
        return 0;
    }
    sign_extend(a, width).wrapping_rem(rhs) as u64 & compute_mask(width)
}

#[inline(always)]
pub fn shll(a: u64, amount: u64, width: usize) -> u64 {
    if amount >= width as u64 { 0 } else { (a << amount) & compute_mask(width) }
}

#[inline(always)]
pub fn shrl(a: u64, amount: u64, width: usize) -> u64 {
    if amount >= width as u64 { 0 } else { a >> amount }
}

pub fn shra(a: u64, amount: u64, width: usize) -> u64 {
    let mask = compute_mask(width);
    let value = sign_extend(a, width);
    if amount >= width as u64 {
        return if value < 0 { mask } else { 0 };
    }
    (value >> amount) as u64 & mask
}

#[inline(always)]
pub fn slt(a: u64, b: u64, width: usize) -> bool {
    sign_extend(a, width) < sign_extend(b, width)
}

/// Shift `acc` left by `width` and append `value` in the low bits.
#[inline(always)]
pub fn concat_accum(acc: u64, value: u64, width: usize) -> u64 {
    let shifted = if width >= 64 { 0 } else { acc << width };
    shifted | value
}

#[inline(always)]
pub fn bit_slice(a: u64, start: usize, width: usize) -> u64 {
    if start >= 64 { 0 } else { (a >> start) & compute_mask(width) }
}

#[inline(always)]
pub fn sign_ext(a: u64, from_width: usize, to_width: usize) -> u64 {
    sign_extend(a, from_width) as u64 & compute_mask(to_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_edge_cases() {
        assert_eq!(udiv(7, 0, 8), 0xff);
        assert_eq!(sdiv(5, 0, 8), 0x7f);
        assert_eq!(sdiv(0xfb, 0, 8), 0x80);
        assert_eq!(sdiv(0x80, 0xff, 8), 0x80);
        // -7 / 2 == -3
        assert_eq!(sdiv(0xf9, 2, 8), 0xfd);
        assert_eq!(umod(7, 0), 0);
        assert_eq!(smod(0xf9, 0, 8), 0);
        // -7 % 2 == -1
        assert_eq!(smod(0xf9, 2, 8), 0xff);
        assert_eq!(sdiv(1, 0, 64), i64::MAX as u64);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(shll(1, 3, 8), 8);
        assert_eq!(shll(1, 8, 8), 0);
        assert_eq!(shrl(0x80, 7, 8), 1);
        assert_eq!(shrl(0x80, 9, 8), 0);
        assert_eq!(shra(0x80, 1, 8), 0xc0);
        assert_eq!(shra(0x80, 100, 8), 0xff);
        assert_eq!(shra(0x40, 100, 8), 0);
    }

    #[test]
    fn test_multiply_truncates() {
        assert_eq!(umul(0xff, 0xff, 8), 0x01);
        assert_eq!(umul(0xff, 0xff, 16), 0xfe01);
        // -1 * 3 == -3
        assert_eq!(smul(0xf, 4, 3, 4, 8), 0xfd);
    }

    #[test]
    fn test_bit_manipulation() {
        assert_eq!(concat_accum(concat_accum(0, 0b1, 1), 0b01, 2), 0b101);
        assert_eq!(bit_slice(0xabcd, 4, 8), 0xbc);
        assert_eq!(sign_ext(0x8, 4, 8), 0xf8);
        assert_eq!(and_reduce(0xf, 4), 1);
        assert_eq!(xor_reduce(0b111), 1);
        assert_eq!(neg(1, 4), 0xf);
        assert!(slt(0xf, 0x1, 4));
    }
}
