//! Result-type inference per opcode
//!
//! Shared by the builder (to assign node types) and the verifier (to check
//! the types declared in parsed IR).

use super::node::Op;
use super::package::Channel;
use super::types::{Type, MAX_BITS_WIDTH};
use crate::error::{Error, Result};

fn fail<T>(op: &Op, message: impl Into<String>) -> Result<T> {
    Err(Error::Verify(format!("{}: {}", op.name(), message.into())))
}

fn expect_count(op: &Op, operands: &[&Type], count: usize) -> Result<()> {
    if operands.len() != count {
        return fail(op, format!("expected {} operands, got {}", count, operands.len()));
    }
    Ok(())
}

fn expect_bits(op: &Op, ty: &Type) -> Result<usize> {
    match ty {
        Type::Bits(w) => Ok(*w),
        other => fail(op, format!("expected bits operand, got {}", other)),
    }
}

fn expect_same_bits(op: &Op, operands: &[&Type]) -> Result<usize> {
    let width = expect_bits(op, operands[0])?;
    for ty in &operands[1..] {
        if expect_bits(op, ty)? != width {
            return fail(op, format!("operand widths differ: bits[{}] vs {}", width, ty));
        }
    }
    Ok(width)
}

fn bits_result(op: &Op, width: usize) -> Result<Type> {
    if width > MAX_BITS_WIDTH {
        return Err(Error::Unsupported(format!(
            "{}: bits[{}] exceeds the {}-bit limit",
            op.name(),
            width,
            MAX_BITS_WIDTH
        )));
    }
    Ok(Type::Bits(width))
}

/// Peel one array dimension per index operand.
fn index_array_type(op: &Op, array: &Type, indices: &[&Type]) -> Result<Type> {
    let mut ty = array.clone();
    for idx in indices {
        expect_bits(op, idx)?;
        ty = match ty {
            Type::Array { element, .. } => *element,
            other => return fail(op, format!("too many indices for type {}", other)),
        };
    }
    Ok(ty)
}

/// Type produced by `op` applied to operands of the given types.
///
/// `channel` must be supplied for send/receive. `umul`/`smul` default their
/// result width to the lhs width; parsed IR may declare any width.
pub fn infer_type(op: &Op, operands: &[&Type], channel: Option<&Channel>) -> Result<Type> {
    match op {
        Op::TokenParam => Ok(Type::Token),
        Op::StateParam { .. } => fail(op, "state param types come from the initial value"),
        Op::Literal { value } => Ok(value.ty()),

        Op::Identity => {
            expect_count(op, operands, 1)?;
            Ok(operands[0].clone())
        }
        Op::Not | Op::Neg => {
            expect_count(op, operands, 1)?;
            let w = expect_bits(op, operands[0])?;
            bits_result(op, w)
        }
        Op::AndReduce | Op::OrReduce | Op::XorReduce => {
            expect_count(op, operands, 1)?;
            expect_bits(op, operands[0])?;
            Ok(Type::Bits(1))
        }
        Op::And | Op::Or | Op::Xor | Op::Nand | Op::Nor => {
            if operands.is_empty() {
                return fail(op, "expected at least one operand");
            }
            let w = expect_same_bits(op, operands)?;
            bits_result(op, w)
        }
        Op::Add | Op::Sub | Op::UDiv | Op::SDiv | Op::UMod | Op::SMod => {
            expect_count(op, operands, 2)?;
            let w = expect_same_bits(op, operands)?;
            bits_result(op, w)
        }
        Op::UMul | Op::SMul => {
            expect_count(op, operands, 2)?;
            let w = expect_bits(op, operands[0])?;
            expect_bits(op, operands[1])?;
            bits_result(op, w)
        }
        Op::Shll | Op::Shrl | Op::Shra => {
            expect_count(op, operands, 2)?;
            let w = expect_bits(op, operands[0])?;
            expect_bits(op, operands[1])?;
            bits_result(op, w)
        }
        Op::Eq | Op::Ne => {
            expect_count(op, operands, 2)?;
            if operands[0] != operands[1] {
                return fail(op, format!("operand types differ: {} vs {}", operands[0], operands[1]));
            }
            Ok(Type::Bits(1))
        }
        Op::ULt | Op::ULe | Op::UGt | Op::UGe | Op::SLt | Op::SLe | Op::SGt | Op::SGe => {
            expect_count(op, operands, 2)?;
            expect_same_bits(op, operands)?;
            Ok(Type::Bits(1))
        }
        Op::Concat => {
            let mut total = 0;
            for ty in operands {
                total += expect_bits(op, ty)?;
            }
            bits_result(op, total)
        }
        Op::BitSlice { start, width } => {
            expect_count(op, operands, 1)?;
            let w = expect_bits(op, operands[0])?;
            if start + width > w {
                return fail(op, format!("slice [{}, {}) out of range for bits[{}]", start, start + width, w));
            }
            Ok(Type::Bits(*width))
        }
        Op::ZeroExt { new_bit_count } | Op::SignExt { new_bit_count } => {
            expect_count(op, operands, 1)?;
            let w = expect_bits(op, operands[0])?;
            if *new_bit_count < w {
                return fail(op, format!("cannot extend bits[{}] to {} bits", w, new_bit_count));
            }
            bits_result(op, *new_bit_count)
        }

        Op::Tuple => Ok(Type::Tuple(operands.iter().map(|t| (*t).clone()).collect())),
        Op::TupleIndex { index } => {
            expect_count(op, operands, 1)?;
            match operands[0] {
                Type::Tuple(elements) if *index < elements.len() => Ok(elements[*index].clone()),
                Type::Tuple(elements) => {
                    fail(op, format!("index {} out of range for {}-tuple", index, elements.len()))
                }
                other => fail(op, format!("expected tuple operand, got {}", other)),
            }
        }
        Op::Array => {
            let first = match operands.first() {
                Some(t) => *t,
                None => return fail(op, "arrays must have at least one element"),
            };
            if operands.iter().any(|t| *t != first) {
                return fail(op, "array elements must share one type");
            }
            Ok(Type::array(first.clone(), operands.len()))
        }
        Op::ArrayIndex => {
            if operands.is_empty() {
                return fail(op, "expected an array operand");
            }
            index_array_type(op, operands[0], &operands[1..])
        }
        Op::ArrayUpdate => {
            if operands.len() < 2 {
                return fail(op, "expected array and value operands");
            }
            let element = index_array_type(op, operands[0], &operands[2..])?;
            if &element != operands[1] {
                return fail(op, format!("update value {} does not match element {}", operands[1], element));
            }
            Ok(operands[0].clone())
        }
        Op::Sel { has_default } => {
            let min = 2 + usize::from(*has_default);
            if operands.len() < min {
                return fail(op, "expected a selector and at least one case");
            }
            let sel_width = expect_bits(op, operands[0])?;
            let choices = &operands[1..];
            let cases = choices.len() - usize::from(*has_default);
            let result = choices[0];
            if choices.iter().any(|t| *t != result) {
                return fail(op, "cases and default must share one type");
            }
            let reachable = if sel_width >= 64 { u64::MAX } else { 1u64 << sel_width };
            let cases_u = cases as u64;
            if cases_u > reachable {
                return fail(op, format!("{} cases exceed selector bits[{}]", cases, sel_width));
            }
            if *has_default && cases_u == reachable {
                return fail(op, "default is unreachable");
            }
            if !*has_default && cases_u < reachable {
                return fail(op, "missing default for unreachable selector values");
            }
            Ok(result.clone())
        }

        Op::AfterAll => {
            if operands.iter().any(|t| !t.is_token()) {
                return fail(op, "operands must be tokens");
            }
            Ok(Type::Token)
        }
        Op::Send { channel: name, has_predicate } => {
            let ch = channel.ok_or_else(|| Error::Verify(format!("send: unknown channel '{}'", name)))?;
            expect_count(op, operands, 2 + usize::from(*has_predicate))?;
            if !operands[0].is_token() {
                return fail(op, "first operand must be a token");
            }
            if operands[1] != &ch.ty {
                return fail(op, format!("data {} does not match channel '{}' type {}", operands[1], ch.name, ch.ty));
            }
            if *has_predicate && operands[2] != &Type::Bits(1) {
                return fail(op, "predicate must be bits[1]");
            }
            if !ch.ops.supports_send() {
                return fail(op, format!("channel '{}' does not support send", ch.name));
            }
            Ok(Type::Token)
        }
        Op::Receive { channel: name, blocking, has_predicate } => {
            let ch = channel.ok_or_else(|| Error::Verify(format!("receive: unknown channel '{}'", name)))?;
            expect_count(op, operands, 1 + usize::from(*has_predicate))?;
            if !operands[0].is_token() {
                return fail(op, "first operand must be a token");
            }
            if *has_predicate && operands[1] != &Type::Bits(1) {
                return fail(op, "predicate must be bits[1]");
            }
            if !ch.ops.supports_receive() {
                return fail(op, format!("channel '{}' does not support receive", ch.name));
            }
            let mut elements = vec![Type::Token, ch.ty.clone()];
            if !*blocking {
                elements.push(Type::Bits(1));
            }
            Ok(Type::Tuple(elements))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::package::ChannelOps;

    #[test]
    fn test_arithmetic_and_compare() {
        let b32 = Type::bits(32);
        assert_eq!(infer_type(&Op::Add, &[&b32, &b32], None).unwrap(), b32);
        assert_eq!(infer_type(&Op::ULt, &[&b32, &b32], None).unwrap(), Type::bits(1));
        assert!(infer_type(&Op::Add, &[&b32, &Type::bits(8)], None).is_err());
        assert_eq!(
            infer_type(&Op::Concat, &[&b32, &Type::bits(8)], None).unwrap(),
            Type::bits(40)
        );
    }

    #[test]
    fn test_wide_results_are_unsupported() {
        let b40 = Type::bits(40);
        let err = infer_type(&Op::Concat, &[&b40, &b40], None).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_sel_default_rules() {
        let p = Type::bits(1);
        let v = Type::bits(8);
        assert!(infer_type(&Op::Sel { has_default: false }, &[&p, &v, &v], None).is_ok());
        assert!(infer_type(&Op::Sel { has_default: true }, &[&p, &v, &v, &v], None).is_err());
        let p2 = Type::bits(2);
        assert!(infer_type(&Op::Sel { has_default: false }, &[&p2, &v, &v], None).is_err());
        assert!(infer_type(&Op::Sel { has_default: true }, &[&p2, &v, &v, &v], None).is_ok());
    }

    #[test]
    fn test_receive_result_shapes() {
        let ch = Channel::streaming("in", 0, ChannelOps::ReceiveOnly, Type::bits(32));
        let blocking = Op::Receive { channel: "in".into(), blocking: true, has_predicate: false };
        assert_eq!(
            infer_type(&blocking, &[&Type::Token], Some(&ch)).unwrap(),
            Type::tuple(vec![Type::Token, Type::bits(32)])
        );
        let non_blocking = Op::Receive { channel: "in".into(), blocking: false, has_predicate: false };
        assert_eq!(
            infer_type(&non_blocking, &[&Type::Token], Some(&ch)).unwrap(),
            Type::tuple(vec![Type::Token, Type::bits(32), Type::bits(1)])
        );
        let send = Op::Send { channel: "in".into(), has_predicate: false };
        assert!(infer_type(&send, &[&Type::Token, &Type::bits(32)], Some(&ch)).is_err());
    }
}
