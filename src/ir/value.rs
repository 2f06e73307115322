//! IR values and fixed-width bit-vector arithmetic
//!
//! Every bits value keeps its payload masked to its width, so equality of
//! two values is plain structural equality.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::Type;
use crate::error::{Error, Result};

#[inline(always)]
pub fn compute_mask(width: usize) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}

/// Interpret the low `width` bits of `value` as a two's complement number.
#[inline(always)]
pub fn sign_extend(value: u64, width: usize) -> i64 {
    if width == 0 {
        0
    } else if width >= 64 {
        value as i64
    } else {
        let shift = 64 - width as u32;
        ((value << shift) as i64) >> shift
    }
}

/// Fixed-width bit vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bits {
    width: usize,
    value: u64,
}

impl Bits {
    pub fn new(width: usize, value: u64) -> Self {
        Self { width, value: value & compute_mask(width) }
    }

    /// Two's complement encoding of a signed value.
    pub fn from_signed(width: usize, value: i64) -> Self {
        Self::new(width, value as u64)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn signed_value(&self) -> i64 {
        sign_extend(self.value, self.width)
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bits(Bits),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
    Token,
}

impl Value {
    pub fn ubits(width: usize, value: u64) -> Self {
        Value::Bits(Bits::new(width, value))
    }

    pub fn sbits(width: usize, value: i64) -> Self {
        Value::Bits(Bits::from_signed(width, value))
    }

    pub fn bool(value: bool) -> Self {
        Value::ubits(1, value as u64)
    }

    pub fn tuple(elements: Vec<Value>) -> Self {
        Value::Tuple(elements)
    }

    pub fn unit() -> Self {
        Value::Tuple(Vec::new())
    }

    /// Arrays must be non-empty and homogeneous.
    pub fn array(elements: Vec<Value>) -> Result<Self> {
        let first = elements
            .first()
            .ok_or_else(|| Error::InvalidArgument("arrays must have at least one element".into()))?;
        let ty = first.ty();
        for e in &elements[1..] {
            if !e.conforms_to(&ty) {
                return Err(Error::type_mismatch("array element", &ty, e.ty()));
            }
        }
        Ok(Value::Array(elements))
    }

    /// Type-appropriate zero placeholder.
    pub fn zero(ty: &Type) -> Self {
        match ty {
            Type::Bits(w) => Value::ubits(*w, 0),
            Type::Token => Value::Token,
            Type::Tuple(elements) => Value::Tuple(elements.iter().map(Value::zero).collect()),
            Type::Array { element, size } => Value::Array(vec![Value::zero(element); *size]),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Bits(b) => Type::Bits(b.width),
            Value::Token => Type::Token,
            Value::Tuple(elements) => Type::Tuple(elements.iter().map(Value::ty).collect()),
            Value::Array(elements) => {
                let element = elements.first().map(Value::ty).unwrap_or(Type::Bits(0));
                Type::array(element, elements.len())
            }
        }
    }

    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Bits(b), Type::Bits(w)) => b.width == *w,
            (Value::Token, Type::Token) => true,
            (Value::Tuple(vs), Type::Tuple(ts)) => {
                vs.len() == ts.len() && vs.iter().zip(ts).all(|(v, t)| v.conforms_to(t))
            }
            (Value::Array(vs), Type::Array { element, size }) => {
                vs.len() == *size && vs.iter().all(|v| v.conforms_to(element))
            }
            _ => false,
        }
    }

    pub fn as_bits(&self) -> Option<&Bits> {
        match self {
            Value::Bits(b) => Some(b),
            _ => None,
        }
    }

    /// Payload of a bits value, for callers that know the type.
    pub fn bits_value(&self) -> Option<u64> {
        self.as_bits().map(Bits::value)
    }

    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(es) | Value::Array(es) => Some(es),
            _ => None,
        }
    }

    /// Append the bits leaves to `out` in flattened order.
    pub fn flatten_into(&self, out: &mut Vec<u64>) {
        match self {
            Value::Bits(b) => out.push(b.value),
            Value::Token => {}
            Value::Tuple(es) | Value::Array(es) => {
                for e in es {
                    e.flatten_into(out);
                }
            }
        }
    }

    /// Rebuild a value of type `ty` from flattened words.
    /// Returns the value and the number of words consumed.
    pub fn unflatten(ty: &Type, words: &[u64]) -> (Value, usize) {
        match ty {
            Type::Bits(w) => (Value::ubits(*w, words.first().copied().unwrap_or(0)), 1),
            Type::Token => (Value::Token, 0),
            Type::Tuple(elements) => {
                let mut used = 0;
                let mut out = Vec::with_capacity(elements.len());
                for e in elements {
                    let (v, n) = Value::unflatten(e, &words[used.min(words.len())..]);
                    out.push(v);
                    used += n;
                }
                (Value::Tuple(out), used)
            }
            Type::Array { element, size } => {
                let mut used = 0;
                let mut out = Vec::with_capacity(*size);
                for _ in 0..*size {
                    let (v, n) = Value::unflatten(element, &words[used.min(words.len())..]);
                    out.push(v);
                    used += n;
                }
                (Value::Array(out), used)
            }
        }
    }

    /// Untyped rendering used for IR literals: `5`, `(1, 2)`, `[3, 4]`, `token`.
    pub fn to_untyped_string(&self) -> String {
        let mut s = String::new();
        self.write_untyped(&mut s);
        s
    }

    fn write_untyped(&self, out: &mut String) {
        match self {
            Value::Bits(b) => out.push_str(&b.value.to_string()),
            Value::Token => out.push_str("token"),
            Value::Tuple(es) => {
                out.push('(');
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    e.write_untyped(out);
                }
                out.push(')');
            }
            Value::Array(es) => {
                out.push('[');
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    e.write_untyped(out);
                }
                out.push(']');
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bits(b) => write!(f, "bits[{}]:{}", b.width, b.value),
            Value::Token => write!(f, "token"),
            Value::Tuple(es) => {
                write!(f, "(")?;
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Value::Array(es) => {
                write!(f, "[")?;
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_masked() {
        assert_eq!(Bits::new(8, 0x1ff).value(), 0xff);
        assert_eq!(Bits::from_signed(32, -1).value(), 0xffff_ffff);
        assert_eq!(Bits::from_signed(4, -3).signed_value(), -3);
        assert_eq!(Bits::new(64, u64::MAX).signed_value(), -1);
        assert_eq!(Bits::new(0, 5).value(), 0);
    }

    #[test]
    fn test_zero_and_conformance() {
        let ty = Type::tuple(vec![Type::Token, Type::bits(32), Type::bits(1)]);
        let zero = Value::zero(&ty);
        assert_eq!(
            zero,
            Value::tuple(vec![Value::Token, Value::ubits(32, 0), Value::bool(false)])
        );
        assert!(zero.conforms_to(&ty));
        assert!(!Value::ubits(8, 1).conforms_to(&Type::bits(32)));
        assert_eq!(zero.ty(), ty);
    }

    #[test]
    fn test_array_rejects_mixed_types() {
        assert!(Value::array(vec![Value::ubits(8, 1), Value::ubits(4, 1)]).is_err());
        assert!(Value::array(vec![]).is_err());
    }

    #[test]
    fn test_flatten_unflatten() {
        let v = Value::tuple(vec![
            Value::Token,
            Value::Array(vec![Value::ubits(8, 3), Value::ubits(8, 4)]),
            Value::bool(true),
        ]);
        let mut words = Vec::new();
        v.flatten_into(&mut words);
        assert_eq!(words, vec![3, 4, 1]);
        let (back, used) = Value::unflatten(&v.ty(), &words);
        assert_eq!(used, 3);
        assert_eq!(back, v);
    }

    #[test]
    fn test_renderings() {
        let v = Value::tuple(vec![Value::ubits(32, 1), Value::ubits(8, 42)]);
        assert_eq!(v.to_untyped_string(), "(1, 42)");
        assert_eq!(v.to_string(), "(bits[32]:1, bits[8]:42)");
        assert_eq!(Value::unit().to_untyped_string(), "()");
    }
}
