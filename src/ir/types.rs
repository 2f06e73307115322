//! IR types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest bit vector the runtime represents (one machine word per leaf)
pub const MAX_BITS_WIDTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Bits(usize),
    Tuple(Vec<Type>),
    Array { element: Box<Type>, size: usize },
    Token,
}

impl Type {
    pub fn bits(width: usize) -> Self {
        Type::Bits(width)
    }

    pub fn tuple(elements: Vec<Type>) -> Self {
        Type::Tuple(elements)
    }

    pub fn array(element: Type, size: usize) -> Self {
        Type::Array { element: Box::new(element), size }
    }

    pub fn is_bits(&self) -> bool {
        matches!(self, Type::Bits(_))
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Type::Token)
    }

    pub fn bit_width(&self) -> Option<usize> {
        match self {
            Type::Bits(w) => Some(*w),
            _ => None,
        }
    }

    /// Number of bits leaves when the type is flattened into words.
    /// Tokens occupy no words.
    pub fn leaf_count(&self) -> usize {
        match self {
            Type::Bits(_) => 1,
            Type::Token => 0,
            Type::Tuple(elements) => elements.iter().map(Type::leaf_count).sum(),
            Type::Array { element, size } => element.leaf_count() * size,
        }
    }

    /// Bit widths of every leaf in flattened order.
    pub fn leaf_widths(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.leaf_count());
        self.collect_leaf_widths(&mut out);
        out
    }

    fn collect_leaf_widths(&self, out: &mut Vec<usize>) {
        match self {
            Type::Bits(w) => out.push(*w),
            Type::Token => {}
            Type::Tuple(elements) => {
                for e in elements {
                    e.collect_leaf_widths(out);
                }
            }
            Type::Array { element, size } => {
                for _ in 0..*size {
                    element.collect_leaf_widths(out);
                }
            }
        }
    }

    /// Word offset of tuple element `index` within the flattened layout.
    pub fn tuple_leaf_offset(&self, index: usize) -> Option<usize> {
        match self {
            Type::Tuple(elements) if index < elements.len() => {
                Some(elements[..index].iter().map(Type::leaf_count).sum())
            }
            _ => None,
        }
    }

    /// Widest bits leaf contained in the type, if any.
    pub fn max_leaf_width(&self) -> Option<usize> {
        match self {
            Type::Bits(w) => Some(*w),
            Type::Token => None,
            Type::Tuple(elements) => elements.iter().filter_map(Type::max_leaf_width).max(),
            Type::Array { element, .. } => element.max_leaf_width(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bits(w) => write!(f, "bits[{}]", w),
            Type::Token => write!(f, "token"),
            Type::Tuple(elements) => {
                write!(f, "(")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Type::Array { element, size } => write!(f, "{}[{}]", element, size),
        }
    }
}
