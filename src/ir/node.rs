//! Node arena
//!
//! A proc's instruction graph is a `Vec<Node>` addressed by [`NodeId`].
//! Operands always precede their users, so arena order is a valid
//! topological order and evaluators walk it front to back.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::Type;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Opcode plus its non-operand attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    TokenParam,
    StateParam { index: usize },
    Literal { value: Value },

    Identity,
    Not,
    Neg,
    AndReduce,
    OrReduce,
    XorReduce,

    And,
    Or,
    Xor,
    Nand,
    Nor,

    Add,
    Sub,
    UMul,
    SMul,
    UDiv,
    SDiv,
    UMod,
    SMod,
    Shll,
    Shrl,
    Shra,

    Eq,
    Ne,
    ULt,
    ULe,
    UGt,
    UGe,
    SLt,
    SLe,
    SGt,
    SGe,

    Concat,
    BitSlice { start: usize, width: usize },
    ZeroExt { new_bit_count: usize },
    SignExt { new_bit_count: usize },

    Tuple,
    TupleIndex { index: usize },
    /// operands: elements
    Array,
    /// operands: array, indices...
    ArrayIndex,
    /// operands: array, value, indices...
    ArrayUpdate,
    /// operands: selector, cases..., [default]
    Sel { has_default: bool },

    AfterAll,
    /// operands: token, data, [predicate]
    Send { channel: String, has_predicate: bool },
    /// operands: token, [predicate]
    Receive { channel: String, blocking: bool, has_predicate: bool },
}

impl Op {
    /// Mnemonic used in the textual IR.
    pub fn name(&self) -> &'static str {
        match self {
            Op::TokenParam | Op::StateParam { .. } => "param",
            Op::Literal { .. } => "literal",
            Op::Identity => "identity",
            Op::Not => "not",
            Op::Neg => "neg",
            Op::AndReduce => "and_reduce",
            Op::OrReduce => "or_reduce",
            Op::XorReduce => "xor_reduce",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Nand => "nand",
            Op::Nor => "nor",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::UMul => "umul",
            Op::SMul => "smul",
            Op::UDiv => "udiv",
            Op::SDiv => "sdiv",
            Op::UMod => "umod",
            Op::SMod => "smod",
            Op::Shll => "shll",
            Op::Shrl => "shrl",
            Op::Shra => "shra",
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::ULt => "ult",
            Op::ULe => "ule",
            Op::UGt => "ugt",
            Op::UGe => "uge",
            Op::SLt => "slt",
            Op::SLe => "sle",
            Op::SGt => "sgt",
            Op::SGe => "sge",
            Op::Concat => "concat",
            Op::BitSlice { .. } => "bit_slice",
            Op::ZeroExt { .. } => "zero_ext",
            Op::SignExt { .. } => "sign_ext",
            Op::Tuple => "tuple",
            Op::TupleIndex { .. } => "tuple_index",
            Op::Array => "array",
            Op::ArrayIndex => "array_index",
            Op::ArrayUpdate => "array_update",
            Op::Sel { .. } => "sel",
            Op::AfterAll => "after_all",
            Op::Send { .. } => "send",
            Op::Receive { .. } => "receive",
        }
    }

    /// Opcodes with no attributes, keyed by mnemonic.
    pub fn from_simple_name(name: &str) -> Option<Op> {
        let op = match name {
            "identity" => Op::Identity,
            "not" => Op::Not,
            "neg" => Op::Neg,
            "and_reduce" => Op::AndReduce,
            "or_reduce" => Op::OrReduce,
            "xor_reduce" => Op::XorReduce,
            "and" => Op::And,
            "or" => Op::Or,
            "xor" => Op::Xor,
            "nand" => Op::Nand,
            "nor" => Op::Nor,
            "add" => Op::Add,
            "sub" => Op::Sub,
            "umul" => Op::UMul,
            "smul" => Op::SMul,
            "udiv" => Op::UDiv,
            "sdiv" => Op::SDiv,
            "umod" => Op::UMod,
            "smod" => Op::SMod,
            "shll" => Op::Shll,
            "shrl" => Op::Shrl,
            "shra" => Op::Shra,
            "eq" => Op::Eq,
            "ne" => Op::Ne,
            "ult" => Op::ULt,
            "ule" => Op::ULe,
            "ugt" => Op::UGt,
            "uge" => Op::UGe,
            "slt" => Op::SLt,
            "sle" => Op::SLe,
            "sgt" => Op::SGt,
            "sge" => Op::SGe,
            "concat" => Op::Concat,
            "tuple" => Op::Tuple,
            "array" => Op::Array,
            "array_index" => Op::ArrayIndex,
            "array_update" => Op::ArrayUpdate,
            "after_all" => Op::AfterAll,
            _ => return None,
        };
        Some(op)
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Op::TokenParam | Op::StateParam { .. })
    }

    pub fn is_side_effecting(&self) -> bool {
        matches!(self, Op::Send { .. } | Op::Receive { .. })
    }

    /// Channel referenced by a send/receive.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Op::Send { channel, .. } | Op::Receive { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

/// Source location `(file_number, line, col)` carried by a node's `pos=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePos {
    pub file: u64,
    pub line: u64,
    pub col: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub ty: Type,
    pub op: Op,
    #[serde(default)]
    pub operands: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pos: Vec<SourcePos>,
}

impl Node {
    pub fn operand(&self, i: usize) -> NodeId {
        self.operands[i]
    }

    /// Predicate operand of a predicated send/receive.
    pub fn predicate(&self) -> Option<NodeId> {
        match &self.op {
            Op::Send { has_predicate: true, .. } => self.operands.get(2).copied(),
            Op::Receive { has_predicate: true, .. } => self.operands.get(1).copied(),
            _ => None,
        }
    }

    /// Default operand of a `sel`.
    pub fn sel_default(&self) -> Option<NodeId> {
        match &self.op {
            Op::Sel { has_default: true } => self.operands.last().copied(),
            _ => None,
        }
    }

    /// Case operands of a `sel`.
    pub fn sel_cases(&self) -> &[NodeId] {
        match &self.op {
            Op::Sel { has_default } => {
                let end = self.operands.len() - usize::from(*has_default);
                &self.operands[1..end]
            }
            _ => &[],
        }
    }
}
