//! Flat-tape evaluator
//!
//! The proc is lowered once into a linear tape of [`FlatOp`]s with every
//! operand pre-resolved to a word offset. Each node owns a contiguous range
//! of a `Vec<u64>` frame holding its flattened leaves (bits = one word,
//! token = none), so aggregates move as word copies and no [`Value`] is
//! built except at channel boundaries and on state commit.
//!
//! A blocking receive is always a single op, so a blocked iteration resumes
//! by re-executing the tape from that op.

use std::collections::HashMap;
use tracing::trace;

use super::kernels;
use super::{Continuation, EngineKind, ExecutionState, Frame, ProcEvaluator, TickResult};
use crate::error::{Error, Result};
use crate::ir::value::compute_mask;
use crate::ir::{Node, Op, Proc, Type, Value};
use crate::queue::ChannelQueueManager;

/// Flattened operation with all arguments pre-resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatOp {
    pub op_type: u8,
    pub dst: usize,
    pub arg0: u64,
    pub arg1: u64,
    pub arg2: u64,
}

// Operation type constants. Unless noted, arg0/arg1 are source word offsets.
pub const OP_IMM: u8 = 0; // w[dst] = arg0
pub const OP_COPY: u8 = 1; // w[dst..dst+arg2] = w[arg0..arg0+arg2]
pub const OP_NOT: u8 = 2; // arg2 = mask
pub const OP_NEG: u8 = 3; // arg2 = width
pub const OP_REDUCE_AND: u8 = 4; // arg2 = operand width
pub const OP_REDUCE_OR: u8 = 5;
pub const OP_REDUCE_XOR: u8 = 6;
pub const OP_AND_ACC: u8 = 7; // w[dst] &= w[arg0]
pub const OP_OR_ACC: u8 = 8;
pub const OP_XOR_ACC: u8 = 9;
pub const OP_ADD: u8 = 10; // arg2 = width
pub const OP_SUB: u8 = 11;
pub const OP_UMUL: u8 = 12;
pub const OP_SMUL: u8 = 13; // arg2 = packed widths, see pack_widths
pub const OP_UDIV: u8 = 14;
pub const OP_SDIV: u8 = 15;
pub const OP_UMOD: u8 = 16;
pub const OP_SMOD: u8 = 17;
pub const OP_SHLL: u8 = 18;
pub const OP_SHRL: u8 = 19;
pub const OP_SHRA: u8 = 20;
pub const OP_EQ: u8 = 21; // arg2 = operand word count
pub const OP_NE: u8 = 22;
pub const OP_ULT: u8 = 23;
pub const OP_ULE: u8 = 24;
pub const OP_UGT: u8 = 25;
pub const OP_UGE: u8 = 26;
pub const OP_SLT: u8 = 27; // arg2 = operand width
pub const OP_SLE: u8 = 28;
pub const OP_SGT: u8 = 29;
pub const OP_SGE: u8 = 30;
pub const OP_CONCAT_INIT: u8 = 31; // w[dst] = 0
pub const OP_CONCAT_ACCUM: u8 = 32; // arg1 = operand width
pub const OP_SLICE: u8 = 33; // arg1 = start, arg2 = width
pub const OP_SIGN_EXT: u8 = 34; // arg1 = from width, arg2 = to width
pub const OP_CURSOR_SET: u8 = 35; // cursor = arg0, cursor_valid = true
pub const OP_INDEX_CLAMP: u8 = 36; // cursor += min(w[arg0], arg1 - 1) * arg2
pub const OP_INDEX_CHECK: u8 = 37; // as OP_INDEX_CLAMP, but out of range clears cursor_valid
pub const OP_LOAD_CURSOR: u8 = 38; // w[dst..dst+arg2] = w[cursor..cursor+arg2]
pub const OP_STORE_CURSOR: u8 = 39; // if cursor_valid: w[cursor..cursor+arg2] = w[arg0..arg0+arg2]
pub const OP_SEL_BEGIN: u8 = 40; // selector = w[arg0]
pub const OP_SEL_CASE: u8 = 41; // if selector == arg1: copy arg2 words from arg0
pub const OP_SEL_DEFAULT: u8 = 42; // if selector >= arg1: copy arg2 words from arg0
pub const OP_SEND: u8 = 43; // arg0 = data, arg1 = port, arg2 = predicate or NO_PREDICATE
pub const OP_RECV: u8 = 44; // arg0 = port, arg1 = predicate or NO_PREDICATE, arg2 = blocking

pub const NO_PREDICATE: u64 = u64::MAX;

#[inline(always)]
fn pack_widths(lhs: usize, rhs: usize, out: usize) -> u64 {
    (lhs as u64) | ((rhs as u64) << 8) | ((out as u64) << 16)
}

#[inline(always)]
fn unpack_widths(packed: u64) -> (usize, usize, usize) {
    ((packed & 0xff) as usize, ((packed >> 8) & 0xff) as usize, ((packed >> 16) & 0xff) as usize)
}

/// Channel endpoint referenced by send/receive ops
#[derive(Debug, Clone)]
struct Port {
    channel: String,
    ty: Type,
    words: usize,
}

pub struct Compiled {
    proc: Proc,
    offsets: Vec<usize>,
    frame_words: usize,
    tape: Vec<FlatOp>,
    ports: Vec<Port>,
}

// ============================================================================
// Lowering
// ============================================================================

struct Lowering<'a> {
    proc: &'a Proc,
    offsets: Vec<usize>,
    tape: Vec<FlatOp>,
    ports: Vec<Port>,
    port_idx: HashMap<String, usize>,
}

impl<'a> Lowering<'a> {
    fn new(proc: &'a Proc) -> (Self, usize) {
        let mut offsets = Vec::with_capacity(proc.node_count());
        let mut next = 0;
        for node in &proc.nodes {
            offsets.push(next);
            next += node.ty.leaf_count();
        }
        let lowering = Self {
            proc,
            offsets,
            tape: Vec::new(),
            ports: Vec::new(),
            port_idx: HashMap::new(),
        };
        (lowering, next)
    }

    fn emit(&mut self, op_type: u8, dst: usize, arg0: u64, arg1: u64, arg2: u64) {
        self.tape.push(FlatOp { op_type, dst, arg0, arg1, arg2 });
    }

    fn copy(&mut self, dst: usize, src: usize, words: usize) {
        if words > 0 {
            self.emit(OP_COPY, dst, src as u64, 0, words as u64);
        }
    }

    fn slot(&self, node: &Node, i: usize) -> u64 {
        self.offsets[node.operands[i].0] as u64
    }

    fn operand_ty(&self, node: &Node, i: usize) -> &'a Type {
        &self.proc.node(node.operands[i]).ty
    }

    fn operand_width(&self, node: &Node, i: usize) -> Result<usize> {
        self.operand_ty(node, i)
            .bit_width()
            .ok_or_else(|| Error::type_mismatch(format!("operand of '{}'", node.name), "bits", self.operand_ty(node, i)))
    }

    fn port(&mut self, channel: &str, ty: &Type) -> u64 {
        if let Some(&idx) = self.port_idx.get(channel) {
            return idx as u64;
        }
        let idx = self.ports.len();
        self.ports.push(Port { channel: channel.to_string(), ty: ty.clone(), words: ty.leaf_count() });
        self.port_idx.insert(channel.to_string(), idx);
        idx as u64
    }

    fn predicate_slot(&self, node: &Node) -> u64 {
        node.predicate().map(|p| self.offsets[p.0] as u64).unwrap_or(NO_PREDICATE)
    }

    fn lower(&mut self, index: usize, node: &Node) -> Result<()> {
        let dst = self.offsets[index];
        let words = node.ty.leaf_count();
        let width = node.ty.bit_width().unwrap_or(0);

        match &node.op {
            Op::TokenParam | Op::StateParam { .. } | Op::AfterAll => {}
            Op::Literal { value } => {
                let mut leaves = Vec::with_capacity(words);
                value.flatten_into(&mut leaves);
                for (i, leaf) in leaves.into_iter().enumerate() {
                    self.emit(OP_IMM, dst + i, leaf, 0, 0);
                }
            }
            Op::Identity | Op::ZeroExt { .. } => {
                let src = self.slot(node, 0) as usize;
                self.copy(dst, src, words);
            }
            Op::Not => self.emit(OP_NOT, dst, self.slot(node, 0), 0, compute_mask(width)),
            Op::Neg => self.emit(OP_NEG, dst, self.slot(node, 0), 0, width as u64),
            Op::AndReduce => {
                let w = self.operand_width(node, 0)?;
                self.emit(OP_REDUCE_AND, dst, self.slot(node, 0), 0, w as u64);
            }
            Op::OrReduce => self.emit(OP_REDUCE_OR, dst, self.slot(node, 0), 0, 0),
            Op::XorReduce => self.emit(OP_REDUCE_XOR, dst, self.slot(node, 0), 0, 0),
            Op::And | Op::Or | Op::Xor | Op::Nand | Op::Nor => {
                let acc = match node.op {
                    Op::And | Op::Nand => OP_AND_ACC,
                    Op::Or | Op::Nor => OP_OR_ACC,
                    _ => OP_XOR_ACC,
                };
                let first = self.slot(node, 0) as usize;
                self.copy(dst, first, 1);
                for i in 1..node.operands.len() {
                    self.emit(acc, dst, self.slot(node, i), 0, 0);
                }
                if matches!(node.op, Op::Nand | Op::Nor) {
                    self.emit(OP_NOT, dst, dst as u64, 0, compute_mask(width));
                }
            }
            Op::Add | Op::Sub | Op::UMul | Op::UDiv | Op::SDiv | Op::UMod | Op::SMod | Op::Shll | Op::Shrl | Op::Shra => {
                let op_type = match node.op {
                    Op::Add => OP_ADD,
                    Op::Sub => OP_SUB,
                    Op::UMul => OP_UMUL,
                    Op::UDiv => OP_UDIV,
                    Op::SDiv => OP_SDIV,
                    Op::UMod => OP_UMOD,
                    Op::SMod => OP_SMOD,
                    Op::Shll => OP_SHLL,
                    Op::Shrl => OP_SHRL,
                    _ => OP_SHRA,
                };
                self.emit(op_type, dst, self.slot(node, 0), self.slot(node, 1), width as u64);
            }
            Op::SMul => {
                let packed = pack_widths(self.operand_width(node, 0)?, self.operand_width(node, 1)?, width);
                self.emit(OP_SMUL, dst, self.slot(node, 0), self.slot(node, 1), packed);
            }
            Op::Eq | Op::Ne => {
                let op_type = if node.op == Op::Eq { OP_EQ } else { OP_NE };
                let operand_words = self.operand_ty(node, 0).leaf_count() as u64;
                self.emit(op_type, dst, self.slot(node, 0), self.slot(node, 1), operand_words);
            }
            Op::ULt | Op::ULe | Op::UGt | Op::UGe => {
                let op_type = match node.op {
                    Op::ULt => OP_ULT,
                    Op::ULe => OP_ULE,
                    Op::UGt => OP_UGT,
                    _ => OP_UGE,
                };
                self.emit(op_type, dst, self.slot(node, 0), self.slot(node, 1), 0);
            }
            Op::SLt | Op::SLe | Op::SGt | Op::SGe => {
                let op_type = match node.op {
                    Op::SLt => OP_SLT,
                    Op::SLe => OP_SLE,
                    Op::SGt => OP_SGT,
                    _ => OP_SGE,
                };
                let w = self.operand_width(node, 0)?;
                self.emit(op_type, dst, self.slot(node, 0), self.slot(node, 1), w as u64);
            }
            Op::Concat => {
                self.emit(OP_CONCAT_INIT, dst, 0, 0, 0);
                for i in 0..node.operands.len() {
                    let w = self.operand_width(node, i)?;
                    self.emit(OP_CONCAT_ACCUM, dst, self.slot(node, i), w as u64, 0);
                }
            }
            Op::BitSlice { start, width } => {
                self.emit(OP_SLICE, dst, self.slot(node, 0), *start as u64, *width as u64);
            }
            Op::SignExt { new_bit_count } => {
                let from = self.operand_width(node, 0)?;
                self.emit(OP_SIGN_EXT, dst, self.slot(node, 0), from as u64, *new_bit_count as u64);
            }
            Op::Tuple | Op::Array => {
                let mut at = dst;
                for i in 0..node.operands.len() {
                    let n = self.operand_ty(node, i).leaf_count();
                    let src = self.slot(node, i) as usize;
                    self.copy(at, src, n);
                    at += n;
                }
            }
            Op::TupleIndex { index } => {
                let tuple_ty = self.operand_ty(node, 0);
                let offset = tuple_ty
                    .tuple_leaf_offset(*index)
                    .ok_or_else(|| Error::type_mismatch("tuple_index", "tuple", tuple_ty))?;
                let src = self.slot(node, 0) as usize + offset;
                self.copy(dst, src, words);
            }
            Op::ArrayIndex | Op::ArrayUpdate => {
                let update = node.op == Op::ArrayUpdate;
                let first_index = if update { 2 } else { 1 };
                let base = if update {
                    let src = self.slot(node, 0) as usize;
                    self.copy(dst, src, words);
                    dst as u64
                } else {
                    self.slot(node, 0)
                };
                self.emit(OP_CURSOR_SET, 0, base, 0, 0);
                let mut ty = self.operand_ty(node, 0);
                for i in first_index..node.operands.len() {
                    let (element, size) = match ty {
                        Type::Array { element, size } => (element.as_ref(), *size),
                        other => return Err(Error::type_mismatch(format!("'{}' index", node.name), "array", other)),
                    };
                    let op_type = if update { OP_INDEX_CHECK } else { OP_INDEX_CLAMP };
                    self.emit(op_type, 0, self.slot(node, i), size as u64, element.leaf_count() as u64);
                    ty = element;
                }
                if update {
                    let value_words = self.operand_ty(node, 1).leaf_count() as u64;
                    self.emit(OP_STORE_CURSOR, 0, self.slot(node, 1), 0, value_words);
                } else {
                    self.emit(OP_LOAD_CURSOR, dst, 0, 0, words as u64);
                }
            }
            Op::Sel { .. } => {
                let cases = node.sel_cases();
                let fallback = node
                    .sel_default()
                    .or_else(|| cases.last().copied())
                    .ok_or_else(|| Error::Verify(format!("'{}' has no cases", node.name)))?;
                self.emit(OP_SEL_BEGIN, dst, self.slot(node, 0), 0, 0);
                for (i, case) in cases.iter().enumerate() {
                    self.emit(OP_SEL_CASE, dst, self.offsets[case.0] as u64, i as u64, words as u64);
                }
                self.emit(OP_SEL_DEFAULT, dst, self.offsets[fallback.0] as u64, cases.len() as u64, words as u64);
            }
            Op::Send { channel, .. } => {
                let data_ty = self.operand_ty(node, 1);
                let port = self.port(channel, data_ty);
                let pred = self.predicate_slot(node);
                self.emit(OP_SEND, dst, self.slot(node, 1), port, pred);
            }
            Op::Receive { channel, blocking, .. } => {
                let payload_ty = match &node.ty {
                    Type::Tuple(elements) if elements.len() >= 2 => elements[1].clone(),
                    other => return Err(Error::type_mismatch("receive result", "tuple", other)),
                };
                let port = self.port(channel, &payload_ty);
                let pred = self.predicate_slot(node);
                self.emit(OP_RECV, dst, port, pred, *blocking as u64);
            }
        }
        Ok(())
    }
}

impl Compiled {
    pub fn new(proc: Proc) -> Result<Self> {
        let (mut lowering, frame_words) = Lowering::new(&proc);
        for (index, node) in proc.nodes.iter().enumerate() {
            lowering.lower(index, node)?;
        }
        let Lowering { offsets, tape, ports, .. } = lowering;
        Ok(Self { proc, offsets, frame_words, tape, ports })
    }

    pub fn tape(&self) -> &[FlatOp] {
        &self.tape
    }

    pub fn frame_words(&self) -> usize {
        self.frame_words
    }

    fn load_state(&self, words: &mut [u64], state: &[Value]) {
        let mut leaves = Vec::new();
        for (i, value) in state.iter().enumerate() {
            leaves.clear();
            value.flatten_into(&mut leaves);
            let at = self.offsets[self.proc.state_param(i).0];
            words[at..at + leaves.len()].copy_from_slice(&leaves);
        }
    }

    fn commit_state(&self, words: &[u64]) -> Vec<Value> {
        self.proc
            .next_state
            .iter()
            .zip(&self.proc.state)
            .map(|(id, element)| Value::unflatten(&element.init.ty(), &words[self.offsets[id.0]..]).0)
            .collect()
    }
}

#[inline(always)]
fn copy_words(words: &mut [u64], dst: usize, src: usize, count: usize) {
    words.copy_within(src..src + count, dst);
}

impl ProcEvaluator for Compiled {
    fn proc(&self) -> &Proc {
        &self.proc
    }

    fn engine(&self) -> EngineKind {
        EngineKind::Compiled
    }

    fn new_continuation(&self) -> Continuation {
        Continuation::new(self.proc.initial_state(), Frame::Words(vec![0; self.frame_words]))
    }

    fn tick(&self, continuation: &mut Continuation, queues: &ChannelQueueManager) -> Result<TickResult> {
        let Frame::Words(words) = &mut continuation.frame else {
            return Err(Error::InvalidArgument(format!(
                "proc '{}': continuation was created by another engine",
                self.proc.name
            )));
        };
        let mut progress_made = false;
        let mut sent_channels = Vec::new();

        if !continuation.in_iteration {
            self.load_state(words, &continuation.state);
            continuation.in_iteration = true;
            continuation.position = 0;
            progress_made = true;
        }

        let mut cursor = 0usize;
        let mut cursor_valid = true;
        let mut selector = 0u64;
        let mut leaves = Vec::new();

        while let Some(op) = self.tape.get(continuation.position) {
            let a0 = op.arg0 as usize;
            let a1 = op.arg1 as usize;
            match op.op_type {
                OP_IMM => words[op.dst] = op.arg0,
                OP_COPY => copy_words(words, op.dst, a0, op.arg2 as usize),
                OP_NOT => words[op.dst] = !words[a0] & op.arg2,
                OP_NEG => words[op.dst] = kernels::neg(words[a0], op.arg2 as usize),
                OP_REDUCE_AND => words[op.dst] = kernels::and_reduce(words[a0], op.arg2 as usize),
                OP_REDUCE_OR => words[op.dst] = kernels::or_reduce(words[a0]),
                OP_REDUCE_XOR => words[op.dst] = kernels::xor_reduce(words[a0]),
                OP_AND_ACC => words[op.dst] &= words[a0],
                OP_OR_ACC => words[op.dst] |= words[a0],
                OP_XOR_ACC => words[op.dst] ^= words[a0],
                OP_ADD => words[op.dst] = kernels::add(words[a0], words[a1], op.arg2 as usize),
                OP_SUB => words[op.dst] = kernels::sub(words[a0], words[a1], op.arg2 as usize),
                OP_UMUL => words[op.dst] = kernels::umul(words[a0], words[a1], op.arg2 as usize),
                OP_SMUL => {
                    let (lw, rw, ow) = unpack_widths(op.arg2);
                    words[op.dst] = kernels::smul(words[a0], lw, words[a1], rw, ow);
                }
                OP_UDIV => words[op.dst] = kernels::udiv(words[a0], words[a1], op.arg2 as usize),
                OP_SDIV => words[op.dst] = kernels::sdiv(words[a0], words[a1], op.arg2 as usize),
                OP_UMOD => words[op.dst] = kernels::umod(words[a0], words[a1]),
                OP_SMOD => words[op.dst] = kernels::smod(words[a0], words[a1], op.arg2 as usize),
                OP_SHLL => words[op.dst] = kernels::shll(words[a0], words[a1], op.arg2 as usize),
                OP_SHRL => words[op.dst] = kernels::shrl(words[a0], words[a1], op.arg2 as usize),
                OP_SHRA => words[op.dst] = kernels::shra(words[a0], words[a1], op.arg2 as usize),
                OP_EQ | OP_NE => {
                    let n = op.arg2 as usize;
                    let equal = words[a0..a0 + n] == words[a1..a1 + n];
                    words[op.dst] = (equal == (op.op_type == OP_EQ)) as u64;
                }
                OP_ULT => words[op.dst] = (words[a0] < words[a1]) as u64,
                OP_ULE => words[op.dst] = (words[a0] <= words[a1]) as u64,
                OP_UGT => words[op.dst] = (words[a0] > words[a1]) as u64,
                OP_UGE => words[op.dst] = (words[a0] >= words[a1]) as u64,
                OP_SLT => words[op.dst] = kernels::slt(words[a0], words[a1], op.arg2 as usize) as u64,
                OP_SLE => words[op.dst] = !kernels::slt(words[a1], words[a0], op.arg2 as usize) as u64,
                OP_SGT => words[op.dst] = kernels::slt(words[a1], words[a0], op.arg2 as usize) as u64,
                OP_SGE => words[op.dst] = !kernels::slt(words[a0], words[a1], op.arg2 as usize) as u64,
                OP_CONCAT_INIT => words[op.dst] = 0,
                OP_CONCAT_ACCUM => {
                    words[op.dst] = kernels::concat_accum(words[op.dst], words[a0], a1);
                }
                OP_SLICE => words[op.dst] = kernels::bit_slice(words[a0], a1, op.arg2 as usize),
                OP_SIGN_EXT => words[op.dst] = kernels::sign_ext(words[a0], a1, op.arg2 as usize),
                OP_CURSOR_SET => {
                    cursor = a0;
                    cursor_valid = true;
                }
                OP_INDEX_CLAMP => {
                    let index = usize::try_from(words[a0]).unwrap_or(usize::MAX).min(a1.saturating_sub(1));
                    cursor += index * op.arg2 as usize;
                }
                OP_INDEX_CHECK => match usize::try_from(words[a0]).ok().filter(|i| *i < a1) {
                    Some(index) => cursor += index * op.arg2 as usize,
                    None => cursor_valid = false,
                },
                OP_LOAD_CURSOR => copy_words(words, op.dst, cursor, op.arg2 as usize),
                OP_STORE_CURSOR => {
                    if cursor_valid {
                        copy_words(words, cursor, a0, op.arg2 as usize);
                    }
                }
                OP_SEL_BEGIN => selector = words[a0],
                OP_SEL_CASE => {
                    if selector == op.arg1 {
                        copy_words(words, op.dst, a0, op.arg2 as usize);
                    }
                }
                OP_SEL_DEFAULT => {
                    if selector >= op.arg1 {
                        copy_words(words, op.dst, a0, op.arg2 as usize);
                    }
                }
                OP_SEND => {
                    let enabled = op.arg2 == NO_PREDICATE || words[op.arg2 as usize] != 0;
                    if enabled {
                        let port = &self.ports[a1];
                        let (value, _) = Value::unflatten(&port.ty, &words[a0..a0 + port.words]);
                        let queue = queues
                            .get(&port.channel)
                            .ok_or_else(|| Error::NotFound(format!("no queue for channel '{}'", port.channel)))?;
                        queue.write(value)?;
                        sent_channels.push(port.channel.clone());
                    }
                }
                OP_RECV => {
                    let port = &self.ports[a0];
                    let blocking = op.arg2 != 0;
                    let enabled = op.arg1 == NO_PREDICATE || words[a1] != 0;
                    let received = if enabled {
                        queues
                            .get(&port.channel)
                            .ok_or_else(|| Error::NotFound(format!("no queue for channel '{}'", port.channel)))?
                            .read()?
                    } else {
                        None
                    };
                    let valid = received.is_some();
                    match received {
                        Some(value) => {
                            leaves.clear();
                            value.flatten_into(&mut leaves);
                            words[op.dst..op.dst + port.words].copy_from_slice(&leaves);
                        }
                        None if enabled && blocking => {
                            trace!("proc {}: blocked on {}", self.proc.name, port.channel);
                            return Ok(TickResult {
                                execution: ExecutionState::BlockedOnReceive(port.channel.clone()),
                                progress_made,
                                sent_channels,
                            });
                        }
                        None => words[op.dst..op.dst + port.words].fill(0),
                    }
                    if !blocking {
                        words[op.dst + port.words] = valid as u64;
                    }
                }
                other => return Err(Error::Unsupported(format!("tape op {}", other))),
            }
            continuation.position += 1;
            progress_made = true;
        }

        continuation.state = self.commit_state(words);
        continuation.in_iteration = false;
        continuation.position = 0;
        continuation.iterations += 1;
        Ok(TickResult { execution: ExecutionState::Completed, progress_made: true, sent_channels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::interpreter::Interpreter;
    use crate::ir::{ChannelOps, Package, ProcBuilder};

    fn iota_package() -> Package {
        let mut package = Package::new("p");
        package
            .create_streaming_channel("out", ChannelOps::SendOnly, Type::bits(32), vec![])
            .unwrap();
        let mut pb = ProcBuilder::new("iota", "tok", &package);
        let st = pb.state_element("st", Value::ubits(32, 5));
        let tok = pb.token_param();
        let send = pb.send("out", tok, st);
        let step = pb.literal(Value::ubits(32, 10));
        let next = pb.add_op(st, step);
        pb.build_into(&mut package, send, vec![next]).unwrap();
        package
    }

    #[test]
    fn test_layout_skips_tokens() {
        let package = iota_package();
        let compiled = Compiled::new(package.proc("iota").unwrap().clone()).unwrap();
        // st, literal, add
        assert_eq!(compiled.frame_words(), 3);
        let kinds: Vec<u8> = compiled.tape().iter().map(|op| op.op_type).collect();
        assert_eq!(kinds, vec![OP_SEND, OP_IMM, OP_ADD]);
    }

    #[test]
    fn test_matches_interpreter_on_iota() {
        let package = iota_package();
        let proc = package.proc("iota").unwrap().clone();
        let mut outputs = Vec::new();
        for evaluator in [
            Box::new(Interpreter::new(proc.clone())) as Box<dyn ProcEvaluator>,
            Box::new(Compiled::new(proc.clone()).unwrap()),
        ] {
            let queues = ChannelQueueManager::new(&package);
            let mut cont = evaluator.new_continuation();
            for _ in 0..3 {
                assert!(evaluator.tick(&mut cont, &queues).unwrap().is_completed());
            }
            let out = queues.queue("out").unwrap();
            let mut seen = Vec::new();
            while let Some(v) = out.read().unwrap() {
                seen.push(v);
            }
            outputs.push((seen, cont.state().to_vec()));
        }
        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[0].1, vec![Value::ubits(32, 35)]);
    }

    #[test]
    fn test_rejects_foreign_continuation() {
        let package = iota_package();
        let proc = package.proc("iota").unwrap().clone();
        let interp = Interpreter::new(proc.clone());
        let compiled = Compiled::new(proc).unwrap();
        let queues = ChannelQueueManager::new(&package);
        let mut cont = interp.new_continuation();
        assert!(compiled.tick(&mut cont, &queues).is_err());
    }

    #[test]
    fn test_width_packing() {
        assert_eq!(unpack_widths(pack_widths(64, 3, 17)), (64, 3, 17));
    }
}
