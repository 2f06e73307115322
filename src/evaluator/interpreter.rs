//! Node-walking evaluator
//!
//! Evaluates the arena front to back over [`Value`]s. This is the reference
//! engine the compiled engine is checked against.

use tracing::trace;

use super::kernels;
use super::{Continuation, EngineKind, ExecutionState, Frame, ProcEvaluator, TickResult};
use crate::error::{Error, Result};
use crate::ir::{Node, NodeId, Op, Proc, Type, Value};
use crate::queue::{ChannelQueue, ChannelQueueManager};

pub struct Interpreter {
    proc: Proc,
}

fn bits_of(values: &[Value], id: NodeId) -> Result<u64> {
    values[id.0]
        .bits_value()
        .ok_or_else(|| Error::type_mismatch(format!("operand {}", id), "bits", values[id.0].ty()))
}

fn width_of(ty: &Type) -> Result<usize> {
    ty.bit_width()
        .ok_or_else(|| Error::type_mismatch("bits operation", "bits", ty))
}

fn clamp_index(index: u64, len: usize) -> usize {
    usize::try_from(index).unwrap_or(usize::MAX).min(len.saturating_sub(1))
}

/// Copy of `array` with the element at `indices` replaced, or `None` when
/// any index is out of range.
fn update_array(array: &Value, indices: &[u64], value: &Value) -> Option<Value> {
    let Some((first, rest)) = indices.split_first() else {
        return Some(value.clone());
    };
    let elements = match array {
        Value::Array(elements) => elements,
        _ => return None,
    };
    let idx = usize::try_from(*first).ok().filter(|i| *i < elements.len())?;
    let replaced = update_array(&elements[idx], rest, value)?;
    let mut out = elements.clone();
    out[idx] = replaced;
    Some(Value::Array(out))
}

impl Interpreter {
    pub fn new(proc: Proc) -> Self {
        Self { proc }
    }

    fn queue<'q>(queues: &'q ChannelQueueManager, channel: &str) -> Result<&'q ChannelQueue> {
        queues
            .get(channel)
            .map(|q| q.as_ref())
            .ok_or_else(|| Error::NotFound(format!("no queue for channel '{}'", channel)))
    }

    fn predicate_holds(node: &Node, values: &[Value]) -> Result<bool> {
        match node.predicate() {
            Some(pred) => Ok(bits_of(values, pred)? != 0),
            None => Ok(true),
        }
    }

    /// Evaluate a node without side effects.
    fn eval_pure(&self, node: &Node, values: &[Value]) -> Result<Value> {
        let operand = |i: usize| bits_of(values, node.operands[i]);
        let operand_width = |i: usize| width_of(&self.proc.node(node.operands[i]).ty);

        let value = match &node.op {
            Op::TokenParam | Op::StateParam { .. } => {
                return Err(Error::Verify(format!("param '{}' outside the param block", node.name)))
            }
            Op::Literal { value } => value.clone(),
            Op::Identity => values[node.operand(0).0].clone(),
            Op::AfterAll => Value::Token,

            Op::Tuple => Value::Tuple(node.operands.iter().map(|id| values[id.0].clone()).collect()),
            Op::Array => Value::Array(node.operands.iter().map(|id| values[id.0].clone()).collect()),
            Op::TupleIndex { index } => {
                let tuple = &values[node.operand(0).0];
                tuple
                    .elements()
                    .and_then(|es| es.get(*index))
                    .cloned()
                    .ok_or_else(|| Error::type_mismatch("tuple_index", "tuple", tuple.ty()))?
            }
            Op::ArrayIndex => {
                let mut current = &values[node.operand(0).0];
                for idx in &node.operands[1..] {
                    let index = bits_of(values, *idx)?;
                    let elements = match current {
                        Value::Array(elements) => elements,
                        other => return Err(Error::type_mismatch("array_index", "array", other.ty())),
                    };
                    current = &elements[clamp_index(index, elements.len())];
                }
                current.clone()
            }
            Op::ArrayUpdate => {
                let array = &values[node.operand(0).0];
                let indices = node.operands[2..]
                    .iter()
                    .map(|id| bits_of(values, *id))
                    .collect::<Result<Vec<_>>>()?;
                update_array(array, &indices, &values[node.operand(1).0]).unwrap_or_else(|| array.clone())
            }
            Op::Sel { .. } => {
                let selector = operand(0)?;
                let cases = node.sel_cases();
                let chosen = match usize::try_from(selector).ok().filter(|s| *s < cases.len()) {
                    Some(s) => cases[s],
                    None => node.sel_default().unwrap_or(cases[cases.len() - 1]),
                };
                values[chosen.0].clone()
            }
            Op::Eq => Value::bool(values[node.operand(0).0] == values[node.operand(1).0]),
            Op::Ne => Value::bool(values[node.operand(0).0] != values[node.operand(1).0]),

            Op::Send { .. } | Op::Receive { .. } => {
                return Err(Error::Verify(format!("'{}' has side effects", node.name)))
            }

            op => {
                let width = width_of(&node.ty)?;
                let result = match op {
                    Op::Not => kernels::not(operand(0)?, width),
                    Op::Neg => kernels::neg(operand(0)?, width),
                    Op::AndReduce => kernels::and_reduce(operand(0)?, operand_width(0)?),
                    Op::OrReduce => kernels::or_reduce(operand(0)?),
                    Op::XorReduce => kernels::xor_reduce(operand(0)?),
                    Op::And | Op::Nand => {
                        let mut acc = operand(0)?;
                        for i in 1..node.operands.len() {
                            acc &= operand(i)?;
                        }
                        if matches!(op, Op::Nand) { kernels::not(acc, width) } else { acc }
                    }
                    Op::Or | Op::Nor => {
                        let mut acc = operand(0)?;
                        for i in 1..node.operands.len() {
                            acc |= operand(i)?;
                        }
                        if matches!(op, Op::Nor) { kernels::not(acc, width) } else { acc }
                    }
                    Op::Xor => {
                        let mut acc = operand(0)?;
                        for i in 1..node.operands.len() {
                            acc ^= operand(i)?;
                        }
                        acc
                    }
                    Op::Add => kernels::add(operand(0)?, operand(1)?, width),
                    Op::Sub => kernels::sub(operand(0)?, operand(1)?, width),
                    Op::UMul => kernels::umul(operand(0)?, operand(1)?, width),
                    Op::SMul => kernels::smul(operand(0)?, operand_width(0)?, operand(1)?, operand_width(1)?, width),
                    Op::UDiv => kernels::udiv(operand(0)?, operand(1)?, width),
                    Op::SDiv => kernels::sdiv(operand(0)?, operand(1)?, width),
                    Op::UMod => kernels::umod(operand(0)?, operand(1)?),
                    Op::SMod => kernels::smod(operand(0)?, operand(1)?, width),
                    Op::Shll => kernels::shll(operand(0)?, operand(1)?, width),
                    Op::Shrl => kernels::shrl(operand(0)?, operand(1)?, width),
                    Op::Shra => kernels::shra(operand(0)?, operand(1)?, width),
                    Op::ULt => (operand(0)? < operand(1)?) as u64,
                    Op::ULe => (operand(0)? <= operand(1)?) as u64,
                    Op::UGt => (operand(0)? > operand(1)?) as u64,
                    Op::UGe => (operand(0)? >= operand(1)?) as u64,
                    Op::SLt => kernels::slt(operand(0)?, operand(1)?, operand_width(0)?) as u64,
                    Op::SLe => !kernels::slt(operand(1)?, operand(0)?, operand_width(0)?) as u64,
                    Op::SGt => kernels::slt(operand(1)?, operand(0)?, operand_width(0)?) as u64,
                    Op::SGe => !kernels::slt(operand(0)?, operand(1)?, operand_width(0)?) as u64,
                    Op::Concat => {
                        let mut acc = 0;
                        for i in 0..node.operands.len() {
                            acc = kernels::concat_accum(acc, operand(i)?, operand_width(i)?);
                        }
                        acc
                    }
                    Op::BitSlice { start, width } => kernels::bit_slice(operand(0)?, *start, *width),
                    Op::ZeroExt { .. } => operand(0)?,
                    Op::SignExt { new_bit_count } => kernels::sign_ext(operand(0)?, operand_width(0)?, *new_bit_count),
                    other => return Err(Error::Unsupported(format!("op '{}'", other.name()))),
                };
                Value::ubits(width, result)
            }
        };
        Ok(value)
    }
}

impl ProcEvaluator for Interpreter {
    fn proc(&self) -> &Proc {
        &self.proc
    }

    fn engine(&self) -> EngineKind {
        EngineKind::Interpreter
    }

    fn new_continuation(&self) -> Continuation {
        let frame = Frame::Values(vec![Value::Token; self.proc.node_count()]);
        Continuation::new(self.proc.initial_state(), frame)
    }

    fn tick(&self, continuation: &mut Continuation, queues: &ChannelQueueManager) -> Result<TickResult> {
        let Frame::Values(values) = &mut continuation.frame else {
            return Err(Error::InvalidArgument(format!(
                "proc '{}': continuation was created by another engine",
                self.proc.name
            )));
        };
        let nodes = &self.proc.nodes;
        let mut progress_made = false;
        let mut sent_channels = Vec::new();

        if !continuation.in_iteration {
            values[0] = Value::Token;
            for (i, value) in continuation.state.iter().enumerate() {
                values[i + 1] = value.clone();
            }
            continuation.in_iteration = true;
            continuation.position = continuation.state.len() + 1;
            progress_made = true;
        }

        while continuation.position < nodes.len() {
            let node = &nodes[continuation.position];
            let value = match &node.op {
                Op::Send { channel, .. } => {
                    if Self::predicate_holds(node, values)? {
                        Self::queue(queues, channel)?.write(values[node.operand(1).0].clone())?;
                        sent_channels.push(channel.clone());
                    }
                    Value::Token
                }
                Op::Receive { channel, blocking, .. } => {
                    let enabled = Self::predicate_holds(node, values)?;
                    let received = if enabled { Self::queue(queues, channel)?.read()? } else { None };
                    let payload_ty = match &node.ty {
                        Type::Tuple(elements) if elements.len() >= 2 => &elements[1],
                        other => return Err(Error::type_mismatch("receive result", "tuple", other)),
                    };
                    let valid = received.is_some();
                    let payload = match received {
                        Some(value) => value,
                        None if enabled && *blocking => {
                            trace!("proc {}: blocked on {}", self.proc.name, channel);
                            return Ok(TickResult {
                                execution: ExecutionState::BlockedOnReceive(channel.clone()),
                                progress_made,
                                sent_channels,
                            });
                        }
                        None => Value::zero(payload_ty),
                    };
                    let mut elements = vec![Value::Token, payload];
                    if !*blocking {
                        elements.push(Value::bool(valid));
                    }
                    Value::Tuple(elements)
                }
                _ => self.eval_pure(node, values)?,
            };
            values[continuation.position] = value;
            continuation.position += 1;
            progress_made = true;
        }

        continuation.state = self.proc.next_state.iter().map(|id| values[id.0].clone()).collect();
        continuation.in_iteration = false;
        continuation.position = 0;
        continuation.iterations += 1;
        Ok(TickResult { execution: ExecutionState::Completed, progress_made: true, sent_channels })
    }
}
