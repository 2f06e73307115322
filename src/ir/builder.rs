//! Programmatic construction of procs
//!
//! Node-creating methods return a [`NodeId`] immediately; type errors are
//! recorded and reported by [`ProcBuilder::build`], so construction code can
//! be written straight-line.

use super::infer::infer_type;
use super::node::{Node, NodeId, Op};
use super::package::{Channel, Package, Proc, StateElement};
use super::types::Type;
use super::value::Value;
use super::verifier::verify_proc;
use crate::error::{Error, Result};

pub struct ProcBuilder {
    name: String,
    channels: Vec<Channel>,
    state: Vec<StateElement>,
    nodes: Vec<Node>,
    error: Option<Error>,
}

impl ProcBuilder {
    /// Start a proc whose token param is named `token_name`. Channel
    /// declarations are taken from `package`.
    pub fn new(name: &str, token_name: &str, package: &Package) -> Self {
        let token = Node {
            name: token_name.to_string(),
            ty: Type::Token,
            op: Op::TokenParam,
            operands: Vec::new(),
            pos: Vec::new(),
        };
        Self {
            name: name.to_string(),
            channels: package.channels.clone(),
            state: Vec::new(),
            nodes: vec![token],
            error: None,
        }
    }

    pub fn token_param(&self) -> NodeId {
        NodeId(0)
    }

    /// Declare a state element. All state elements must be declared before
    /// any other node.
    pub fn state_element(&mut self, name: &str, init: Value) -> NodeId {
        if self.nodes.len() != self.state.len() + 1 {
            self.record(Error::InvalidArgument(format!(
                "state element '{}' declared after non-param nodes",
                name
            )));
        }
        let index = self.state.len();
        self.state.push(StateElement { name: name.to_string(), init: init.clone() });
        self.push(Node {
            name: name.to_string(),
            ty: init.ty(),
            op: Op::StateParam { index },
            operands: Vec::new(),
            pos: Vec::new(),
        })
    }

    pub fn literal(&mut self, value: Value) -> NodeId {
        self.add(Op::Literal { value }, vec![])
    }

    pub fn identity(&mut self, x: NodeId) -> NodeId {
        self.add(Op::Identity, vec![x])
    }

    pub fn not(&mut self, x: NodeId) -> NodeId {
        self.add(Op::Not, vec![x])
    }

    pub fn neg(&mut self, x: NodeId) -> NodeId {
        self.add(Op::Neg, vec![x])
    }

    pub fn add_op(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.add(Op::Add, vec![a, b])
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.add(Op::Sub, vec![a, b])
    }

    pub fn umul(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.add(Op::UMul, vec![a, b])
    }

    /// Multiply with an explicit result width.
    pub fn mul_with_width(&mut self, signed: bool, a: NodeId, b: NodeId, width: usize) -> NodeId {
        let op = if signed { Op::SMul } else { Op::UMul };
        let id = self.add(op, vec![a, b]);
        self.nodes[id.0].ty = Type::Bits(width);
        id
    }

    pub fn eq(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.add(Op::Eq, vec![a, b])
    }

    pub fn ne(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.add(Op::Ne, vec![a, b])
    }

    /// Any single-operand opcode.
    pub fn unary(&mut self, op: Op, x: NodeId) -> NodeId {
        self.add(op, vec![x])
    }

    /// Any two-operand opcode.
    pub fn binary(&mut self, op: Op, a: NodeId, b: NodeId) -> NodeId {
        self.add(op, vec![a, b])
    }

    /// Any variadic opcode (`and`, `or`, `concat`, ...).
    pub fn nary(&mut self, op: Op, operands: Vec<NodeId>) -> NodeId {
        self.add(op, operands)
    }

    pub fn bit_slice(&mut self, x: NodeId, start: usize, width: usize) -> NodeId {
        self.add(Op::BitSlice { start, width }, vec![x])
    }

    pub fn zero_ext(&mut self, x: NodeId, new_bit_count: usize) -> NodeId {
        self.add(Op::ZeroExt { new_bit_count }, vec![x])
    }

    pub fn sign_ext(&mut self, x: NodeId, new_bit_count: usize) -> NodeId {
        self.add(Op::SignExt { new_bit_count }, vec![x])
    }

    pub fn tuple(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.add(Op::Tuple, elements)
    }

    pub fn tuple_index(&mut self, x: NodeId, index: usize) -> NodeId {
        self.add(Op::TupleIndex { index }, vec![x])
    }

    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.add(Op::Array, elements)
    }

    pub fn array_index(&mut self, array: NodeId, indices: Vec<NodeId>) -> NodeId {
        let mut operands = vec![array];
        operands.extend(indices);
        self.add(Op::ArrayIndex, operands)
    }

    pub fn array_update(&mut self, array: NodeId, value: NodeId, indices: Vec<NodeId>) -> NodeId {
        let mut operands = vec![array, value];
        operands.extend(indices);
        self.add(Op::ArrayUpdate, operands)
    }

    /// `cases[selector]`, or `default` when the selector is out of range.
    pub fn select(&mut self, selector: NodeId, cases: Vec<NodeId>, default: Option<NodeId>) -> NodeId {
        let has_default = default.is_some();
        let mut operands = vec![selector];
        operands.extend(cases);
        operands.extend(default);
        self.add(Op::Sel { has_default }, operands)
    }

    pub fn after_all(&mut self, tokens: Vec<NodeId>) -> NodeId {
        self.add(Op::AfterAll, tokens)
    }

    pub fn send(&mut self, channel: &str, token: NodeId, data: NodeId) -> NodeId {
        self.add(Op::Send { channel: channel.to_string(), has_predicate: false }, vec![token, data])
    }

    pub fn send_if(&mut self, channel: &str, token: NodeId, predicate: NodeId, data: NodeId) -> NodeId {
        self.add(
            Op::Send { channel: channel.to_string(), has_predicate: true },
            vec![token, data, predicate],
        )
    }

    /// Blocking receive; result is `(token, data)`.
    pub fn receive(&mut self, channel: &str, token: NodeId) -> NodeId {
        self.add(
            Op::Receive { channel: channel.to_string(), blocking: true, has_predicate: false },
            vec![token],
        )
    }

    pub fn receive_if(&mut self, channel: &str, token: NodeId, predicate: NodeId) -> NodeId {
        self.add(
            Op::Receive { channel: channel.to_string(), blocking: true, has_predicate: true },
            vec![token, predicate],
        )
    }

    /// Non-blocking receive; result is `(token, data, valid)`.
    pub fn receive_non_blocking(&mut self, channel: &str, token: NodeId) -> NodeId {
        self.add(
            Op::Receive { channel: channel.to_string(), blocking: false, has_predicate: false },
            vec![token],
        )
    }

    pub fn receive_if_non_blocking(&mut self, channel: &str, token: NodeId, predicate: NodeId) -> NodeId {
        self.add(
            Op::Receive { channel: channel.to_string(), blocking: false, has_predicate: true },
            vec![token, predicate],
        )
    }

    pub fn node_type(&self, id: NodeId) -> Option<&Type> {
        self.nodes.get(id.0).map(|n| &n.ty)
    }

    /// Finish the proc; reports the first construction error, if any.
    pub fn build(self, next_token: NodeId, next_state: Vec<NodeId>) -> Result<Proc> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let proc = Proc {
            name: self.name,
            state: self.state,
            nodes: self.nodes,
            next_token,
            next_state,
        };
        verify_proc(&proc, &self.channels)?;
        Ok(proc)
    }

    /// Build and add to `package` in one step.
    pub fn build_into(self, package: &mut Package, next_token: NodeId, next_state: Vec<NodeId>) -> Result<()> {
        let proc = self.build(next_token, next_state)?;
        package.add_proc(proc)
    }

    fn add(&mut self, op: Op, operands: Vec<NodeId>) -> NodeId {
        let ty = match self.infer(&op, &operands) {
            Ok(ty) => ty,
            Err(err) => {
                self.record(err);
                Type::Token
            }
        };
        let name = format!("{}.{}", op.name(), self.nodes.len());
        self.push(Node { name, ty, op, operands, pos: Vec::new() })
    }

    fn infer(&self, op: &Op, operands: &[NodeId]) -> Result<Type> {
        let mut types = Vec::with_capacity(operands.len());
        for id in operands {
            let node = self
                .nodes
                .get(id.0)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown operand {}", id)))?;
            types.push(&node.ty);
        }
        let channel = op.channel().and_then(|c| self.channels.iter().find(|ch| ch.name == c));
        infer_type(op, &types, channel)
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn record(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}
