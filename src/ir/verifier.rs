//! Structural and type validation of packages
//!
//! Runs at the end of every construction path (parser, builder, JSON) so the
//! evaluators can index the arena without re-checking.

use std::collections::HashSet;

use super::infer::infer_type;
use super::node::Op;
use super::package::{Channel, ChannelKind, Package, Proc};
use super::types::{Type, MAX_BITS_WIDTH};
use crate::error::{Error, Result};

fn check_type_supported(ty: &Type, context: &str) -> Result<()> {
    match ty {
        Type::Bits(w) if *w > MAX_BITS_WIDTH => Err(Error::Unsupported(format!(
            "{}: bits[{}] exceeds the {}-bit limit",
            context, w, MAX_BITS_WIDTH
        ))),
        Type::Bits(_) | Type::Token => Ok(()),
        Type::Tuple(elements) => elements.iter().try_for_each(|e| check_type_supported(e, context)),
        Type::Array { element, size } => {
            if *size == 0 {
                return Err(Error::Verify(format!("{}: zero-length array type", context)));
            }
            check_type_supported(element, context)
        }
    }
}

fn check_channel(channel: &Channel) -> Result<()> {
    let context = format!("channel '{}'", channel.name);
    check_type_supported(&channel.ty, &context)?;
    for value in &channel.initial_values {
        if !value.conforms_to(&channel.ty) {
            return Err(Error::type_mismatch(
                format!("{} initial value", context),
                &channel.ty,
                value.ty(),
            ));
        }
    }
    if channel.kind == ChannelKind::SingleValue && channel.initial_values.len() > 1 {
        return Err(Error::Verify(format!(
            "{}: single-value channels hold at most one initial value",
            context
        )));
    }
    Ok(())
}

pub fn verify_package(package: &Package) -> Result<()> {
    let mut names = HashSet::new();
    let mut ids = HashSet::new();
    for channel in &package.channels {
        if !names.insert(channel.name.as_str()) {
            return Err(Error::Verify(format!("duplicate channel name '{}'", channel.name)));
        }
        if !ids.insert(channel.id) {
            return Err(Error::Verify(format!("duplicate channel id {}", channel.id)));
        }
        check_channel(channel)?;
    }

    let mut proc_names = HashSet::new();
    for proc in &package.procs {
        if !proc_names.insert(proc.name.as_str()) {
            return Err(Error::Verify(format!("duplicate proc name '{}'", proc.name)));
        }
        verify_proc(proc, &package.channels)?;
    }
    if let Some(top) = &package.top {
        if !proc_names.contains(top.as_str()) {
            return Err(Error::Verify(format!("top proc '{}' does not exist", top)));
        }
    }
    Ok(())
}

pub fn verify_proc(proc: &Proc, channels: &[Channel]) -> Result<()> {
    let err = |message: String| Error::Verify(format!("proc '{}': {}", proc.name, message));

    let state_count = proc.state.len();
    if proc.nodes.len() < state_count + 1 {
        return Err(err("missing token or state params".into()));
    }

    let mut names = HashSet::new();
    for (i, node) in proc.nodes.iter().enumerate() {
        if !names.insert(node.name.as_str()) {
            return Err(err(format!("duplicate node name '{}'", node.name)));
        }
        if let Some(bad) = node.operands.iter().find(|o| o.0 >= i) {
            return Err(err(format!(
                "node '{}' uses operand {} which is not defined before it",
                node.name, bad
            )));
        }
        check_type_supported(&node.ty, &format!("node '{}'", node.name))?;

        match (&node.op, i) {
            (Op::TokenParam, 0) => {
                if !node.ty.is_token() {
                    return Err(err("token param must have token type".into()));
                }
                continue;
            }
            (Op::StateParam { index }, i) if i >= 1 && i <= state_count && *index == i - 1 => {
                let init = &proc.state[*index].init;
                if !init.conforms_to(&node.ty) {
                    return Err(Error::type_mismatch(
                        format!("proc '{}' state element '{}'", proc.name, node.name),
                        &node.ty,
                        init.ty(),
                    ));
                }
                continue;
            }
            (op, 0) => return Err(err(format!("node 0 must be the token param, found {}", op.name()))),
            (Op::TokenParam | Op::StateParam { .. }, _) => {
                return Err(err(format!("misplaced param '{}'", node.name)))
            }
            _ if i <= state_count => {
                return Err(err(format!("expected state param at position {}", i)))
            }
            _ => {}
        }

        if let Op::Literal { value } = &node.op {
            if !value.conforms_to(&node.ty) {
                return Err(Error::type_mismatch(format!("literal '{}'", node.name), &node.ty, value.ty()));
            }
            continue;
        }

        let operand_types: Vec<&Type> = node.operands.iter().map(|o| &proc.nodes[o.0].ty).collect();
        let channel = node.op.channel().and_then(|c| channels.iter().find(|ch| ch.name == c));
        let inferred = infer_type(&node.op, &operand_types, channel)
            .map_err(|e| err(format!("node '{}': {}", node.name, e)))?;

        let mul_width_ok = matches!(node.op, Op::UMul | Op::SMul) && node.ty.is_bits();
        if inferred != node.ty && !mul_width_ok {
            return Err(Error::type_mismatch(
                format!("proc '{}' node '{}'", proc.name, node.name),
                &inferred,
                &node.ty,
            ));
        }
    }

    let token = proc
        .nodes
        .get(proc.next_token.0)
        .ok_or_else(|| err(format!("next token {} out of range", proc.next_token)))?;
    if !token.ty.is_token() {
        return Err(err(format!("next token '{}' is not a token", token.name)));
    }

    if proc.next_state.len() != state_count {
        return Err(err(format!(
            "{} next state values for {} state elements",
            proc.next_state.len(),
            state_count
        )));
    }
    for (i, id) in proc.next_state.iter().enumerate() {
        let node = proc
            .nodes
            .get(id.0)
            .ok_or_else(|| err(format!("next state {} out of range", id)))?;
        let init_ty = proc.state[i].init.ty();
        if node.ty != init_ty {
            return Err(Error::type_mismatch(
                format!("proc '{}' next state for '{}'", proc.name, proc.state[i].name),
                init_ty,
                &node.ty,
            ));
        }
    }
    Ok(())
}
