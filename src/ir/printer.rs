//! Textual IR printer
//!
//! Output is accepted by [`super::parser::parse_package`] and parses back to
//! an equal package.

use std::fmt::Write;

use super::node::{Node, NodeId, Op};
use super::package::{Channel, Package, Proc};

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn join_names(proc: &Proc, ids: &[NodeId]) -> String {
    ids.iter().map(|id| proc.node(*id).name.as_str()).collect::<Vec<_>>().join(", ")
}

impl Channel {
    pub fn dump_ir(&self) -> String {
        let mut out = format!("chan {}({}", self.name, self.ty);
        if !self.initial_values.is_empty() {
            let values: Vec<String> = self.initial_values.iter().map(|v| v.to_untyped_string()).collect();
            let _ = write!(out, ", initial_values={{{}}}", values.join(", "));
        }
        let _ = write!(
            out,
            ", id={}, kind={}, ops={}, flow_control={}",
            self.id, self.kind, self.ops, self.flow_control
        );
        if let Some(depth) = self.fifo_depth {
            let _ = write!(out, ", fifo_depth={}", depth);
        }
        let _ = write!(out, ", metadata=\"{}\")", escape(&self.metadata));
        out
    }
}

impl Proc {
    /// One node as `name: type = op(operands, attributes)`.
    pub fn dump_node(&self, node: &Node) -> String {
        let operand = |i: usize| self.node(node.operands[i]).name.as_str();
        let mut args: Vec<String> = Vec::new();
        match &node.op {
            Op::TokenParam | Op::StateParam { .. } => {}
            Op::Literal { value } => args.push(format!("value={}", value.to_untyped_string())),
            Op::BitSlice { start, width } => {
                args.push(operand(0).to_string());
                args.push(format!("start={}", start));
                args.push(format!("width={}", width));
            }
            Op::ZeroExt { new_bit_count } | Op::SignExt { new_bit_count } => {
                args.push(operand(0).to_string());
                args.push(format!("new_bit_count={}", new_bit_count));
            }
            Op::TupleIndex { index } => {
                args.push(operand(0).to_string());
                args.push(format!("index={}", index));
            }
            Op::ArrayIndex => {
                args.push(operand(0).to_string());
                args.push(format!("indices=[{}]", join_names(self, &node.operands[1..])));
            }
            Op::ArrayUpdate => {
                args.push(operand(0).to_string());
                args.push(operand(1).to_string());
                args.push(format!("indices=[{}]", join_names(self, &node.operands[2..])));
            }
            Op::Sel { .. } => {
                args.push(operand(0).to_string());
                args.push(format!("cases=[{}]", join_names(self, node.sel_cases())));
                if let Some(default) = node.sel_default() {
                    args.push(format!("default={}", self.node(default).name));
                }
            }
            Op::Send { channel, .. } => {
                args.push(operand(0).to_string());
                args.push(operand(1).to_string());
                if let Some(pred) = node.predicate() {
                    args.push(format!("predicate={}", self.node(pred).name));
                }
                args.push(format!("channel={}", channel));
            }
            Op::Receive { channel, blocking, .. } => {
                args.push(operand(0).to_string());
                if let Some(pred) = node.predicate() {
                    args.push(format!("predicate={}", self.node(pred).name));
                }
                if !blocking {
                    args.push("blocking=false".to_string());
                }
                args.push(format!("channel={}", channel));
            }
            _ => args.extend(node.operands.iter().map(|id| self.node(*id).name.clone())),
        }
        if !node.pos.is_empty() {
            let locs: Vec<String> = node.pos.iter().map(|p| format!("({},{},{})", p.file, p.line, p.col)).collect();
            args.push(format!("pos=[{}]", locs.join(", ")));
        }
        format!("{}: {} = {}({})", node.name, node.ty, node.op.name(), args.join(", "))
    }

    pub fn dump_ir(&self) -> String {
        let token = self.node(self.token_param());
        let mut out = format!("proc {}({}: {}", self.name, token.name, token.ty);
        for i in 0..self.state.len() {
            let param = self.node(self.state_param(i));
            let _ = write!(out, ", {}: {}", param.name, param.ty);
        }
        let inits: Vec<String> = self.state.iter().map(|s| s.init.to_untyped_string()).collect();
        let _ = writeln!(out, ", init={{{}}}) {{", inits.join(", "));

        for node in self.nodes.iter().filter(|n| !n.op.is_param()) {
            let _ = writeln!(out, "  {}", self.dump_node(node));
        }

        let mut next = vec![self.next_token];
        next.extend(&self.next_state);
        let _ = writeln!(out, "  next ({})", join_names(self, &next));
        out.push_str("}\n");
        out
    }
}

impl Package {
    pub fn dump_ir(&self) -> String {
        let mut out = format!("package {}\n", self.name);
        if !self.files.is_empty() {
            out.push('\n');
            for file in &self.files {
                let _ = writeln!(out, "file_number {} \"{}\"", file.number, escape(&file.path));
            }
        }
        if !self.channels.is_empty() {
            out.push('\n');
            for channel in &self.channels {
                let _ = writeln!(out, "{}", channel.dump_ir());
            }
        }
        for proc in &self.procs {
            out.push('\n');
            if self.top.as_deref() == Some(proc.name.as_str()) {
                out.push_str("top ");
            }
            out.push_str(&proc.dump_ir());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::ProcBuilder;
    use crate::ir::package::ChannelOps;
    use crate::ir::types::Type;
    use crate::ir::value::Value;

    #[test]
    fn test_channel_line() {
        let ch = Channel::streaming("state", 0, ChannelOps::SendReceive, Type::bits(32))
            .with_initial_values(vec![Value::ubits(32, 42), Value::ubits(32, 55)]);
        assert_eq!(
            ch.dump_ir(),
            "chan state(bits[32], initial_values={42, 55}, id=0, kind=streaming, ops=send_receive, flow_control=none, metadata=\"\")"
        );
    }

    #[test]
    fn test_proc_layout() {
        let mut package = Package::new("p");
        package
            .create_streaming_channel("in", ChannelOps::ReceiveOnly, Type::bits(8), vec![])
            .unwrap();
        let mut pb = ProcBuilder::new("nb", "tkn", &package);
        let st = pb.state_element("st", Value::ubits(8, 3));
        let tok = pb.token_param();
        let rcv = pb.receive_non_blocking("in", tok);
        let rtok = pb.tuple_index(rcv, 0);
        pb.build_into(&mut package, rtok, vec![st]).unwrap();

        let text = package.proc("nb").unwrap().dump_ir();
        assert_eq!(
            text,
            "proc nb(tkn: token, st: bits[8], init={3}) {\n  \
             receive.2: (token, bits[8], bits[1]) = receive(tkn, blocking=false, channel=in)\n  \
             tuple_index.3: token = tuple_index(receive.2, index=0)\n  \
             next (tuple_index.3, st)\n}\n"
        );
    }

    #[test]
    fn test_metadata_is_escaped() {
        let mut ch = Channel::streaming("c", 1, ChannelOps::SendOnly, Type::bits(1));
        ch.metadata = "a \"b\"".to_string();
        assert!(ch.dump_ir().ends_with("metadata=\"a \\\"b\\\"\")"));
    }
}
