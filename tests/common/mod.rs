//! Shared fixtures for integration tests.

#![allow(dead_code)]

use proc_runtime::ir::{NodeId, Op};
use proc_runtime::{ChannelOps, EngineKind, Package, ProcBuilder, Type, Value};

pub fn parametrized(test: impl Fn(EngineKind)) {
    for engine in EngineKind::ALL {
        test(engine);
    }
}

struct RichBody {
    result: NodeId,
    after_in: NodeId,
    odd: NodeId,
    count: NodeId,
    next_state: Vec<NodeId>,
}

/// Every opcode at least once, driven by an 8-bit counter so indices run
/// both in and out of range of the 4-element array state.
fn rich_body(pb: &mut ProcBuilder) -> RichBody {
    let c = pb.state_element("count", Value::ubits(8, 0));
    let arr_init = Value::Array([3u64, 250, 17, 128].iter().map(|&v| Value::ubits(8, v)).collect());
    let arr = pb.state_element("arr", arr_init);
    let wide = pb.state_element("wide", Value::ubits(64, 0x0123_4567_89ab_cdef));
    let tok = pb.token_param();

    let one = pb.literal(Value::ubits(8, 1));
    let next_c = pb.add_op(c, one);
    let idx = pb.bit_slice(c, 0, 3);
    let elem = pb.array_index(arr, vec![idx]);

    let odd = pb.bit_slice(c, 0, 1);
    let recv = pb.receive_if_non_blocking("in", tok, odd);
    let tok_in = pb.tuple_index(recv, 0);
    let data = pb.tuple_index(recv, 1);
    let valid = pb.tuple_index(recv, 2);

    let smul = pb.mul_with_width(true, c, elem, 16);
    let umul = pb.mul_with_width(false, c, elem, 16);
    let q = pb.binary(Op::SDiv, c, elem);
    let r = pb.binary(Op::SMod, c, elem);
    let ud = pb.binary(Op::UDiv, elem, c);
    let um = pb.binary(Op::UMod, elem, c);
    let sh = pb.binary(Op::Shra, elem, idx);
    let shl = pb.binary(Op::Shll, c, idx);
    let slt = pb.binary(Op::SLt, c, elem);
    let sge = pb.binary(Op::SGe, c, elem);
    let ule = pb.binary(Op::ULe, c, elem);
    let ugt = pb.binary(Op::UGt, c, elem);
    let cat = pb.nary(Op::Concat, vec![c, elem, idx]);
    let sx = pb.sign_ext(elem, 16);
    let zx = pb.zero_ext(c, 16);
    let sel = pb.select(idx, vec![c, elem, q], Some(r));
    let neg = pb.neg(elem);
    let not = pb.not(c);
    let andr = pb.unary(Op::AndReduce, elem);
    let orr = pb.unary(Op::OrReduce, c);
    let xorr = pb.unary(Op::XorReduce, elem);
    let mask = pb.literal(Value::ubits(8, 0x5a));
    let mixed = pb.nary(Op::Xor, vec![c, elem, data, mask]);
    let nand = pb.nary(Op::Nand, vec![c, elem]);
    let nor = pb.nary(Op::Nor, vec![c, mask]);
    let and = pb.nary(Op::And, vec![elem, mask]);
    let or = pb.nary(Op::Or, vec![c, data]);
    let copy = pb.identity(c);

    let updated = pb.array_update(arr, mixed, vec![idx]);
    let pair = pb.tuple(vec![c, updated]);
    let next_arr = pb.tuple_index(pair, 1);
    let built = pb.array(vec![c, elem, q, r]);
    let same = pb.eq(next_arr, built);
    let differs = pb.ne(arr, updated);

    let shift = pb.literal(Value::ubits(7, 1));
    let wide_prod = pb.zero_ext(smul, 64);
    let lowered = pb.sub(wide, wide_prod);
    let shifted = pb.binary(Op::Shll, lowered, shift);
    let wide_cat = pb.zero_ext(cat, 64);
    let next_wide = pb.nary(Op::Xor, vec![shifted, wide_cat]);
    let three = pb.literal(Value::ubits(7, 3));
    let wide_shr = pb.binary(Op::Shrl, wide, three);

    let result = pb.tuple(vec![
        smul, umul, q, r, ud, um, sh, shl, slt, sge, ule, ugt, cat, sx, zx, sel, neg, not, andr, orr, xorr, nand,
        nor, and, or, copy, valid, same, differs, wide_shr, next_arr,
    ]);
    let after_in = pb.after_all(vec![tok_in]);
    RichBody { result, after_in, odd, count: c, next_state: vec![next_c, next_arr, next_wide] }
}

/// Package with one proc `rich` that receives on `in` (non-blocking,
/// predicated), sends a wide tuple on `out` every iteration, and sends its
/// counter on `odd` every other iteration.
pub fn rich_package() -> Package {
    let mut package = Package::new("rich");
    package.create_streaming_channel("in", ChannelOps::ReceiveOnly, Type::bits(8), vec![]).unwrap();
    package.create_streaming_channel("odd", ChannelOps::SendOnly, Type::bits(8), vec![]).unwrap();

    let mut scratch = ProcBuilder::new("rich", "tok", &package);
    let body = rich_body(&mut scratch);
    let result_ty = scratch.node_type(body.result).cloned().unwrap();
    package.create_streaming_channel("out", ChannelOps::SendOnly, result_ty, vec![]).unwrap();

    let mut pb = ProcBuilder::new("rich", "tok", &package);
    let body = rich_body(&mut pb);
    let send_out = pb.send("out", body.after_in, body.result);
    let send_odd = pb.send_if("odd", body.after_in, body.odd, body.count);
    let done = pb.after_all(vec![send_out, send_odd]);
    pb.build_into(&mut package, done, body.next_state).unwrap();
    package
}
