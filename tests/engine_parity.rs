//! The interpreter and the compiled engine must produce identical traffic.

mod common;

use proc_runtime::{fixed_value_generator, EngineKind, ProcRuntime, Value};

fn drain(runtime: &ProcRuntime, channel: &str) -> Vec<Value> {
    let queue = runtime.queue(channel).unwrap();
    let mut out = Vec::new();
    while let Some(value) = queue.read().unwrap() {
        out.push(value);
    }
    out
}

type Trace = (Vec<Value>, Vec<Value>, Vec<Value>);

fn run_rich(engine: EngineKind, ticks: usize) -> Trace {
    let mut rt = ProcRuntime::with_engine(common::rich_package(), engine).unwrap();
    let inputs = (0..12u64).map(|i| Value::ubits(8, (i * 37 + 5) & 0xff)).collect();
    rt.queue("in").unwrap().attach_generator(fixed_value_generator(inputs)).unwrap();
    for _ in 0..ticks {
        rt.tick().unwrap();
    }
    (drain(&rt, "out"), drain(&rt, "odd"), rt.proc_state("rich").unwrap().to_vec())
}

#[test]
fn test_rich_proc_traffic_matches() {
    // 300 ticks wrap the 8-bit counter, covering every index and sign.
    let interpreted = run_rich(EngineKind::Interpreter, 300);
    let compiled = run_rich(EngineKind::Compiled, 300);
    assert_eq!(interpreted.0.len(), 300);
    assert_eq!(interpreted.1.len(), 150);
    for (i, (a, b)) in interpreted.0.iter().zip(&compiled.0).enumerate() {
        assert_eq!(a, b, "output {} differs", i);
    }
    assert_eq!(interpreted, compiled);
}

#[test]
fn test_rich_proc_first_iteration() {
    common::parametrized(|engine| {
        let (out, odd, state) = run_rich(engine, 1);
        assert!(odd.is_empty());
        let Value::Tuple(fields) = &out[0] else {
            panic!("expected tuple output, got {}", out[0]);
        };
        // count = 0, elem = arr[0] = 3
        assert_eq!(fields[0], Value::ubits(16, 0));
        assert_eq!(fields[2], Value::ubits(8, 0));
        // udiv(3, 0) saturates
        assert_eq!(fields[4], Value::ubits(8, 0xff));
        assert_eq!(fields[5], Value::ubits(8, 0));
        // no receive on even counts
        assert_eq!(fields[26], Value::ubits(1, 0));
        assert_eq!(state[0], Value::ubits(8, 1));
    });
}

#[test]
fn test_compiled_continuation_resumes_mid_iteration() {
    use proc_runtime::ir::{ChannelOps, Package, ProcBuilder, Type};

    let mut package = Package::new("p");
    package.create_streaming_channel("a", ChannelOps::ReceiveOnly, Type::bits(32), vec![]).unwrap();
    package.create_streaming_channel("b", ChannelOps::ReceiveOnly, Type::bits(32), vec![]).unwrap();
    package.create_streaming_channel("out", ChannelOps::SendOnly, Type::bits(32), vec![]).unwrap();
    let mut pb = ProcBuilder::new("join", "tok", &package);
    let tok = pb.token_param();
    let ra = pb.receive("a", tok);
    let ta = pb.tuple_index(ra, 0);
    let va = pb.tuple_index(ra, 1);
    let early = pb.send("out", ta, va);
    let rb = pb.receive("b", early);
    let tb = pb.tuple_index(rb, 0);
    let vb = pb.tuple_index(rb, 1);
    let sum = pb.add_op(va, vb);
    let send = pb.send("out", tb, sum);
    pb.build_into(&mut package, send, vec![]).unwrap();

    common::parametrized(|engine| {
        let mut rt = ProcRuntime::with_engine(package.clone(), engine).unwrap();
        rt.queue("a").unwrap().write(Value::ubits(32, 4)).unwrap();
        rt.tick().unwrap();
        // Blocked on b after the first send; a was consumed exactly once.
        assert_eq!(drain(&rt, "out"), vec![Value::ubits(32, 4)]);
        assert!(rt.queue("a").unwrap().is_empty());

        rt.queue("b").unwrap().write(Value::ubits(32, 6)).unwrap();
        rt.tick().unwrap();
        assert_eq!(drain(&rt, "out"), vec![Value::ubits(32, 10)]);
        assert_eq!(rt.proc_iterations("join").unwrap(), 1);
    });
}
