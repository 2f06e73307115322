//! Textual IR and JSON interchange.

mod common;

use proc_runtime::{parse_package, Error, Package, Value};

const CHANNEL_ATTRIBUTES: &str = r#"
package attrs

chan feedback(bits[16], initial_values={1, 2, 65535}, id=4, kind=streaming, ops=send_receive, flow_control=ready_valid, fifo_depth=3, metadata="""tuned""")
chan config(bits[4][2], id=9, kind=single_value, ops=receive_only, flow_control=none, metadata="")
chan pairs((bits[8], bits[1]), id=2, kind=streaming, ops=send_only, flow_control=none, metadata="")

proc relay(tkn: token, seen: bits[16], flags: (bits[1], bits[4][2]), init={7, (1, [2, 3])}) {
  receive.4: (token, bits[16]) = receive(tkn, channel=feedback)
  tuple_index.5: token = tuple_index(receive.4, index=0)
  tuple_index.6: bits[16] = tuple_index(receive.4, index=1)
  receive.7: (token, bits[4][2], bits[1]) = receive(tuple_index.5, blocking=false, channel=config)
  tuple_index.8: bits[4][2] = tuple_index(receive.7, index=1)
  literal.9: bits[1] = literal(value=1)
  array_index.10: bits[4] = array_index(tuple_index.8, indices=[literal.9])
  bit_slice.11: bits[8] = bit_slice(tuple_index.6, start=4, width=8)
  tuple_index.12: bits[1] = tuple_index(flags, index=0)
  tuple.13: (bits[8], bits[1]) = tuple(bit_slice.11, tuple_index.12)
  tuple_index.14: token = tuple_index(receive.7, index=0)
  send.15: token = send(tuple_index.14, tuple.13, predicate=tuple_index.12, channel=pairs)
  add.16: bits[16] = add(seen, tuple_index.6)
  send.17: token = send(send.15, add.16, channel=feedback)
  tuple.18: (bits[1], bits[4][2]) = tuple(tuple_index.12, tuple_index.8)
  next (send.17, add.16, tuple.18)
}
"#;

const LOCATED: &str = "package located

file_number 0 \"src/relay.x\"
file_number 1 \"src/lib.x\"

proc helper(tkn: token, init={}) {
  next (tkn)
}

top proc main(tkn: token, init={}) {
  after_all.1: token = after_all(tkn, pos=[(0,1,2), (1,3,4)])
  next (after_all.1)
}
";

#[test]
fn test_top_files_and_positions_survive_dump() {
    let package = parse_package(LOCATED).unwrap();
    assert_eq!(package.top.as_deref(), Some("main"));
    assert_eq!(package.files.len(), 2);
    assert_eq!(package.files[1].path, "src/lib.x");
    assert_eq!(package.dump_ir(), LOCATED);
    assert_eq!(parse_package(&package.dump_ir()).unwrap(), package);
    assert_eq!(Package::from_json(&package.to_json().unwrap()).unwrap(), package);
}

#[test]
fn test_builder_package_survives_dump_and_parse() {
    let package = common::rich_package();
    let text = package.dump_ir();
    let reparsed = parse_package(&text).unwrap();
    assert_eq!(reparsed, package);
    assert_eq!(reparsed.dump_ir(), text);
}

#[test]
fn test_parsed_package_survives_dump_and_parse() {
    let package = parse_package(CHANNEL_ATTRIBUTES).unwrap();
    let feedback = package.channel("feedback").unwrap();
    assert_eq!(feedback.initial_values.len(), 3);
    assert_eq!(feedback.fifo_depth, Some(3));
    assert_eq!(feedback.metadata, "tuned");

    let relay = package.proc("relay").unwrap();
    assert_eq!(
        relay.state[1].init,
        Value::tuple(vec![Value::ubits(1, 1), Value::Array(vec![Value::ubits(4, 2), Value::ubits(4, 3)])])
    );

    assert_eq!(parse_package(&package.dump_ir()).unwrap(), package);
}

#[test]
fn test_json_roundtrip() {
    for package in [common::rich_package(), parse_package(CHANNEL_ATTRIBUTES).unwrap()] {
        let json = package.to_json().unwrap();
        assert_eq!(Package::from_json(&json).unwrap(), package);
    }
}

#[test]
fn test_json_is_verified() {
    let package = parse_package(CHANNEL_ATTRIBUTES).unwrap();
    let json = package.to_json().unwrap().replace("\"name\": \"feedback\"", "\"name\": \"missing\"");
    assert!(Package::from_json(&json).is_err());
    assert!(matches!(Package::from_json("{"), Err(Error::Json(_))));
}

#[test]
fn test_declared_type_must_match() {
    let text = CHANNEL_ATTRIBUTES.replace("add.16: bits[16]", "add.16: bits[15]");
    match parse_package(&text) {
        Err(Error::TypeMismatch { context, expected, actual }) => {
            assert!(context.contains("add.16"), "{}", context);
            assert_eq!(expected, "bits[16]");
            assert_eq!(actual, "bits[15]");
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }
}

#[test]
fn test_parse_errors_carry_position() {
    let text = "package p\n\nchan c(bits[8], id=0, kind=streaming, ops=sideways, flow_control=none, metadata=\"\")\n";
    match parse_package(text) {
        Err(Error::Parse { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected parse error, got {:?}", other),
    }
}
