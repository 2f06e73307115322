//! Proc network IR
//!
//! Packages of typed channels and procs, built programmatically with
//! [`ProcBuilder`], parsed from text with [`parse_package`], or loaded from
//! JSON. Every construction path ends in verification.

pub mod builder;
pub mod infer;
pub mod node;
pub mod package;
pub mod parser;
pub mod printer;
pub mod types;
pub mod value;
pub mod verifier;

pub use builder::ProcBuilder;
pub use node::{Node, NodeId, Op, SourcePos};
pub use package::{Channel, ChannelKind, ChannelOps, FileNumber, FlowControl, Package, Proc, StateElement};
pub use parser::parse_package;
pub use types::Type;
pub use value::{Bits, Value};
pub use verifier::verify_package;
