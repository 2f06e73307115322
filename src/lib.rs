//! Tick-driven runtime for networks of communicating procs
//!
//! Procs are stateful dataflow graphs that exchange values over typed
//! channels. The runtime advances every proc by at most one iteration per
//! tick, detects deadlock, and runs either of two interchangeable engines.
//!
//! The crate is organized as:
//! - ir/: types, values, node arena, textual IR parser/printer, verifier
//! - queue.rs: per-channel FIFO/single-value queues and their manager
//! - evaluator/: resumable proc evaluators (interpreter and compiled tape)
//! - runtime.rs: the tick scheduler
//! - ffi.rs: C ABI function exports

pub mod config;
pub mod error;
pub mod evaluator;
pub mod ir;
pub mod queue;
pub mod runtime;

mod ffi;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use evaluator::{create_evaluator, Continuation, EngineKind, ExecutionState, ProcEvaluator, TickResult};
pub use ir::{parse_package, Channel, ChannelKind, ChannelOps, Package, Proc, ProcBuilder, Type, Value};
pub use queue::{fixed_value_generator, ChannelQueue, ChannelQueueManager, ValueGenerator};
pub use runtime::ProcRuntime;

// Re-export FFI functions at crate root for easier linking
pub use ffi::*;
