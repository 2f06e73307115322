//! Proc evaluators
//!
//! An evaluator advances one proc by at most one iteration per call,
//! reading and writing channel queues as its node graph directs. A blocked
//! iteration is recorded in the [`Continuation`] and resumes exactly where it
//! stopped on the next call.
//!
//! Two engines implement [`ProcEvaluator`]:
//! - [`interpreter::Interpreter`] walks the node arena over [`Value`]s
//! - [`compiled::Compiled`] lowers the proc to a flat op tape over words
//!
//! Both must produce identical channel traffic for identical inputs.

pub mod compiled;
pub mod interpreter;
pub mod kernels;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::ir::{Proc, Value};
use crate::queue::ChannelQueueManager;

/// Execution engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Interpreter,
    Compiled,
}

impl EngineKind {
    pub const ALL: [EngineKind; 2] = [EngineKind::Interpreter, EngineKind::Compiled];
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineKind::Interpreter => "interpreter",
            EngineKind::Compiled => "compiled",
        })
    }
}

/// How an evaluation attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    /// The iteration finished and the next state was committed.
    Completed,
    /// A blocking receive found its channel empty.
    BlockedOnReceive(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickResult {
    pub execution: ExecutionState,
    /// At least one node executed, or the iteration completed.
    pub progress_made: bool,
    /// Channels written during this attempt, in send order.
    pub sent_channels: Vec<String>,
}

impl TickResult {
    pub fn is_completed(&self) -> bool {
        self.execution == ExecutionState::Completed
    }

    pub fn blocked_channel(&self) -> Option<&str> {
        match &self.execution {
            ExecutionState::BlockedOnReceive(channel) => Some(channel),
            ExecutionState::Completed => None,
        }
    }
}

/// Engine-specific storage for the values of the current iteration.
#[derive(Debug, Clone)]
pub(crate) enum Frame {
    /// One value per node.
    Values(Vec<Value>),
    /// Flattened leaf words of every node.
    Words(Vec<u64>),
}

/// Saved execution point of a proc
#[derive(Debug, Clone)]
pub struct Continuation {
    pub(crate) state: Vec<Value>,
    pub(crate) in_iteration: bool,
    /// Next node (interpreter) or tape op (compiled) to execute.
    pub(crate) position: usize,
    pub(crate) frame: Frame,
    pub(crate) iterations: u64,
}

impl Continuation {
    pub(crate) fn new(state: Vec<Value>, frame: Frame) -> Self {
        Self { state, in_iteration: false, position: 0, frame, iterations: 0 }
    }

    /// State element values committed by the last completed iteration.
    pub fn state(&self) -> &[Value] {
        &self.state
    }

    /// Completed iterations since construction or reset.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Whether an iteration has started and not yet completed.
    pub fn in_iteration(&self) -> bool {
        self.in_iteration
    }
}

pub trait ProcEvaluator: Send {
    fn proc(&self) -> &Proc;

    fn engine(&self) -> EngineKind;

    /// Continuation positioned before the first iteration, holding the
    /// initial state.
    fn new_continuation(&self) -> Continuation;

    /// Run from the continuation until the iteration completes or blocks.
    fn tick(&self, continuation: &mut Continuation, queues: &ChannelQueueManager) -> Result<TickResult>;
}

/// Build an evaluator for `proc` using the selected engine.
pub fn create_evaluator(engine: EngineKind, proc: &Proc) -> Result<Box<dyn ProcEvaluator>> {
    Ok(match engine {
        EngineKind::Interpreter => Box::new(interpreter::Interpreter::new(proc.clone())),
        EngineKind::Compiled => Box::new(compiled::Compiled::new(proc.clone())?),
    })
}
