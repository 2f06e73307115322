//! Proc network scheduler
//!
//! A tick gives every proc the chance to complete one iteration. Procs are
//! attempted in declaration order; blocked procs are retried in further
//! passes as long as some proc made progress, so values sent earlier in the
//! tick can unblock them. The outcome is always a valid sequential
//! interleaving of the procs.

use tracing::{debug, trace, warn};

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::evaluator::{create_evaluator, Continuation, EngineKind, ExecutionState, ProcEvaluator};
use crate::ir::{verify_package, Package, Value};
use crate::queue::{ChannelQueue, ChannelQueueManager};
use std::sync::Arc;

/// Summary of one network tick
#[derive(Debug, Default)]
struct NetworkTick {
    progress_made: bool,
    progress_on_io_procs: bool,
    /// Channels procs were blocked on when the tick ended, in proc order.
    blocked_channels: Vec<String>,
    /// Channels written during the tick, first send first.
    sent_channels: Vec<String>,
}

struct ProcSlot {
    evaluator: Box<dyn ProcEvaluator>,
    continuation: Continuation,
    has_io: bool,
}

pub struct ProcRuntime {
    package: Package,
    config: RuntimeConfig,
    queues: ChannelQueueManager,
    procs: Vec<ProcSlot>,
    tick_count: u64,
}

impl ProcRuntime {
    pub fn new(package: Package, config: RuntimeConfig) -> Result<Self> {
        verify_package(&package)?;
        let queues = ChannelQueueManager::new(&package);
        let mut procs = Vec::with_capacity(package.procs.len());
        for proc in &package.procs {
            let evaluator = create_evaluator(config.engine, proc)?;
            let continuation = evaluator.new_continuation();
            procs.push(ProcSlot { evaluator, continuation, has_io: proc.has_io() });
        }
        debug!(
            "proc runtime for package {}: {} procs, {} channels, {} engine",
            package.name,
            procs.len(),
            package.channels.len(),
            config.engine
        );
        Ok(Self { package, config, queues, procs, tick_count: 0 })
    }

    pub fn with_engine(package: Package, engine: EngineKind) -> Result<Self> {
        Self::new(package, RuntimeConfig::with_engine(engine))
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn engine(&self) -> EngineKind {
        self.config.engine
    }

    pub fn queue_manager(&self) -> &ChannelQueueManager {
        &self.queues
    }

    pub fn queue(&self, name: &str) -> Result<Arc<ChannelQueue>> {
        self.queues.queue(name)
    }

    pub fn queue_by_id(&self, id: u64) -> Result<Arc<ChannelQueue>> {
        self.queues.queue_by_id(id)
    }

    /// Network ticks run since construction or the last reset.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    fn slot(&self, name: &str) -> Result<&ProcSlot> {
        self.procs
            .iter()
            .find(|slot| slot.evaluator.proc().name == name)
            .ok_or_else(|| Error::NotFound(format!("no proc named '{}'", name)))
    }

    /// State committed by the proc's last completed iteration.
    pub fn proc_state(&self, name: &str) -> Result<&[Value]> {
        Ok(self.slot(name)?.continuation.state())
    }

    /// Completed iterations of the proc since construction or reset.
    pub fn proc_iterations(&self, name: &str) -> Result<u64> {
        Ok(self.slot(name)?.continuation.iterations())
    }

    // ========================================================================
    // Ticking
    // ========================================================================

    fn tick_internal(&mut self) -> Result<NetworkTick> {
        let mut result = NetworkTick::default();
        let mut completed = vec![false; self.procs.len()];
        let mut blocked: Vec<Option<String>> = vec![None; self.procs.len()];

        loop {
            let mut pass_progress = false;
            for (i, slot) in self.procs.iter_mut().enumerate() {
                if completed[i] {
                    continue;
                }
                let outcome = slot.evaluator.tick(&mut slot.continuation, &self.queues)?;
                trace!(
                    "proc {}: {:?}, progress {}",
                    slot.evaluator.proc().name,
                    outcome.execution,
                    outcome.progress_made
                );
                for channel in outcome.sent_channels {
                    if !result.sent_channels.contains(&channel) {
                        result.sent_channels.push(channel);
                    }
                }
                if outcome.progress_made {
                    pass_progress = true;
                    result.progress_made = true;
                    result.progress_on_io_procs |= slot.has_io;
                }
                match outcome.execution {
                    ExecutionState::Completed => {
                        completed[i] = true;
                        blocked[i] = None;
                    }
                    ExecutionState::BlockedOnReceive(channel) => blocked[i] = Some(channel),
                }
            }
            if !pass_progress {
                break;
            }
        }

        for channel in blocked.into_iter().flatten() {
            if !result.blocked_channels.contains(&channel) {
                result.blocked_channels.push(channel);
            }
        }
        self.tick_count += 1;
        debug!(
            "tick {}: progress {}, io progress {}, sent [{}], blocked [{}]",
            self.tick_count,
            result.progress_made,
            result.progress_on_io_procs,
            result.sent_channels.join(", "),
            result.blocked_channels.join(", ")
        );
        Ok(result)
    }

    /// Advance every proc by at most one iteration.
    ///
    /// Fails with [`Error::Deadlock`] when no proc made progress while some
    /// proc is blocked on a receive.
    pub fn tick(&mut self) -> Result<()> {
        let result = self.tick_internal()?;
        if !result.progress_made && !result.blocked_channels.is_empty() {
            warn!("proc network deadlocked on [{}]", result.blocked_channels.join(", "));
            return Err(Error::Deadlock { channels: result.blocked_channels });
        }
        Ok(())
    }

    fn budget(&self, max_ticks: Option<u64>) -> Option<u64> {
        max_ticks.or(self.config.default_max_ticks)
    }

    /// Tick until each listed channel has received at least the given number
    /// of values since this call started. Returns the number of ticks run.
    pub fn tick_until_output(&mut self, outputs: &[(&str, u64)], max_ticks: Option<u64>) -> Result<u64> {
        let mut watched = Vec::with_capacity(outputs.len());
        for &(name, count) in outputs {
            let queue = self.queues.queue(name)?;
            if !queue.channel().ops.supports_send() {
                return Err(Error::InvalidArgument(format!("output channel '{}' does not support send", name)));
            }
            let baseline = queue.total_written();
            watched.push((queue, baseline, count));
        }

        let limit = self.budget(max_ticks);
        let mut ticks = 0;
        loop {
            if watched.iter().all(|(queue, baseline, count)| queue.total_written() - baseline >= *count) {
                return Ok(ticks);
            }
            if let Some(limit) = limit {
                if ticks >= limit {
                    return Err(Error::DeadlineExceeded {
                        limit,
                        waiting_for: "expected output produced".to_string(),
                    });
                }
            }
            self.tick()?;
            ticks += 1;
        }
    }

    /// Tick until a tick in which no proc with channel I/O made progress.
    /// Returns the number of productive ticks.
    pub fn tick_until_blocked(&mut self, max_ticks: Option<u64>) -> Result<u64> {
        let limit = self.budget(max_ticks);
        let mut ticks = 0;
        loop {
            if let Some(limit) = limit {
                if ticks >= limit {
                    return Err(Error::DeadlineExceeded { limit, waiting_for: "blocking".to_string() });
                }
            }
            if !self.tick_internal()?.progress_on_io_procs {
                return Ok(ticks);
            }
            ticks += 1;
        }
    }

    /// Return every proc to its initial state and reload channel initial
    /// values. Partial iterations are discarded.
    pub fn reset_state(&mut self) {
        self.queues.reset_state();
        for slot in &mut self.procs {
            slot.continuation = slot.evaluator.new_continuation();
        }
        self.tick_count = 0;
        debug!("proc runtime for package {} reset", self.package.name);
    }
}

impl std::fmt::Debug for ProcRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcRuntime")
            .field("package", &self.package.name)
            .field("engine", &self.config.engine)
            .field("procs", &self.procs.len())
            .field("tick_count", &self.tick_count)
            .finish()
    }
}
