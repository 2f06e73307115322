//! Channel queues
//!
//! One [`ChannelQueue`] per channel, owned by a [`ChannelQueueManager`] built
//! from the package. Queues are individually locked and handed out as
//! `Arc`s so drivers can feed inputs and drain outputs between ticks.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::ir::{Channel, ChannelKind, ChannelOps, Package, Value};

/// On-demand source of values for an otherwise empty queue.
/// Returning `None` means the source is exhausted.
pub type ValueGenerator = Box<dyn FnMut() -> Option<Value> + Send>;

/// Generator yielding `values` in order, then nothing.
pub fn fixed_value_generator(values: Vec<Value>) -> ValueGenerator {
    let mut values = values.into_iter();
    Box::new(move || values.next())
}

struct QueueInner {
    values: VecDeque<Value>,
    generator: Option<ValueGenerator>,
    total_written: u64,
}

pub struct ChannelQueue {
    channel: Channel,
    inner: Mutex<QueueInner>,
}

impl ChannelQueue {
    pub fn new(channel: Channel) -> Self {
        let values = channel.initial_values.iter().cloned().collect();
        Self {
            channel,
            inner: Mutex::new(QueueInner { values, generator: None, total_written: 0 }),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn name(&self) -> &str {
        &self.channel.name
    }

    fn check_type(&self, value: &Value, what: &str) -> Result<()> {
        if value.conforms_to(&self.channel.ty) {
            Ok(())
        } else {
            Err(Error::type_mismatch(
                format!("{} channel '{}'", what, self.channel.name),
                &self.channel.ty,
                value.ty(),
            ))
        }
    }

    /// Enqueue a value. Single-value channels overwrite their current value.
    pub fn write(&self, value: Value) -> Result<()> {
        self.check_type(&value, "write to")?;
        trace!("channel {}: write {}", self.channel.name, value);
        let mut inner = self.inner.lock();
        if self.channel.kind == ChannelKind::SingleValue {
            inner.values.clear();
        }
        inner.values.push_back(value);
        inner.total_written += 1;
        Ok(())
    }

    /// Dequeue the oldest value, falling back to the generator when the
    /// queue is empty. Single-value channels return their value without
    /// consuming it.
    pub fn read(&self) -> Result<Option<Value>> {
        let mut inner = self.inner.lock();
        if self.channel.kind == ChannelKind::SingleValue {
            return Ok(inner.values.front().cloned());
        }
        if let Some(value) = inner.values.pop_front() {
            trace!("channel {}: read {}", self.channel.name, value);
            return Ok(Some(value));
        }
        let generated = match inner.generator.as_mut() {
            Some(generator) => generator(),
            None => None,
        };
        drop(inner);
        if let Some(value) = &generated {
            self.check_type(value, "generator for")?;
            trace!("channel {}: generated {}", self.channel.name, value);
        }
        Ok(generated)
    }

    /// Oldest stored value, if any. Never consults the generator.
    pub fn peek(&self) -> Option<Value> {
        self.inner.lock().values.front().cloned()
    }

    /// Whether no value is stored. Generated values are produced on demand
    /// and are not counted.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }

    pub fn size(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// Values written since construction, by procs or callers.
    pub fn total_written(&self) -> u64 {
        self.inner.lock().total_written
    }

    pub fn has_generator(&self) -> bool {
        self.inner.lock().generator.is_some()
    }

    /// Attach a generator consulted whenever the queue is empty on read.
    /// Explicitly written values always drain first.
    pub fn attach_generator(&self, generator: ValueGenerator) -> Result<()> {
        if self.channel.kind == ChannelKind::SingleValue {
            return Err(Error::InvalidArgument(format!(
                "cannot attach a generator to single-value channel '{}'",
                self.channel.name
            )));
        }
        let mut inner = self.inner.lock();
        if inner.generator.is_some() {
            return Err(Error::InvalidArgument(format!(
                "channel '{}' already has a generator",
                self.channel.name
            )));
        }
        inner.generator = Some(generator);
        Ok(())
    }

    /// Restore declared initial values. Send-receive queues are emptied
    /// first; other queues without initial values keep their contents.
    pub fn reset(&self) {
        if self.channel.initial_values.is_empty() && self.channel.ops != ChannelOps::SendReceive {
            return;
        }
        let mut inner = self.inner.lock();
        inner.values = self.channel.initial_values.iter().cloned().collect();
        trace!("channel {}: reset to {} values", self.channel.name, inner.values.len());
    }
}

impl std::fmt::Debug for ChannelQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ChannelQueue")
            .field("channel", &self.channel.name)
            .field("size", &inner.values.len())
            .field("generator", &inner.generator.is_some())
            .finish()
    }
}

// ============================================================================
// Queue Manager
// ============================================================================

/// All queues of a package, addressable by channel name or id.
#[derive(Debug)]
pub struct ChannelQueueManager {
    queues: Vec<Arc<ChannelQueue>>,
    name_to_idx: HashMap<String, usize>,
    id_to_idx: HashMap<u64, usize>,
}

impl ChannelQueueManager {
    pub fn new(package: &Package) -> Self {
        let mut queues = Vec::with_capacity(package.channels.len());
        let mut name_to_idx = HashMap::new();
        let mut id_to_idx = HashMap::new();
        for (idx, channel) in package.channels.iter().enumerate() {
            name_to_idx.insert(channel.name.clone(), idx);
            id_to_idx.insert(channel.id, idx);
            queues.push(Arc::new(ChannelQueue::new(channel.clone())));
        }
        Self { queues, name_to_idx, id_to_idx }
    }

    pub fn queue(&self, name: &str) -> Result<Arc<ChannelQueue>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no queue for channel '{}'", name)))
    }

    pub fn queue_by_id(&self, id: u64) -> Result<Arc<ChannelQueue>> {
        self.id_to_idx
            .get(&id)
            .map(|&idx| Arc::clone(&self.queues[idx]))
            .ok_or_else(|| Error::NotFound(format!("no queue for channel id {}", id)))
    }

    /// Borrowing lookup for evaluators.
    pub fn get(&self, name: &str) -> Option<&Arc<ChannelQueue>> {
        self.name_to_idx.get(name).map(|&idx| &self.queues[idx])
    }

    pub fn queues(&self) -> impl Iterator<Item = &Arc<ChannelQueue>> {
        self.queues.iter()
    }

    pub fn reset_state(&self) {
        for queue in &self.queues {
            queue.reset();
        }
    }
}
