//! Packages, channels and procs

use serde::{Deserialize, Serialize};
use std::fmt;

use super::node::{Node, NodeId};
use super::types::Type;
use super::value::Value;
use crate::error::{Error, Result};

/// Queue discipline of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Streaming,
    SingleValue,
}

/// Operations a channel supports from inside the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOps {
    SendOnly,
    ReceiveOnly,
    SendReceive,
}

impl ChannelOps {
    pub fn supports_send(self) -> bool {
        matches!(self, ChannelOps::SendOnly | ChannelOps::SendReceive)
    }

    pub fn supports_receive(self) -> bool {
        matches!(self, ChannelOps::ReceiveOnly | ChannelOps::SendReceive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    #[default]
    None,
    ReadyValid,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelKind::Streaming => "streaming",
            ChannelKind::SingleValue => "single_value",
        })
    }
}

impl fmt::Display for ChannelOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelOps::SendOnly => "send_only",
            ChannelOps::ReceiveOnly => "receive_only",
            ChannelOps::SendReceive => "send_receive",
        })
    }
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlowControl::None => "none",
            FlowControl::ReadyValid => "ready_valid",
        })
    }
}

/// Channel declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub id: u64,
    pub kind: ChannelKind,
    pub ops: ChannelOps,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub flow_control: FlowControl,
    /// Carried through dump/parse; queues are unbounded at runtime.
    #[serde(default)]
    pub fifo_depth: Option<u64>,
    /// Pre-loaded into the queue at construction and on reset, in order.
    #[serde(default)]
    pub initial_values: Vec<Value>,
    #[serde(default)]
    pub metadata: String,
}

impl Channel {
    pub fn streaming(name: impl Into<String>, id: u64, ops: ChannelOps, ty: Type) -> Self {
        Self {
            name: name.into(),
            id,
            kind: ChannelKind::Streaming,
            ops,
            ty,
            flow_control: FlowControl::None,
            fifo_depth: None,
            initial_values: Vec::new(),
            metadata: String::new(),
        }
    }

    pub fn single_value(name: impl Into<String>, id: u64, ops: ChannelOps, ty: Type) -> Self {
        Self {
            kind: ChannelKind::SingleValue,
            ..Self::streaming(name, id, ops, ty)
        }
    }

    pub fn with_initial_values(mut self, values: Vec<Value>) -> Self {
        self.initial_values = values;
        self
    }
}

/// Proc state element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateElement {
    pub name: String,
    pub init: Value,
}

/// Process: token param, state elements, node arena and next declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proc {
    pub name: String,
    pub state: Vec<StateElement>,
    /// `nodes[0]` is the token param, `nodes[1..=state.len()]` the state params.
    pub nodes: Vec<Node>,
    pub next_token: NodeId,
    pub next_state: Vec<NodeId>,
}

impl Proc {
    pub fn token_param(&self) -> NodeId {
        NodeId(0)
    }

    pub fn state_param(&self, index: usize) -> NodeId {
        NodeId(index + 1)
    }

    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    pub fn initial_state(&self) -> Vec<Value> {
        self.state.iter().map(|s| s.init.clone()).collect()
    }

    /// Whether the proc performs any channel I/O.
    pub fn has_io(&self) -> bool {
        self.nodes.iter().any(|n| n.op.is_side_effecting())
    }

    /// Channel names this proc sends or receives on, in node order.
    pub fn channels(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for n in &self.nodes {
            if let Some(ch) = n.op.channel() {
                if !out.contains(&ch) {
                    out.push(ch);
                }
            }
        }
        out
    }
}

/// `file_number N "path"` entry that node positions refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNumber {
    pub number: u64,
    pub path: String,
}

/// A network of channels and procs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileNumber>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub procs: Vec<Proc>,
    /// Name of the proc marked `top`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), files: Vec::new(), channels: Vec::new(), procs: Vec::new(), top: None }
    }

    /// Add a channel; name and id must be unused.
    pub fn add_channel(&mut self, channel: Channel) -> Result<()> {
        if self.channel(&channel.name).is_some() {
            return Err(Error::InvalidArgument(format!(
                "channel '{}' already exists",
                channel.name
            )));
        }
        if self.channel_by_id(channel.id).is_some() {
            return Err(Error::InvalidArgument(format!(
                "channel id {} already in use",
                channel.id
            )));
        }
        self.channels.push(channel);
        Ok(())
    }

    /// Add a streaming channel with the next free id.
    pub fn create_streaming_channel(
        &mut self,
        name: &str,
        ops: ChannelOps,
        ty: Type,
        initial_values: Vec<Value>,
    ) -> Result<&Channel> {
        let id = self.next_channel_id();
        self.add_channel(Channel::streaming(name, id, ops, ty).with_initial_values(initial_values))?;
        Ok(&self.channels[self.channels.len() - 1])
    }

    /// Add a single-value channel with the next free id.
    pub fn create_single_value_channel(
        &mut self,
        name: &str,
        ops: ChannelOps,
        ty: Type,
    ) -> Result<&Channel> {
        let id = self.next_channel_id();
        self.add_channel(Channel::single_value(name, id, ops, ty))?;
        Ok(&self.channels[self.channels.len() - 1])
    }

    fn next_channel_id(&self) -> u64 {
        self.channels.iter().map(|c| c.id + 1).max().unwrap_or(0)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn channel_by_id(&self, id: u64) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn proc(&self, name: &str) -> Option<&Proc> {
        self.procs.iter().find(|p| p.name == name)
    }

    pub fn add_proc(&mut self, proc: Proc) -> Result<()> {
        if self.proc(&proc.name).is_some() {
            return Err(Error::InvalidArgument(format!("proc '{}' already exists", proc.name)));
        }
        self.procs.push(proc);
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let package: Package = serde::Deserialize::deserialize(&mut deserializer)?;
        super::verifier::verify_package(&package)?;
        Ok(package)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Names of the procs that send or receive on `channel`.
    pub fn procs_using_channel(&self, channel: &str) -> Vec<&str> {
        self.procs
            .iter()
            .filter(|p| p.nodes.iter().any(|n| matches!(n.op.channel(), Some(c) if c == channel)))
            .map(|p| p.name.as_str())
            .collect()
    }
}
