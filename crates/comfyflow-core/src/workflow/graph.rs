//! ComfyUI prompt graph.
//!
//! The wire format is a JSON object keyed by stringified node id:
//!
//! ```json
//! { "1": { "class_type": "UNETLoader", "inputs": { "unet_name": "flux1-dev.safetensors" },
//!          "_meta": { "title": "UNET Loader" } },
//!   "2": { "class_type": "VAEDecode", "inputs": { "samples": ["1", 0] }, "_meta": { ... } } }
//! ```
//!
//! An input is either a literal value or a link `[node_id, output_index]`.

use comfyflow_abstraction::{EngineError, WorkflowError, WorkflowReason};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a node within one graph. Serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A reference to one output slot of another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub node: NodeId,
    pub output: u32,
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.node, self.output).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (node, output) = <(NodeId, u32)>::deserialize(deserializer)?;
        Ok(Self { node, output })
    }
}

/// A node input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Link(Link),
    Value(Value),
}

impl Input {
    pub const fn as_link(&self) -> Option<Link> {
        match self {
            Self::Link(link) => Some(*link),
            Self::Value(_) => None,
        }
    }

    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Link(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub title: String,
}

/// One operation in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub class_type: String,
    pub inputs: BTreeMap<String, Input>,
    #[serde(rename = "_meta", default)]
    pub meta: NodeMeta,
}

impl Node {
    pub fn new(class_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: BTreeMap::new(),
            meta: NodeMeta { title: title.into() },
        }
    }

    /// Sets a literal input.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.to_string(), Input::Value(value.into()));
        self
    }

    /// Connects an input to `output` of `node`.
    #[must_use]
    pub fn link(mut self, name: &str, node: NodeId, output: u32) -> Self {
        self.inputs.insert(name.to_string(), Input::Link(Link { node, output }));
        self
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.get(name)
    }

    /// The literal value of an input, if it is not a link.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).and_then(Input::as_value)
    }

    /// Iterates over linked inputs.
    pub fn links(&self) -> impl Iterator<Item = (&str, Link)> {
        self.inputs.iter().filter_map(|(k, v)| v.as_link().map(|l| (k.as_str(), l)))
    }
}

/// Structural defects of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {from} input '{input}' references missing node {target}")]
    DanglingReference { from: NodeId, input: String, target: NodeId },

    #[error("output node {0} does not exist")]
    MissingOutput(NodeId),

    #[error("workflow has no output nodes")]
    NoOutputs,

    #[error("cycle detected through node {0}")]
    Cycle(NodeId),

    #[error("parameter target {node}.{input} does not exist")]
    MissingBindingTarget { node: NodeId, input: String },
}

impl From<GraphError> for EngineError {
    fn from(err: GraphError) -> Self {
        WorkflowError::new(WorkflowReason::InvalidConfig, format!("Invalid workflow graph: {}", err))
            .into()
    }
}

/// A ComfyUI prompt graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: BTreeMap<NodeId, Node>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node under the next free id (ids start at 1).
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.keys().next_back().map_or(1, |last| last.0 + 1));
        self.nodes.insert(id, node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Nodes of one class, in id order.
    pub fn nodes_of_class<'a>(&'a self, class_type: &'a str) -> impl Iterator<Item = (NodeId, &'a Node)> {
        self.iter().filter(move |(_, node)| node.class_type == class_type)
    }

    /// Checks that every link resolves, every output exists and the graph is
    /// acyclic.
    pub fn validate(&self, outputs: &[NodeId]) -> Result<(), GraphError> {
        if outputs.is_empty() {
            return Err(GraphError::NoOutputs);
        }
        if let Some(missing) = outputs.iter().find(|id| !self.nodes.contains_key(id)) {
            return Err(GraphError::MissingOutput(*missing));
        }

        for (from, node) in &self.nodes {
            for (input, link) in node.links() {
                if !self.nodes.contains_key(&link.node) {
                    return Err(GraphError::DanglingReference {
                        from: *from,
                        input: input.to_string(),
                        target: link.node,
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        for id in self.nodes.keys() {
            if !visited.contains(id) {
                self.dfs_cycle(*id, &mut visited, &mut rec_stack)?;
            }
        }
        Ok(())
    }

    fn dfs_cycle(
        &self,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
        rec_stack: &mut HashSet<NodeId>,
    ) -> Result<(), GraphError> {
        visited.insert(id);
        rec_stack.insert(id);

        if let Some(node) = self.nodes.get(&id) {
            for (_, link) in node.links() {
                if rec_stack.contains(&link.node) {
                    return Err(GraphError::Cycle(link.node));
                }
                if !visited.contains(&link.node) {
                    self.dfs_cycle(link.node, visited, rec_stack)?;
                }
            }
        }

        rec_stack.remove(&id);
        Ok(())
    }
}
