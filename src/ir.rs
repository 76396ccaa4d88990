use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Identifier a link uses to reference one of the graph's nodes.
///
/// Numbers deserialize as [`NodeKey::Index`], strings as [`NodeKey::Name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for NodeKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for NodeKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Overrides the value derived from the node's links.
    #[serde(default)]
    pub fixed_value: Option<f64>,
}

impl FlowNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_fixed_value(mut self, value: f64) -> Self {
        self.fixed_value = Some(value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowLink {
    pub source: NodeKey,
    pub target: NodeKey,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Caller-owned flow graph. Layout never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub links: Vec<FlowLink>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: FlowNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Index of the node with `id`, appending one when it is missing.
    pub fn ensure_node(&mut self, id: &str) -> usize {
        match self.nodes.iter().position(|node| node.id.as_deref() == Some(id)) {
            Some(index) => index,
            None => self.add_node(FlowNode::new(id)),
        }
    }

    /// Adds a link between named nodes, creating either endpoint if needed.
    pub fn connect(&mut self, source: &str, target: &str, value: f64) {
        self.ensure_node(source);
        self.ensure_node(target);
        self.add_link(source, target, value);
    }

    /// Adds a link as given; endpoints are resolved when the graph is laid out.
    pub fn add_link(&mut self, source: impl Into<NodeKey>, target: impl Into<NodeKey>, value: f64) {
        self.links.push(FlowLink {
            source: source.into(),
            target: target.into(),
            value,
            group: None,
        });
    }

    /// Builds a graph from raw tabular records.
    ///
    /// Every record becomes a link; the node list is derived from the unique
    /// source/target ids in order of first appearance. Links reference nodes
    /// by name, so the result is meant to be laid out with
    /// [`NodeId::Key`](crate::layout::sankey::NodeId::Key).
    pub fn from_records(records: &[Value], accessors: &RecordAccessors) -> Self {
        let mut graph = Self::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (idx, record) in records.iter().enumerate() {
            let source = record.get(&accessors.source).and_then(scalar_to_string);
            let target = record.get(&accessors.target).and_then(scalar_to_string);
            let (Some(source), Some(target)) = (source, target) else {
                tracing::warn!(record = idx, "skipping record without source/target");
                continue;
            };
            for id in [&source, &target] {
                if seen.insert(id.clone()) {
                    graph.nodes.push(FlowNode::new(id.clone()));
                }
            }
            let value = record
                .get(&accessors.value)
                .and_then(scalar_to_f64)
                .unwrap_or(0.0);
            let group = accessors
                .group
                .as_deref()
                .and_then(|key| record.get(key))
                .and_then(scalar_to_string);
            graph.links.push(FlowLink {
                source: NodeKey::Name(source),
                target: NodeKey::Name(target),
                value,
                group,
            });
        }
        graph
    }
}

/// Field names used to read links out of raw records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordAccessors {
    pub source: String,
    pub target: String,
    pub value: String,
    pub group: Option<String>,
}

impl Default for RecordAccessors {
    fn default() -> Self {
        Self {
            source: "source".to_string(),
            target: "target".to_string(),
            value: "value".to_string(),
            group: None,
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
