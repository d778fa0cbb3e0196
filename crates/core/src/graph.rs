//! Typed processing-graph document submitted to the rendering engine.
//!
//! The engine accepts a JSON object keyed by node id, where each node has
//! a `class_type` and an `inputs` map. An input is either a literal value
//! or a `[node_id, output_slot]` pair referencing another node's output.
//! [`ProcessingGraph`] models this shape with a tagged [`InputValue`] and
//! checks at construction time that every reference resolves and that the
//! reference graph is acyclic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Input name the save nodes use for their output filename prefix.
pub const FILENAME_PREFIX_INPUT: &str = "filename_prefix";

// ---------------------------------------------------------------------------
// Node inputs
// ---------------------------------------------------------------------------

/// Reference to output `slot` of node `node_id`.
///
/// Serializes as the engine's positional `["node_id", slot]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLink(pub String, pub u32);

impl NodeLink {
    pub fn node_id(&self) -> &str {
        &self.0
    }

    pub fn slot(&self) -> u32 {
        self.1
    }
}

/// A node input: a reference to another node, or any literal JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Link(NodeLink),
    Literal(serde_json::Value),
}

impl InputValue {
    /// A literal input value.
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Self::Literal(value.into())
    }

    /// A reference to output `slot` of `node_id`.
    pub fn link(node_id: impl Into<String>, slot: u32) -> Self {
        Self::Link(NodeLink(node_id.into(), slot))
    }

    pub fn as_link(&self) -> Option<&NodeLink> {
        match self {
            Self::Link(link) => Some(link),
            Self::Literal(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Literal(value) => value.as_str(),
            Self::Link(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A single operation in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Engine operation kind, e.g. `"KSampler"`.
    pub class_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputValue>,
    /// Editor metadata carried through untouched when present.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl GraphNode {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: BTreeMap::new(),
            meta: None,
        }
    }

    /// Add a literal input.
    pub fn with_input(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.inputs
            .insert(name.to_string(), InputValue::literal(value));
        self
    }

    /// Add an input wired to output `slot` of `node_id`.
    pub fn with_link(mut self, name: &str, node_id: &str, slot: u32) -> Self {
        self.inputs
            .insert(name.to_string(), InputValue::link(node_id, slot));
        self
    }

    fn links(&self) -> impl Iterator<Item = (&str, &NodeLink)> {
        self.inputs
            .iter()
            .filter_map(|(name, value)| value.as_link().map(|link| (name.as_str(), link)))
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A validated processing graph, keyed by node id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, GraphNode>",
    into = "BTreeMap<String, GraphNode>"
)]
pub struct ProcessingGraph {
    nodes: BTreeMap<String, GraphNode>,
}

impl ProcessingGraph {
    /// Build a graph, rejecting dangling references and cycles.
    pub fn new(nodes: BTreeMap<String, GraphNode>) -> Result<Self, CoreError> {
        validate_references(&nodes)?;
        validate_acyclic(&nodes)?;
        Ok(Self { nodes })
    }

    /// Parse a caller-supplied JSON document.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        if !value.is_object() {
            return Err(CoreError::InvalidFormat(
                "workflow must be a JSON object keyed by node id".to_string(),
            ));
        }
        let nodes: BTreeMap<String, GraphNode> = serde_json::from_value(value)
            .map_err(|e| CoreError::InvalidFormat(format!("malformed workflow node: {e}")))?;
        Self::new(nodes)
    }

    /// Serialize to the engine's JSON representation.
    pub fn to_json(&self) -> serde_json::Value {
        // Serializing string-keyed maps of plain data cannot fail.
        serde_json::to_value(&self.nodes).unwrap_or_default()
    }

    pub fn nodes(&self) -> &BTreeMap<String, GraphNode> {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Non-empty literal `filename_prefix` inputs, in node-id order.
    pub fn filename_prefixes(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter_map(|node| node.inputs.get(FILENAME_PREFIX_INPUT))
            .filter_map(InputValue::as_str)
            .filter(|prefix| !prefix.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl TryFrom<BTreeMap<String, GraphNode>> for ProcessingGraph {
    type Error = CoreError;

    fn try_from(nodes: BTreeMap<String, GraphNode>) -> Result<Self, Self::Error> {
        Self::new(nodes)
    }
}

impl From<ProcessingGraph> for BTreeMap<String, GraphNode> {
    fn from(graph: ProcessingGraph) -> Self {
        graph.nodes
    }
}

fn validate_references(nodes: &BTreeMap<String, GraphNode>) -> Result<(), CoreError> {
    for (id, node) in nodes {
        for (input, link) in node.links() {
            if !nodes.contains_key(link.node_id()) {
                return Err(CoreError::InvalidFormat(format!(
                    "node '{id}' input '{input}' references unknown node '{}'",
                    link.node_id()
                )));
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

fn validate_acyclic(nodes: &BTreeMap<String, GraphNode>) -> Result<(), CoreError> {
    let mut visits: BTreeMap<&str, Visit> = BTreeMap::new();
    for id in nodes.keys() {
        visit(id, nodes, &mut visits)?;
    }
    Ok(())
}

fn visit<'a>(
    id: &'a str,
    nodes: &'a BTreeMap<String, GraphNode>,
    visits: &mut BTreeMap<&'a str, Visit>,
) -> Result<(), CoreError> {
    match visits.get(id) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::InProgress) => {
            return Err(CoreError::InvalidFormat(format!(
                "workflow contains a reference cycle through node '{id}'"
            )));
        }
        None => {}
    }

    visits.insert(id, Visit::InProgress);
    if let Some(node) = nodes.get(id) {
        for (_, link) in node.links() {
            visit(link.node_id(), nodes, visits)?;
        }
    }
    visits.insert(id, Visit::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn two_node_json() -> serde_json::Value {
        json!({
            "1": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "model.safetensors" } },
            "2": { "class_type": "CLIPTextEncode", "inputs": { "text": "a cat", "clip": ["1", 1] } }
        })
    }

    #[test]
    fn parses_links_and_literals() {
        let graph = ProcessingGraph::from_json(two_node_json()).unwrap();
        let encode = graph.node("2").unwrap();
        assert_eq!(
            encode.inputs["clip"],
            InputValue::Link(NodeLink("1".into(), 1))
        );
        assert_eq!(encode.inputs["text"].as_str(), Some("a cat"));
    }

    #[test]
    fn serializes_back_to_engine_shape() {
        let graph = ProcessingGraph::from_json(two_node_json()).unwrap();
        assert_eq!(graph.to_json(), two_node_json());
    }

    #[test]
    fn dangling_reference_rejected() {
        let doc = json!({
            "2": { "class_type": "CLIPTextEncode", "inputs": { "clip": ["9", 1] } }
        });
        let err = ProcessingGraph::from_json(doc).unwrap_err();
        assert_matches!(err, CoreError::InvalidFormat(msg) if msg.contains("unknown node '9'"));
    }

    #[test]
    fn cycle_rejected() {
        let doc = json!({
            "1": { "class_type": "A", "inputs": { "x": ["2", 0] } },
            "2": { "class_type": "B", "inputs": { "y": ["1", 0] } }
        });
        let err = ProcessingGraph::from_json(doc).unwrap_err();
        assert_matches!(err, CoreError::InvalidFormat(msg) if msg.contains("cycle"));
    }

    #[test]
    fn self_reference_rejected() {
        let doc = json!({ "1": { "class_type": "A", "inputs": { "x": ["1", 0] } } });
        assert!(ProcessingGraph::from_json(doc).is_err());
    }

    #[test]
    fn non_object_rejected() {
        assert_matches!(
            ProcessingGraph::from_json(json!([1, 2])),
            Err(CoreError::InvalidFormat(_))
        );
    }

    #[test]
    fn node_without_class_type_rejected() {
        let doc = json!({ "1": { "inputs": {} } });
        assert_matches!(
            ProcessingGraph::from_json(doc),
            Err(CoreError::InvalidFormat(msg)) if msg.contains("malformed")
        );
    }

    #[test]
    fn numeric_arrays_stay_literal() {
        let doc = json!({ "1": { "class_type": "A", "inputs": { "size": [512, 512] } } });
        let graph = ProcessingGraph::from_json(doc).unwrap();
        assert!(graph.node("1").unwrap().inputs["size"].as_link().is_none());
    }

    #[test]
    fn meta_is_preserved() {
        let doc = json!({
            "1": { "class_type": "SaveImage", "inputs": {}, "_meta": { "title": "Save" } }
        });
        let graph = ProcessingGraph::from_json(doc.clone()).unwrap();
        assert_eq!(graph.to_json(), doc);
    }

    #[test]
    fn filename_prefixes_collects_non_empty_literals() {
        let doc = json!({
            "1": { "class_type": "SaveImage", "inputs": { "filename_prefix": "clip_a" } },
            "2": { "class_type": "SaveImage", "inputs": { "filename_prefix": "" } },
            "3": { "class_type": "SaveVideo", "inputs": { "filename_prefix": "clip_b" } }
        });
        let graph = ProcessingGraph::from_json(doc).unwrap();
        assert_eq!(graph.filename_prefixes(), vec!["clip_a", "clip_b"]);
    }

    #[test]
    fn deserialize_goes_through_validation() {
        let raw = r#"{"1": {"class_type": "A", "inputs": {"x": ["404", 0]}}}"#;
        assert!(serde_json::from_str::<ProcessingGraph>(raw).is_err());
    }
}
