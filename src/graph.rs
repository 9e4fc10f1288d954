//! In-memory directed graph built from GraphML.
//!
//! Only the GraphML subset needed for reachability analysis is read: the
//! `edgedefault` attribute of the first `graph` element, the `id` of its `node`
//! children and the `source`/`target` of its `edge` children. Keys, data,
//! ports and nested graphs are ignored.

use crate::error::GraphParseError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// GraphML namespace written by `Graph::to_graphml`
pub const GRAPHML_NAMESPACE: &str = "http://graphml.graphdrawing.org/xmlns";

/// Node identifier as it appears in the GraphML `id` attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value of the `edgedefault` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeDefault {
    #[default]
    Directed,
    Undirected,
}

/// Directed graph: unique node ids plus an ordered edge list.
///
/// Edges may repeat, and an endpoint may name a node that is not in `nodes`;
/// such edges are kept but never traversed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId)>,
}

impl Graph {
    /// Build a graph from node ids and edges. Duplicate node ids keep their
    /// first occurrence.
    pub fn new(nodes: impl IntoIterator<Item = NodeId>, edges: Vec<(NodeId, NodeId)>) -> Self {
        let mut seen = HashSet::new();
        let nodes = nodes
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self { nodes, edges }
    }

    /// Convenience constructor from string slices.
    pub fn from_edges(nodes: &[&str], edges: &[(&str, &str)]) -> Self {
        Self::new(
            nodes.iter().map(|n| NodeId::new(*n)),
            edges
                .iter()
                .map(|(s, t)| (NodeId::new(*s), NodeId::new(*t)))
                .collect(),
        )
    }

    /// Parse a GraphML document.
    ///
    /// Undirected graphs are materialized as symmetric directed graphs: the
    /// reversed copy of every edge is appended after the original edge list,
    /// doubling its length.
    pub fn parse_graphml(text: &str) -> Result<Self, GraphParseError> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut parser = GraphmlParser::default();
        let mut depth = 0usize;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    depth += 1;
                    parser.open(&e, depth, true)?;
                }
                Event::Empty(e) => {
                    parser.open(&e, depth + 1, false)?;
                }
                Event::End(_) => {
                    parser.close(depth);
                    depth = depth.checked_sub(1).ok_or(GraphParseError::Unbalanced)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if depth != 0 {
            return Err(GraphParseError::Unbalanced);
        }

        let edge_default = parser.edge_default.ok_or(GraphParseError::MissingGraph)?;
        let mut edges = parser.edges;
        if edge_default == EdgeDefault::Undirected {
            let reversed: Vec<_> = edges.iter().map(|(s, t)| (t.clone(), s.clone())).collect();
            edges.extend(reversed);
        }

        Ok(Self::new(parser.nodes, edges))
    }

    /// Serialize as a directed GraphML document.
    pub fn to_graphml(&self) -> String {
        use quick_xml::escape::escape;

        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!("<graphml xmlns=\"{}\">\n", GRAPHML_NAMESPACE));
        out.push_str("  <graph id=\"G\" edgedefault=\"directed\">\n");
        for node in &self.nodes {
            out.push_str(&format!("    <node id=\"{}\"/>\n", escape(node.as_str())));
        }
        for (source, target) in &self.edges {
            out.push_str(&format!(
                "    <edge source=\"{}\" target=\"{}\"/>\n",
                escape(source.as_str()),
                escape(target.as_str())
            ));
        }
        out.push_str("  </graph>\n</graphml>\n");
        out
    }

    /// Subgraph of the nodes satisfying `keep`; an edge survives only when
    /// both endpoints do.
    pub fn induce<F>(&self, keep: F) -> Graph
    where
        F: Fn(&NodeId) -> bool,
    {
        Graph {
            nodes: self.nodes.iter().filter(|id| keep(id)).cloned().collect(),
            edges: self
                .edges
                .iter()
                .filter(|(s, t)| keep(s) && keep(t))
                .cloned()
                .collect(),
        }
    }

    /// Outdegree of every node, counted over the raw edge list (multi-edges
    /// count once each), in node order.
    pub fn out_degrees(&self) -> Vec<(NodeId, usize)> {
        let mut counts: HashMap<&NodeId, usize> = HashMap::new();
        for (source, _) in &self.edges {
            *counts.entry(source).or_insert(0) += 1;
        }
        self.nodes
            .iter()
            .map(|id| (id.clone(), counts.get(id).copied().unwrap_or(0)))
            .collect()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Default)]
struct GraphmlParser {
    /// Set once the graph element has been seen
    edge_default: Option<EdgeDefault>,
    /// Depth of the open graph element whose children are collected
    graph_depth: Option<usize>,
    nodes: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId)>,
}

impl GraphmlParser {
    fn open(&mut self, e: &BytesStart<'_>, depth: usize, has_children: bool) -> Result<(), GraphParseError> {
        let name = e.local_name();
        let name = name.as_ref();

        if depth == 2 && self.edge_default.is_none() && name == b"graph" {
            let edge_default = match attribute(e, b"edgedefault")?.as_deref() {
                Some("undirected") => EdgeDefault::Undirected,
                _ => EdgeDefault::Directed,
            };
            self.edge_default = Some(edge_default);
            if has_children {
                self.graph_depth = Some(depth);
            }
            return Ok(());
        }

        if self.graph_depth.map(|d| d + 1) != Some(depth) {
            return Ok(());
        }

        match name {
            b"node" => {
                let id = attribute(e, b"id")?.ok_or(GraphParseError::MissingAttribute {
                    element: "node",
                    attribute: "id",
                })?;
                self.nodes.push(NodeId(id));
            }
            b"edge" => {
                let source = attribute(e, b"source")?.ok_or(GraphParseError::MissingAttribute {
                    element: "edge",
                    attribute: "source",
                })?;
                let target = attribute(e, b"target")?.ok_or(GraphParseError::MissingAttribute {
                    element: "edge",
                    attribute: "target",
                })?;
                self.edges.push((NodeId(source), NodeId(target)));
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, depth: usize) {
        if self.graph_depth == Some(depth) {
            self.graph_depth = None;
        }
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, GraphParseError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
