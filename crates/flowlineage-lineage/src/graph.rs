//! Lineage graph (DAG) and traversal
//!
//! Stage-level data flow of one expanded workflow. Keeps forward and reverse
//! adjacency for impact analysis, alongside the ordered node and edge lists
//! that are serialized for downstream renderers.

use flowlineage_core::{NodeId, ToolCategory, UnresolvedReason};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use tracing::warn;

/// Pipeline stage of a lineage node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerLabel {
    Source,
    Intermediate,
    Sink,
}

impl LayerLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Intermediate => "intermediate",
            Self::Sink => "sink",
        }
    }
}

impl std::fmt::Display for LayerLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of an edge at its destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRole {
    /// Plain single-input data flow
    Data,

    /// Left side of a join
    Left,

    /// Right side of a join
    Right,

    /// N-th member of a union, in connection order
    UnionMember(usize),

    /// Any other named input anchor
    Port(String),
}

/// A processing stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageNode {
    pub id: NodeId,

    /// Originating "document#node" for diagnostics
    pub origin: String,

    pub name: String,
    pub category: ToolCategory,
    pub tool_type: String,

    /// Unresolved macro placeholder: the graph has a gap here
    pub incomplete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<UnresolvedReason>,

    /// Assigned by the layer classifier
    #[serde(default)]
    pub layer: Option<LayerLabel>,
}

/// A data-flow edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub source_port: String,
    pub target_port: String,
    pub role: EdgeRole,

    /// Output branch taken, when the source has several outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Serialized form of a lineage graph
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphData {
    name: String,
    source: PathBuf,
    nodes: Vec<LineageNode>,
    edges: Vec<LineageEdge>,
}

/// Nodes left over when a topological order does not exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Nodes that could not be ordered, in document order
    pub unsorted: Vec<NodeId>,

    /// Shortest cycle among them
    pub cycle: Vec<NodeId>,
}

/// Lineage DAG with forward and reverse adjacency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "GraphData", into = "GraphData")]
pub struct LineageGraph {
    /// Workflow name
    pub name: String,

    /// Workflow file
    pub source: PathBuf,

    nodes: Vec<LineageNode>,
    edges: Vec<LineageEdge>,

    /// Node id -> position in `nodes`
    index: HashMap<NodeId, usize>,

    /// Reverse edges: node -> distinct upstream neighbours
    parents: HashMap<NodeId, Vec<NodeId>>,

    /// Forward edges: node -> distinct downstream neighbours
    children: HashMap<NodeId, Vec<NodeId>>,

    /// Node -> positions in `edges` of every edge arriving at it
    in_edges: HashMap<NodeId, Vec<usize>>,

    /// Node -> positions in `edges` of every edge leaving it
    out_edges: HashMap<NodeId, Vec<usize>>,
}

impl From<GraphData> for LineageGraph {
    fn from(data: GraphData) -> Self {
        let mut graph = LineageGraph::new(data.name, data.source);
        for node in data.nodes {
            if !graph.add_node(node) {
                warn!(graph = %graph.name, "Duplicate node id in serialized graph ignored");
            }
        }
        for edge in data.edges {
            graph.add_edge(edge);
        }
        graph
    }
}

impl From<LineageGraph> for GraphData {
    fn from(graph: LineageGraph) -> Self {
        Self {
            name: graph.name,
            source: graph.source,
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}

impl LineageGraph {
    /// Create an empty graph
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
            in_edges: HashMap::new(),
            out_edges: HashMap::new(),
        }
    }

    /// Add a node; returns false and keeps the existing node if the id is taken
    pub fn add_node(&mut self, node: LineageNode) -> bool {
        if self.index.contains_key(&node.id) {
            return false;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Add an edge and update adjacency
    pub fn add_edge(&mut self, edge: LineageEdge) {
        let position = self.edges.len();
        self.in_edges.entry(edge.to.clone()).or_default().push(position);
        self.out_edges.entry(edge.from.clone()).or_default().push(position);

        let parents = self.parents.entry(edge.to.clone()).or_default();
        if !parents.contains(&edge.from) {
            parents.push(edge.from.clone());
        }

        let children = self.children.entry(edge.from.clone()).or_default();
        if !children.contains(&edge.to) {
            children.push(edge.to.clone());
        }

        self.edges.push(edge);
    }

    /// All nodes, in document order
    pub fn nodes(&self) -> &[LineageNode] {
        &self.nodes
    }

    /// All edges, in connection order
    pub fn edges(&self) -> &[LineageEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&LineageNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut LineageNode> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    /// Edges arriving at a node, in connection order
    pub fn incoming<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a LineageEdge> + 'a {
        Self::edge_list(&self.in_edges, id)
            .iter()
            .map(move |&i| &self.edges[i])
    }

    /// Edges leaving a node, in connection order
    pub fn outgoing<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a LineageEdge> + 'a {
        Self::edge_list(&self.out_edges, id)
            .iter()
            .map(move |&i| &self.edges[i])
    }

    fn edge_list<'a>(lists: &'a HashMap<NodeId, Vec<usize>>, id: &str) -> &'a [usize] {
        lists.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Get immediate parents (upstream neighbours) of a node
    pub fn parents(&self, node_id: &str) -> Vec<&NodeId> {
        self.parents
            .get(node_id)
            .map(|ids| ids.iter().collect())
            .unwrap_or_default()
    }

    /// Get immediate children (downstream neighbours) of a node
    pub fn children(&self, node_id: &str) -> Vec<&NodeId> {
        self.children
            .get(node_id)
            .map(|ids| ids.iter().collect())
            .unwrap_or_default()
    }

    /// Number of incoming edges
    pub fn in_degree(&self, node_id: &str) -> usize {
        Self::edge_list(&self.in_edges, node_id).len()
    }

    /// Number of outgoing edges
    pub fn out_degree(&self, node_id: &str) -> usize {
        Self::edge_list(&self.out_edges, node_id).len()
    }

    /// Get all downstream nodes (transitive closure of children)
    ///
    /// This is the blast radius of a node: every stage fed by it.
    pub fn downstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::closure(&self.children, node_id)
    }

    /// Get all upstream nodes (transitive closure of parents)
    pub fn upstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::closure(&self.parents, node_id)
    }

    /// BFS over one adjacency direction
    fn closure(adjacency: &HashMap<NodeId, Vec<NodeId>>, node_id: &str) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        if let Some(next) = adjacency.get(node_id) {
            queue.extend(next.iter().cloned());
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }

            if let Some(next) = adjacency.get(&current) {
                for id in next {
                    if !visited.contains(id) {
                        queue.push_back(id.clone());
                    }
                }
            }

            result.push(current);
        }

        result
    }

    /// Check if there's a path from source to target
    pub fn has_path(&self, source: &str, target: &str) -> bool {
        self.downstream(source).iter().any(|id| id == target)
    }

    /// Topological order of all nodes (Kahn's algorithm)
    ///
    /// Ties are broken by document order, so the result is deterministic.
    pub fn topological_sort(&self) -> Result<Vec<NodeId>, CycleReport> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), self.parents.get(&n.id).map_or(0, Vec::len)))
            .collect();

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            result.push(node.to_string());

            if let Some(children) = self.children.get(node) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(child.as_str());
                        }
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            return Ok(result);
        }

        let sorted: HashSet<&str> = result.iter().map(String::as_str).collect();
        let unsorted: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| !sorted.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        let cycle = self.shortest_cycle(&unsorted);

        Err(CycleReport { unsorted, cycle })
    }

    /// Shortest cycle through the given nodes, found by BFS from each of them
    fn shortest_cycle(&self, candidates: &[NodeId]) -> Vec<NodeId> {
        let allowed: HashSet<&str> = candidates.iter().map(String::as_str).collect();
        let mut best: Option<Vec<NodeId>> = None;

        for start in candidates {
            let mut previous: HashMap<&str, &str> = HashMap::new();
            let mut queue: VecDeque<&str> = VecDeque::from([start.as_str()]);
            let mut closing = None;

            'search: while let Some(current) = queue.pop_front() {
                for child in self.children(current) {
                    if child == start {
                        closing = Some(current);
                        break 'search;
                    }
                    if allowed.contains(child.as_str()) && !previous.contains_key(child.as_str()) {
                        previous.insert(child.as_str(), current);
                        queue.push_back(child.as_str());
                    }
                }
            }

            let Some(mut current) = closing else {
                continue;
            };

            let mut cycle = vec![current.to_string()];
            while current != start.as_str() {
                current = previous[current];
                cycle.push(current.to_string());
            }
            cycle.reverse();

            if best.as_ref().map_or(true, |b| cycle.len() < b.len()) {
                best = Some(cycle);
            }
        }

        best.unwrap_or_default()
    }

    /// Nodes with no incoming edges
    pub fn sources(&self) -> Vec<&LineageNode> {
        self.nodes.iter().filter(|n| self.in_degree(&n.id) == 0).collect()
    }

    /// Nodes with no outgoing edges
    pub fn sinks(&self) -> Vec<&LineageNode> {
        self.nodes.iter().filter(|n| self.out_degree(&n.id) == 0).collect()
    }

    /// Nodes classified into a layer
    pub fn nodes_in_layer(&self, layer: LayerLabel) -> Vec<&LineageNode> {
        self.nodes.iter().filter(|n| n.layer == Some(layer)).collect()
    }

    /// Unresolved macro placeholders
    pub fn incomplete_nodes(&self) -> Vec<&LineageNode> {
        self.nodes.iter().filter(|n| n.incomplete).collect()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl PartialEq for LineageGraph {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.source == other.source
            && self.nodes == other.nodes
            && self.edges == other.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(id: &str) -> LineageNode {
        LineageNode {
            id: id.to_string(),
            origin: format!("wf#{}", id),
            name: id.to_string(),
            category: ToolCategory::Transform,
            tool_type: String::new(),
            incomplete: false,
            unresolved: None,
            layer: None,
        }
    }

    fn edge(from: &str, to: &str) -> LineageEdge {
        LineageEdge {
            from: from.to_string(),
            to: to.to_string(),
            source_port: "Output".to_string(),
            target_port: "Input".to_string(),
            role: EdgeRole::Data,
            branch: None,
        }
    }

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> LineageGraph {
        let mut graph = LineageGraph::new("wf", "wf.yxmd");
        for id in ids {
            graph.add_node(node(id));
        }
        for (from, to) in edges {
            graph.add_edge(edge(from, to));
        }
        graph
    }

    #[test]
    fn downstream_impact() {
        let g = graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("a", "d")]);

        assert_eq!(g.downstream("a"), vec!["b", "d", "c"]);
        assert_eq!(g.upstream("c"), vec!["b", "a"]);
        assert!(g.has_path("a", "c"));
        assert!(!g.has_path("c", "a"));
    }

    #[test]
    fn parallel_edges_count_once_in_adjacency() {
        let g = graph(&["a", "j"], &[("a", "j"), ("a", "j")]);

        assert_eq!(g.parents("j"), vec!["a"]);
        assert_eq!(g.in_degree("j"), 2);
        assert_eq!(g.topological_sort().unwrap(), vec!["a", "j"]);
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut g = graph(&["a"], &[]);
        let mut again = node("a");
        again.name = "replacement".to_string();

        assert!(!g.add_node(again));
        assert_eq!(g.nodes().len(), 1);
        assert_eq!(g.node("a").unwrap().name, "a");
    }

    #[test]
    fn degrees_follow_edge_insertion() {
        let g = graph(
            &["a", "b", "c", "lonely"],
            &[("a", "b"), ("a", "c"), ("b", "c"), ("c", "a")],
        );

        assert_eq!((g.in_degree("a"), g.out_degree("a")), (1, 2));
        assert_eq!((g.in_degree("c"), g.out_degree("c")), (2, 1));
        assert_eq!((g.in_degree("lonely"), g.out_degree("lonely")), (0, 0));
        assert_eq!(g.in_degree("unknown"), 0);

        let into_c: Vec<&str> = g.incoming("c").map(|e| e.from.as_str()).collect();
        assert_eq!(into_c, vec!["a", "b"]);

        let sources: Vec<&str> = g.sources().iter().map(|n| n.id.as_str()).collect();
        let sinks: Vec<&str> = g.sinks().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(sources, vec!["lonely"]);
        assert_eq!(sinks, vec!["lonely"]);
    }

    #[test]
    fn topological_sort_follows_document_order() {
        let g = graph(&["x", "a", "b", "y"], &[("x", "y"), ("a", "b"), ("b", "y")]);
        assert_eq!(g.topological_sort().unwrap(), vec!["x", "a", "b", "y"]);
    }

    #[test]
    fn cycle_reports_unsorted_nodes_and_shortest_cycle() {
        let g = graph(
            &["s", "a", "b", "c", "d"],
            &[("s", "a"), ("a", "b"), ("b", "c"), ("c", "a"), ("b", "d"), ("d", "b")],
        );

        let report = g.topological_sort().unwrap_err();
        assert_eq!(report.unsorted, vec!["a", "b", "c", "d"]);
        assert_eq!(report.cycle, vec!["b", "d"]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(&["a"], &[("a", "a")]);
        let report = g.topological_sort().unwrap_err();
        assert_eq!(report.cycle, vec!["a"]);
    }

    #[test]
    fn json_round_trip_rebuilds_adjacency() {
        let g = graph(&["a", "b"], &[("a", "b")]);
        let json = g.to_json().unwrap();
        let back: LineageGraph = serde_json::from_str(&json).unwrap();

        assert_eq!(back, g);
        assert_eq!(back.children("a"), vec!["b"]);
    }
}
