//! Lineage graph construction
//!
//! Turns an expanded workflow document into a [`LineageGraph`]: one node per
//! tool (placeholders flagged incomplete), one edge per connection, with the
//! destination role of every edge preserved.

use crate::graph::{EdgeRole, LineageEdge, LineageGraph, LineageNode};
use flowlineage_core::{DanglingConnection, Node, NodeId, ToolCategory, WorkflowDocument};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Anchor name of a plain single input
const DEFAULT_INPUT_ANCHOR: &str = "Input";

/// Lineage construction errors
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    #[error("Workflow '{workflow}' reuses node id(s): {}", .ids.join(", "))]
    DuplicateNodes { workflow: String, ids: Vec<NodeId> },

    #[error("Workflow '{workflow}' has {} dangling connection(s)", .dangling.len())]
    DanglingConnections {
        workflow: String,
        dangling: Vec<DanglingConnection>,
    },

    #[error("Workflow '{workflow}' contains a cycle: {}", .cycle.join(" -> "))]
    StructuralCycle {
        workflow: String,
        cycle: Vec<NodeId>,
        unsorted: Vec<NodeId>,
    },
}

/// Builds lineage graphs from expanded documents
#[derive(Debug, Clone, Copy, Default)]
pub struct LineageGraphBuilder;

impl LineageGraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the lineage graph of one expanded document
    ///
    /// Deterministic: node order follows the document, edge order follows
    /// its connections.
    pub fn build(&self, document: &WorkflowDocument) -> Result<LineageGraph, LineageError> {
        let duplicates = document.duplicate_node_ids();
        if !duplicates.is_empty() {
            warn!(workflow = %document.name, ids = %duplicates.join(", "), "Duplicate node ids");
            return Err(LineageError::DuplicateNodes {
                workflow: document.name.clone(),
                ids: duplicates,
            });
        }

        let dangling = document.validate_connections();
        if !dangling.is_empty() {
            warn!(workflow = %document.name, count = dangling.len(), "Dangling connections");
            return Err(LineageError::DanglingConnections {
                workflow: document.name.clone(),
                dangling,
            });
        }

        let mut graph = LineageGraph::new(document.name.clone(), document.path.clone());
        for node in &document.nodes {
            // ids were checked to be distinct above
            graph.add_node(lineage_node(node));
        }

        let mut union_members: HashMap<&str, usize> = HashMap::new();
        for conn in &document.connections {
            // validate_connections guarantees both endpoints exist
            let (Some(source), Some(target)) = (document.node(&conn.from.node), document.node(&conn.to.node)) else {
                continue;
            };

            let role = match target.category {
                ToolCategory::Join if conn.to.port == "Left" => EdgeRole::Left,
                ToolCategory::Join if conn.to.port == "Right" => EdgeRole::Right,
                ToolCategory::Union => {
                    let member = union_members.entry(target.id.as_str()).or_insert(0);
                    *member += 1;
                    EdgeRole::UnionMember(*member - 1)
                }
                _ if conn.to.port == DEFAULT_INPUT_ANCHOR => EdgeRole::Data,
                _ => EdgeRole::Port(conn.to.port.clone()),
            };

            let branch = (source.output_ports.len() > 1).then(|| conn.from.port.clone());

            graph.add_edge(LineageEdge {
                from: conn.from.node.clone(),
                to: conn.to.node.clone(),
                source_port: conn.from.port.clone(),
                target_port: conn.to.port.clone(),
                role,
                branch,
            });
        }

        if let Err(report) = graph.topological_sort() {
            warn!(
                workflow = %document.name,
                cycle = %report.cycle.join(" -> "),
                "Workflow contains a structural cycle"
            );
            return Err(LineageError::StructuralCycle {
                workflow: document.name.clone(),
                cycle: report.cycle,
                unsorted: report.unsorted,
            });
        }

        debug!(
            workflow = %document.name,
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            "Built lineage graph"
        );

        Ok(graph)
    }
}

fn lineage_node(node: &Node) -> LineageNode {
    LineageNode {
        id: node.id.clone(),
        origin: node.origin.clone(),
        name: node.display_name().to_string(),
        category: node.category,
        tool_type: node.tool_type.clone(),
        incomplete: node.is_placeholder(),
        unresolved: node.unresolved.clone(),
        layer: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlineage_core::{Connection, MacroReference, UnresolvedReason};
    use pretty_assertions::assert_eq;

    fn join_workflow() -> WorkflowDocument {
        let mut doc = WorkflowDocument::new("orders", "orders.yxmd");
        doc.add_node(Node::new("1", ToolCategory::Input, "Customers"));
        doc.add_node(Node::new("2", ToolCategory::Input, "Orders"));
        doc.add_node(Node::new("3", ToolCategory::Join, "Join"));
        doc.add_node(Node::new("4", ToolCategory::Output, "Matched"));
        doc.add_node(Node::new("5", ToolCategory::Output, "Unmatched"));
        doc.connect(Connection::new("1", "Output", "3", "Left"));
        doc.connect(Connection::new("2", "Output", "3", "Right"));
        doc.connect(Connection::new("3", "Join", "4", "Input"));
        doc.connect(Connection::new("3", "Left", "5", "Input"));
        doc.derive_ports();
        doc
    }

    #[test]
    fn join_inputs_keep_their_sides() {
        let graph = LineageGraphBuilder::new().build(&join_workflow()).unwrap();
        let roles: Vec<&EdgeRole> = graph.incoming("3").map(|e| &e.role).collect();

        assert_eq!(roles, vec![&EdgeRole::Left, &EdgeRole::Right]);
    }

    #[test]
    fn multi_output_sources_tag_branches() {
        let graph = LineageGraphBuilder::new().build(&join_workflow()).unwrap();
        let branches: Vec<Option<&str>> = graph.outgoing("3").map(|e| e.branch.as_deref()).collect();

        assert_eq!(branches, vec![Some("Join"), Some("Left")]);
        assert_eq!(graph.incoming("3").next().unwrap().branch, None);
    }

    #[test]
    fn union_members_are_ordered_by_connection() {
        let mut doc = WorkflowDocument::new("union", "union.yxmd");
        for id in ["a", "b", "c"] {
            doc.add_node(Node::new(id, ToolCategory::Input, id));
        }
        doc.add_node(Node::new("u", ToolCategory::Union, "Union"));
        doc.connect(Connection::new("c", "Output", "u", "Input"));
        doc.connect(Connection::new("a", "Output", "u", "Input"));
        doc.connect(Connection::new("b", "Output", "u", "Input"));

        let graph = LineageGraphBuilder::new().build(&doc).unwrap();
        let members: Vec<(&str, &EdgeRole)> =
            graph.incoming("u").map(|e| (e.from.as_str(), &e.role)).collect();

        assert_eq!(
            members,
            vec![
                ("c", &EdgeRole::UnionMember(0)),
                ("a", &EdgeRole::UnionMember(1)),
                ("b", &EdgeRole::UnionMember(2)),
            ]
        );
    }

    #[test]
    fn named_anchors_become_port_roles() {
        let mut doc = WorkflowDocument::new("append", "append.yxmd");
        doc.add_node(Node::new("1", ToolCategory::Input, "Targets"));
        doc.add_node(Node::new("2", ToolCategory::Transform, "Append Fields"));
        doc.connect(Connection::new("1", "Output", "2", "Targets"));

        let graph = LineageGraphBuilder::new().build(&doc).unwrap();
        assert_eq!(graph.edges()[0].role, EdgeRole::Port("Targets".to_string()));
    }

    #[test]
    fn placeholders_are_incomplete_nodes() {
        let mut doc = WorkflowDocument::new("gap", "gap.yxmd");
        doc.add_node(Node::new("1", ToolCategory::Input, "in"));
        let mut placeholder = Node::macro_call("2", MacroReference::named("Ghost"));
        placeholder.unresolved = Some(UnresolvedReason::Missing);
        doc.add_node(placeholder);
        doc.connect(Connection::new("1", "Output", "2", "Input"));

        let graph = LineageGraphBuilder::new().build(&doc).unwrap();
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.incomplete_nodes()[0].id, "2");
        assert_eq!(graph.node("2").unwrap().unresolved, Some(UnresolvedReason::Missing));
    }

    #[test]
    fn dangling_connections_reject_the_document() {
        let mut doc = join_workflow();
        doc.connect(Connection::new("4", "Output", "42", "Input"));

        let err = LineageGraphBuilder::new().build(&doc).unwrap_err();
        match err {
            LineageError::DanglingConnections { dangling, .. } => assert_eq!(dangling[0].missing, "42"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn duplicate_ids_reject_the_document() {
        let mut doc = join_workflow();
        doc.add_node(Node::new("4", ToolCategory::Output, "Shadow"));

        let err = LineageGraphBuilder::new().build(&doc).unwrap_err();
        match err {
            LineageError::DuplicateNodes { workflow, ids } => {
                assert_eq!(workflow, "orders");
                assert_eq!(ids, vec!["4"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn cycles_reject_the_document() {
        let mut doc = WorkflowDocument::new("loop", "loop.yxmd");
        doc.add_node(Node::new("1", ToolCategory::Input, "in"));
        doc.add_node(Node::new("2", ToolCategory::Formula, "f"));
        doc.add_node(Node::new("3", ToolCategory::Filter, "g"));
        doc.connect(Connection::new("1", "Output", "2", "Input"));
        doc.connect(Connection::new("2", "Output", "3", "Input"));
        doc.connect(Connection::new("3", "True", "2", "Input"));

        let err = LineageGraphBuilder::new().build(&doc).unwrap_err();
        match err {
            LineageError::StructuralCycle { cycle, unsorted, .. } => {
                assert_eq!(cycle, vec!["2", "3"]);
                assert_eq!(unsorted, vec!["2", "3"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
