//! Layer classification
//!
//! Labels every lineage node `source`, `intermediate` or `sink` from its
//! degree and tool category. Rules, checked in order:
//! 1. no incoming edges and a source-like or ambiguous category: `source`
//! 2. no outgoing edges and a sink-like or ambiguous category: `sink`
//! 3. otherwise `intermediate`
//!
//! An isolated ambiguous node therefore lands in `source`.

use crate::graph::{LayerLabel, LineageGraph, LineageNode};
use flowlineage_core::{LayerConfig, ToolCategory};

/// What a node's category suggests about its stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Source,
    Sink,
    Transform,
    Ambiguous,
}

/// Assigns layer labels
#[derive(Debug, Clone, Default)]
pub struct LayerClassifier {
    config: LayerConfig,
}

impl LayerClassifier {
    pub fn new(config: LayerConfig) -> Self {
        Self { config }
    }

    /// Stage affinity of a node; configured tool patterns win over category
    pub fn affinity(&self, node: &LineageNode) -> Affinity {
        if !node.tool_type.is_empty() {
            if self.config.is_source_tool(&node.tool_type) {
                return Affinity::Source;
            }
            if self.config.is_sink_tool(&node.tool_type) {
                return Affinity::Sink;
            }
        }

        match node.category {
            ToolCategory::Input => Affinity::Source,
            ToolCategory::Output | ToolCategory::Browse => Affinity::Sink,
            ToolCategory::Filter
            | ToolCategory::Formula
            | ToolCategory::Join
            | ToolCategory::Union
            | ToolCategory::Summarize
            | ToolCategory::Select
            | ToolCategory::Sort
            | ToolCategory::Transform
            | ToolCategory::Container => Affinity::Transform,
            ToolCategory::Macro
            | ToolCategory::MacroInput
            | ToolCategory::MacroOutput
            | ToolCategory::Unknown => Affinity::Ambiguous,
        }
    }

    /// Label for one node of `graph`
    pub fn label(&self, graph: &LineageGraph, node: &LineageNode) -> LayerLabel {
        let affinity = self.affinity(node);

        if graph.in_degree(&node.id) == 0 && matches!(affinity, Affinity::Source | Affinity::Ambiguous) {
            LayerLabel::Source
        } else if graph.out_degree(&node.id) == 0 && matches!(affinity, Affinity::Sink | Affinity::Ambiguous) {
            LayerLabel::Sink
        } else {
            LayerLabel::Intermediate
        }
    }

    /// Annotate every node of `graph` with its layer
    pub fn classify(&self, graph: &mut LineageGraph) {
        let labels: Vec<(String, LayerLabel)> = graph
            .nodes()
            .iter()
            .map(|node| (node.id.clone(), self.label(graph, node)))
            .collect();

        for (id, label) in labels {
            if let Some(node) = graph.node_mut(&id) {
                node.layer = Some(label);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeRole, LineageEdge};

    fn node(id: &str, category: ToolCategory, tool_type: &str) -> LineageNode {
        LineageNode {
            id: id.to_string(),
            origin: format!("wf#{}", id),
            name: id.to_string(),
            category,
            tool_type: tool_type.to_string(),
            incomplete: false,
            unresolved: None,
            layer: None,
        }
    }

    fn link(graph: &mut LineageGraph, from: &str, to: &str) {
        graph.add_edge(LineageEdge {
            from: from.to_string(),
            to: to.to_string(),
            source_port: "Output".to_string(),
            target_port: "Input".to_string(),
            role: EdgeRole::Data,
            branch: None,
        });
    }

    fn classified(graph: &mut LineageGraph, config: LayerConfig) -> Vec<(String, LayerLabel)> {
        LayerClassifier::new(config).classify(graph);
        graph
            .nodes()
            .iter()
            .map(|n| (n.id.clone(), n.layer.unwrap()))
            .collect()
    }

    #[test]
    fn linear_pipeline() {
        let mut graph = LineageGraph::new("wf", "wf.yxmd");
        graph.add_node(node("in", ToolCategory::Input, ""));
        graph.add_node(node("f", ToolCategory::Formula, ""));
        graph.add_node(node("out", ToolCategory::Output, ""));
        link(&mut graph, "in", "f");
        link(&mut graph, "f", "out");

        assert_eq!(
            classified(&mut graph, LayerConfig::default()),
            vec![
                ("in".to_string(), LayerLabel::Source),
                ("f".to_string(), LayerLabel::Intermediate),
                ("out".to_string(), LayerLabel::Sink),
            ]
        );
        assert_eq!(graph.nodes_in_layer(LayerLabel::Sink).len(), 1);
    }

    #[test]
    fn isolated_ambiguous_node_is_source() {
        let mut graph = LineageGraph::new("wf", "wf.yxmd");
        graph.add_node(node("ghost", ToolCategory::Macro, ""));
        graph.add_node(node("odd", ToolCategory::Unknown, "Vendor.Widget"));

        let labels = classified(&mut graph, LayerConfig::default());
        assert!(labels.iter().all(|(_, label)| *label == LayerLabel::Source));
    }

    #[test]
    fn ambiguous_terminal_node_is_sink() {
        let mut graph = LineageGraph::new("wf", "wf.yxmd");
        graph.add_node(node("in", ToolCategory::Input, ""));
        graph.add_node(node("ghost", ToolCategory::Macro, ""));
        link(&mut graph, "in", "ghost");

        let labels = classified(&mut graph, LayerConfig::default());
        assert_eq!(labels[1].1, LayerLabel::Sink);
    }

    #[test]
    fn dangling_transforms_stay_intermediate() {
        let mut graph = LineageGraph::new("wf", "wf.yxmd");
        graph.add_node(node("in", ToolCategory::Input, ""));
        graph.add_node(node("sort", ToolCategory::Sort, ""));
        link(&mut graph, "in", "sort");

        let labels = classified(&mut graph, LayerConfig::default());
        assert_eq!(labels[1].1, LayerLabel::Intermediate);
    }

    #[test]
    fn configured_patterns_override_category() {
        let config = LayerConfig {
            source_tools: vec!["*GenerateRows*".to_string()],
            sink_tools: vec!["*Email*".to_string()],
        };

        let mut graph = LineageGraph::new("wf", "wf.yxmd");
        graph.add_node(node("gen", ToolCategory::Transform, "AlteryxBasePluginsGui.GenerateRows.GenerateRows"));
        graph.add_node(node("mail", ToolCategory::Transform, "AlteryxBasePluginsGui.Email.Email"));
        link(&mut graph, "gen", "mail");

        assert_eq!(
            classified(&mut graph, config),
            vec![
                ("gen".to_string(), LayerLabel::Source),
                ("mail".to_string(), LayerLabel::Sink),
            ]
        );
    }
}
