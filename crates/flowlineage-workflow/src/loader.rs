//! Workflow file loading
//!
//! Parses Alteryx-style `.yxmd` / `.yxmc` / `.yxwz` XML into a
//! [`WorkflowDocument`]. Tool containers are flattened: tools nested in a
//! container's `ChildNodes` become ordinary nodes tagged with `container_id`.

use crate::tools::{category_for_plugin, display_name_for_plugin};
use crate::xml::{parse_document, Element};
use flowlineage_core::{
    ConfigValue, Connection, MacroReference, Node, ToolCategory, WorkflowDocument,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// File extensions accepted as workflow documents
pub const WORKFLOW_EXTENSIONS: &[&str] = &["yxmd", "yxmc", "yxwz"];

/// Default anchor names when a connection omits them
const DEFAULT_OUTPUT_ANCHOR: &str = "Output";
const DEFAULT_INPUT_ANCHOR: &str = "Input";

/// Loads workflow documents from disk
///
/// The macro resolver is generic over this seam so tests can serve
/// documents from memory.
pub trait WorkflowLoader {
    /// Load and parse one workflow file
    fn load(&self, path: &Path) -> Result<WorkflowDocument, LoadError>;
}

/// Workflow loading errors
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read workflow file {0}: {1}")]
    IoError(String, String),

    #[error("Unsupported workflow file type: {0}")]
    UnsupportedType(String),

    #[error("Failed to parse workflow {0}: {1}")]
    ParseError(String, String),
}

/// Loader for Alteryx XML workflow files
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlWorkflowLoader;

impl XmlWorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parse workflow XML that was read from `path`
    pub fn parse_str(&self, xml: &str, path: &Path) -> Result<WorkflowDocument, LoadError> {
        let root = parse_document(xml)
            .map_err(|e| LoadError::ParseError(path.display().to_string(), e.to_string()))?;

        if root.child("Nodes").is_none() {
            return Err(LoadError::ParseError(
                path.display().to_string(),
                format!("<{}> has no <Nodes> element", root.name),
            ));
        }

        let file_stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workflow".to_string());

        let properties = root.child("Properties");
        let name = properties
            .and_then(|p| p.path("MetaInfo/Name"))
            .and_then(Element::text)
            .map(str::to_string)
            .unwrap_or(file_stem);

        let mut document = WorkflowDocument::new(name, path);
        document.description = properties.and_then(|p| {
            p.path("MetaInfo/Description")
                .and_then(Element::text)
                .or_else(|| p.path("Annotation/DefaultAnnotationText").and_then(Element::text))
                .map(str::to_string)
        });

        if let Some(nodes) = root.child("Nodes") {
            for node_el in nodes.children_named("Node") {
                collect_nodes(node_el, None, &mut document);
            }
        }

        if let Some(connections) = root.child("Connections") {
            for conn_el in connections.children_named("Connection") {
                if let Some(connection) = parse_connection(conn_el) {
                    document.connect(connection);
                }
            }
        }

        document.derive_ports();

        debug!(
            workflow = %document.name,
            nodes = document.nodes.len(),
            connections = document.connections.len(),
            "Parsed workflow"
        );

        Ok(document)
    }
}

impl WorkflowLoader for XmlWorkflowLoader {
    fn load(&self, path: &Path) -> Result<WorkflowDocument, LoadError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if !WORKFLOW_EXTENSIONS.contains(&extension.as_str()) {
            return Err(LoadError::UnsupportedType(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| LoadError::IoError(path.display().to_string(), e.to_string()))?;

        self.parse_str(&contents, path)
    }
}

/// Parse a `<Node>` and any tools nested in its `<ChildNodes>`
fn collect_nodes(node_el: &Element, container: Option<&str>, document: &mut WorkflowDocument) {
    let Some(id) = node_el.attr("ToolID") else {
        debug!(workflow = %document.name, "Skipping <Node> without ToolID");
        return;
    };

    let mut node = parse_node(id, node_el);
    node.container_id = container.map(str::to_string);
    document.add_node(node);

    if let Some(children) = node_el.child("ChildNodes") {
        for child in children.children_named("Node") {
            collect_nodes(child, Some(id), document);
        }
    }
}

fn parse_node(id: &str, node_el: &Element) -> Node {
    let gui = node_el.child("GuiSettings");
    let plugin = gui.and_then(|g| g.attr("Plugin")).unwrap_or_default();
    let configuration = node_el.path("Properties/Configuration");
    let annotation = extract_annotation(node_el);

    let mut node = if plugin.is_empty() {
        let reference = match extract_macro_path(node_el) {
            Some(declared) => MacroReference::from_declared(declared),
            None => MacroReference::named(
                annotation.clone().unwrap_or_else(|| format!("Macro{}", id)),
            ),
        };
        Node::macro_call(id, reference)
    } else {
        Node::new(id, category_for_plugin(plugin), display_name_for_plugin(plugin))
            .with_tool_type(plugin)
    };

    if node.category == ToolCategory::Macro {
        if let Some(engine) = node_el.child("EngineSettings") {
            if let Some(macro_path) = engine.attr("Macro") {
                node.tool_type = macro_path.to_string();
            }
        }
    }

    node.annotation = annotation;
    if let Some(configuration) = configuration {
        node.config = element_entries(configuration);
    }

    node
}

/// Declared macro path from engine settings, GUI settings, or configuration
fn extract_macro_path(node_el: &Element) -> Option<String> {
    node_el
        .child("EngineSettings")
        .and_then(|e| e.attr("Macro"))
        .or_else(|| node_el.child("GuiSettings").and_then(|g| g.attr("Macro")))
        .or_else(|| node_el.path("Properties/Configuration/Macro").and_then(Element::text))
        .map(str::to_string)
}

fn extract_annotation(node_el: &Element) -> Option<String> {
    let annotation = node_el.path("Properties/Annotation")?;
    annotation
        .child("Name")
        .and_then(Element::text)
        .or_else(|| annotation.child("DefaultAnnotationText").and_then(Element::text))
        .map(str::to_string)
}

fn parse_connection(conn_el: &Element) -> Option<Connection> {
    let origin = conn_el.child("Origin")?;
    let destination = conn_el.child("Destination")?;

    Some(Connection::new(
        origin.attr("ToolID")?,
        origin.attr("Connection").unwrap_or(DEFAULT_OUTPUT_ANCHOR),
        destination.attr("ToolID")?,
        destination.attr("Connection").unwrap_or(DEFAULT_INPUT_ANCHOR),
    ))
}

/// Configuration value for an element: plain text for leaves, otherwise a map
fn element_value(el: &Element) -> ConfigValue {
    if el.children.is_empty() && el.attributes.is_empty() {
        ConfigValue::Text(el.text.trim().to_string())
    } else {
        ConfigValue::Map(element_entries(el))
    }
}

/// Attributes (`@name`), text (`#text`) and children of an element.
/// Repeated child tags collapse into a list in document order.
fn element_entries(el: &Element) -> BTreeMap<String, ConfigValue> {
    let mut map = BTreeMap::new();

    for (key, value) in &el.attributes {
        map.insert(format!("@{}", key), ConfigValue::Text(value.clone()));
    }

    if let Some(text) = el.text() {
        map.insert("#text".to_string(), ConfigValue::Text(text.to_string()));
    }

    for child in &el.children {
        let value = element_value(child);
        let merged = match map.remove(&child.name) {
            None => value,
            Some(ConfigValue::List(mut items)) => {
                items.push(value);
                ConfigValue::List(items)
            }
            Some(existing) => ConfigValue::List(vec![existing, value]),
        };
        map.insert(child.name.clone(), merged);
    }

    map
}
