//! Workflow document model
//!
//! In-memory representation of one parsed workflow file: nodes (tools),
//! connections between their anchors, and raw tool configuration.
//! Documents are produced by a loader and rewritten only by macro expansion.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Node identifier, unique within a document
pub type NodeId = String;

/// Tool category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Reads data into the workflow (file, database, text input)
    Input,

    /// Writes data out of the workflow
    Output,

    /// Interactive result viewer (terminal, sink-like)
    Browse,

    /// Row filter with True/False outputs
    Filter,

    /// Calculated fields
    Formula,

    /// Multi-input join with L/J/R outputs
    Join,

    /// Multi-input union
    Union,

    /// Group-by and aggregation
    Summarize,

    /// Field selection and renaming
    Select,

    /// Ordering
    Sort,

    /// Any other data-processing tool
    Transform,

    /// Reference to an external macro
    Macro,

    /// Macro boundary input (inside a macro definition)
    MacroInput,

    /// Macro boundary output (inside a macro definition)
    MacroOutput,

    /// Tool container (layout only)
    Container,

    /// Unrecognized plugin
    Unknown,
}

impl ToolCategory {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Browse => "browse",
            Self::Filter => "filter",
            Self::Formula => "formula",
            Self::Join => "join",
            Self::Union => "union",
            Self::Summarize => "summarize",
            Self::Select => "select",
            Self::Sort => "sort",
            Self::Transform => "transform",
            Self::Macro => "macro",
            Self::MacroInput => "macro_input",
            Self::MacroOutput => "macro_output",
            Self::Container => "container",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw tool configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Text(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Text content, if this is a leaf value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Look up a nested key in a map value
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }
}

/// Reference from a macro node to an externally defined workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacroReference {
    /// Macro name (file stem of the declared path when one exists)
    pub name: String,

    /// Path as declared in the referencing workflow
    pub declared_path: Option<String>,
}

impl MacroReference {
    /// Create a reference by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_path: None,
        }
    }

    /// Create a reference from a declared path, deriving the name from its stem
    pub fn from_declared(declared: impl Into<String>) -> Self {
        let declared = declared.into();
        let file_name = macro_file_name(&declared);
        let name = match file_name.rfind('.') {
            Some(dot) if dot > 0 => file_name[..dot].to_string(),
            _ => file_name.to_string(),
        };

        Self {
            name,
            declared_path: Some(declared),
        }
    }

    /// File name to look for when probing directories
    pub fn file_name(&self) -> String {
        match &self.declared_path {
            Some(declared) => macro_file_name(declared).to_string(),
            None => format!("{}.yxmc", self.name),
        }
    }
}

impl std::fmt::Display for MacroReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.declared_path {
            Some(path) if path != &self.name => write!(f, "{} ({})", self.name, path),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Final component of a declared path, accepting both `/` and `\` separators
pub fn macro_file_name(declared: &str) -> &str {
    declared
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(declared)
}

/// Why a macro reference was left as a placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Not found under any search location
    Missing,

    /// Operator chose to skip it
    Skipped,

    /// Located file could not be parsed
    Malformed { message: String },

    /// Port count disagrees with the macro's boundary nodes
    PortArity {
        expected_inputs: usize,
        found_inputs: usize,
        expected_outputs: usize,
        found_outputs: usize,
    },

    /// Macro transitively references itself
    Cyclic { chain: Vec<String> },
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "not found in any search location"),
            Self::Skipped => write!(f, "skipped by operator"),
            Self::Malformed { message } => write!(f, "failed to parse: {}", message),
            Self::PortArity {
                expected_inputs,
                found_inputs,
                expected_outputs,
                found_outputs,
            } => write!(
                f,
                "reference has {} input / {} output ports, definition has {} / {}",
                expected_inputs, expected_outputs, found_inputs, found_outputs
            ),
            Self::Cyclic { chain } => write!(f, "cyclic reference: {}", chain.join(" -> ")),
        }
    }
}

/// A tool in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique within the document
    pub id: NodeId,

    /// Raw plugin identifier (empty for macro references)
    pub tool_type: String,

    /// Display name
    pub name: String,

    /// Tool category
    pub category: ToolCategory,

    /// Raw configuration
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,

    /// Declared input anchors
    #[serde(default)]
    pub input_ports: Vec<String>,

    /// Declared output anchors
    #[serde(default)]
    pub output_ports: Vec<String>,

    /// User annotation
    #[serde(default)]
    pub annotation: Option<String>,

    /// Enclosing tool container
    #[serde(default)]
    pub container_id: Option<NodeId>,

    /// Macro reference (category Macro only)
    #[serde(default)]
    pub macro_ref: Option<MacroReference>,

    /// Set when this node is an unresolved macro placeholder
    #[serde(default)]
    pub unresolved: Option<UnresolvedReason>,

    /// Originating "document#node" for diagnostics
    #[serde(default)]
    pub origin: String,
}

impl Node {
    /// Create a node with empty configuration
    pub fn new(id: impl Into<NodeId>, category: ToolCategory, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_type: String::new(),
            name: name.into(),
            category,
            config: BTreeMap::new(),
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            annotation: None,
            container_id: None,
            macro_ref: None,
            unresolved: None,
            origin: String::new(),
        }
    }

    /// Create a macro reference node
    pub fn macro_call(id: impl Into<NodeId>, reference: MacroReference) -> Self {
        let mut node = Self::new(id, ToolCategory::Macro, reference.name.clone());
        node.macro_ref = Some(reference);
        node
    }

    /// Set the plugin identifier
    pub fn with_tool_type(mut self, tool_type: impl Into<String>) -> Self {
        self.tool_type = tool_type.into();
        self
    }

    /// Set declared ports
    pub fn with_ports(mut self, inputs: &[&str], outputs: &[&str]) -> Self {
        self.input_ports = inputs.iter().map(|p| p.to_string()).collect();
        self.output_ports = outputs.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Display name, falling back to annotation and then id
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if let Some(annotation) = &self.annotation {
            annotation
        } else {
            &self.id
        }
    }

    /// Whether this node still references an unexpanded macro
    pub fn is_macro_reference(&self) -> bool {
        self.category == ToolCategory::Macro && self.macro_ref.is_some() && self.unresolved.is_none()
    }

    /// Whether this node is an unresolved macro placeholder
    pub fn is_placeholder(&self) -> bool {
        self.unresolved.is_some()
    }
}

/// One side of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: String,
}

impl Endpoint {
    pub fn new(node: impl Into<NodeId>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
        }
    }
}

/// Directed data connection between two node anchors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from: Endpoint,
    pub to: Endpoint,
}

impl Connection {
    /// Connect `from.port` to `to.port`
    pub fn new(
        from: impl Into<NodeId>,
        from_port: impl Into<String>,
        to: impl Into<NodeId>,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from: Endpoint::new(from, from_port),
            to: Endpoint::new(to, to_port),
        }
    }
}

/// A connection whose endpoint does not exist in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingConnection {
    pub connection: Connection,
    pub missing: NodeId,
}

/// Parsed workflow file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Workflow name (metadata name or file stem)
    pub name: String,

    /// Source file
    pub path: PathBuf,

    /// Workflow description
    #[serde(default)]
    pub description: Option<String>,

    /// Tools, in document order
    pub nodes: Vec<Node>,

    /// Connections, in document order
    pub connections: Vec<Connection>,
}

impl WorkflowDocument {
    /// Create an empty document
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            description: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Add a node, stamping its origin
    pub fn add_node(&mut self, mut node: Node) {
        if node.origin.is_empty() {
            node.origin = format!("{}#{}", self.name, node.id);
        }
        self.nodes.push(node);
    }

    /// Add a connection
    pub fn connect(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Directory containing the source file
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Get a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get a mutable node by id
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Connections arriving at a node
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.to.node == id)
    }

    /// Connections leaving a node
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.from.node == id)
    }

    /// Nodes that still reference an unexpanded macro, in document order
    pub fn macro_references(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_macro_reference()).collect()
    }

    /// Unresolved macro placeholders
    pub fn placeholders(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_placeholder()).collect()
    }

    /// Macro boundary input nodes, in document order
    pub fn boundary_inputs(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.category == ToolCategory::MacroInput)
            .collect()
    }

    /// Macro boundary output nodes, in document order
    pub fn boundary_outputs(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.category == ToolCategory::MacroOutput)
            .collect()
    }

    /// Populate declared ports from the anchors used by connections
    ///
    /// Ports already declared are kept; anchors seen only in connections are
    /// appended. The result is ordered by anchor name with numeric suffixes
    /// compared numerically (`Input2` before `Input10`).
    pub fn derive_ports(&mut self) {
        for node in &mut self.nodes {
            for conn in &self.connections {
                if conn.to.node == node.id && !node.input_ports.contains(&conn.to.port) {
                    node.input_ports.push(conn.to.port.clone());
                }
                if conn.from.node == node.id && !node.output_ports.contains(&conn.from.port) {
                    node.output_ports.push(conn.from.port.clone());
                }
            }
            node.input_ports.sort_by_key(|p| port_sort_key(p));
            node.output_ports.sort_by_key(|p| port_sort_key(p));
        }
    }

    /// Find connections whose endpoints are not nodes of this document
    pub fn validate_connections(&self) -> Vec<DanglingConnection> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut dangling = Vec::new();

        for conn in &self.connections {
            for endpoint in [&conn.from, &conn.to] {
                if !ids.contains(endpoint.node.as_str()) {
                    dangling.push(DanglingConnection {
                        connection: conn.clone(),
                        missing: endpoint.node.clone(),
                    });
                }
            }
        }

        dangling
    }

    /// Node ids used by more than one node, each listed once in document order
    pub fn duplicate_node_ids(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut duplicates: Vec<NodeId> = Vec::new();

        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) && !duplicates.contains(&node.id) {
                duplicates.push(node.id.clone());
            }
        }

        duplicates
    }
}

/// Ordering key for anchor names: text prefix, then numeric suffix
fn port_sort_key(port: &str) -> (String, u64) {
    let split = port
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(port.len());
    let number = port[split..].parse().unwrap_or(0);
    (port[..split].to_string(), number)
}
