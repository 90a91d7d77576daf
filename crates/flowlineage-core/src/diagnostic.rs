//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Macro resolution (1xxx)
    /// Macro could not be located under any search path
    MacroMissing,

    /// Macro transitively references itself
    MacroCyclicResolution,

    /// Macro reference port count disagrees with the definition's boundary nodes
    MacroPortArityMismatch,

    /// Located macro file failed to parse
    MacroMalformedSource,

    /// Operator skipped the macro
    MacroSkipped,

    // Lineage construction (2xxx)
    /// Expanded workflow contains a true cycle
    LineageStructuralCycle,

    // Workflow documents (3xxx)
    /// Connection endpoint does not exist in the document
    WorkflowDanglingConnection,

    /// Two tools in one document share a ToolID
    WorkflowDuplicateNode,

    /// Workflow file could not be loaded
    WorkflowLoadError,

    // General warnings (9xxx)
    /// General informational message
    Info,

    /// General warning message
    Warning,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MacroMissing => "MACRO_MISSING",
            Self::MacroCyclicResolution => "MACRO_CYCLIC_RESOLUTION",
            Self::MacroPortArityMismatch => "MACRO_PORT_ARITY_MISMATCH",
            Self::MacroMalformedSource => "MACRO_MALFORMED_SOURCE",
            Self::MacroSkipped => "MACRO_SKIPPED",
            Self::LineageStructuralCycle => "LINEAGE_STRUCTURAL_CYCLE",
            Self::WorkflowDanglingConnection => "WORKFLOW_DANGLING_CONNECTION",
            Self::WorkflowDuplicateNode => "WORKFLOW_DUPLICATE_NODE",
            Self::WorkflowLoadError => "WORKFLOW_LOAD_ERROR",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }

    /// Severity used when no override is configured
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::MacroMissing
            | Self::MacroPortArityMismatch
            | Self::MacroMalformedSource
            | Self::MacroSkipped
            | Self::Warning => Severity::Warn,
            Self::MacroCyclicResolution
            | Self::LineageStructuralCycle
            | Self::WorkflowDanglingConnection
            | Self::WorkflowDuplicateNode
            | Self::WorkflowLoadError => Severity::Error,
            Self::Info => Severity::Info,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue that should fail CI
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a workflow file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Workflow file path
    pub file: String,

    /// Node id within the workflow (diagnostic back-link)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            node: None,
        }
    }

    /// Create a location pointing at a node of a workflow
    pub fn with_node(file: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            node: Some(node.into()),
            ..Self::new(file)
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Expected value (e.g. reference port counts)
    pub expected: Option<String>,

    /// Actual value (e.g. definition port counts)
    pub actual: Option<String>,

    /// Downstream lineage stages impacted by this issue
    pub impact: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic at the code's default severity
    pub fn for_code(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, code.default_severity(), message)
    }

    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            expected: None,
            actual: None,
            impact: Vec::new(),
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set expected/actual values
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Set downstream impact
    pub fn with_impact(mut self, impact: Vec<String>) -> Self {
        self.impact = impact;
        self
    }
}
