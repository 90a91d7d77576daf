//! flowlineage core
//!
//! Workflow data model, stable diagnostic codes, the versioned report
//! schema, and configuration shared by every flowlineage crate.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod workflow;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use workflow::{
    macro_file_name, ConfigValue, Connection, DanglingConnection, Endpoint, MacroReference, Node,
    NodeId, ToolCategory, UnresolvedReason, WorkflowDocument,
};
pub use report::{Report, ReportSummary, ReportVersion};
pub use config::{Config, ConfigError, LayerConfig, MacroConfig, SeverityThreshold};
