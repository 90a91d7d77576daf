//! Resolution issues
//!
//! Every reference that could not be expanded produces one [`MacroIssue`].
//! Issues never abort a run; the pipeline turns them into diagnostics.

use flowlineage_core::{
    Diagnostic, DiagnosticCode, Location, MacroReference, NodeId, UnresolvedReason,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An unresolved macro reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroIssue {
    /// The reference that failed
    pub reference: MacroReference,

    /// Document the placeholder node belongs to
    ///
    /// For references nested inside macros this is the outermost document
    /// the definition was spliced into, not the macro file.
    pub document: PathBuf,

    /// Placeholder node id in `document`
    pub node: NodeId,

    /// Originating "document#node" of the reference, before any splicing
    pub origin: String,

    /// Why the reference is unresolved
    pub reason: UnresolvedReason,
}

impl MacroIssue {
    /// Diagnostic code for this issue's reason
    pub fn code(&self) -> DiagnosticCode {
        match self.reason {
            UnresolvedReason::Missing => DiagnosticCode::MacroMissing,
            UnresolvedReason::Skipped => DiagnosticCode::MacroSkipped,
            UnresolvedReason::Malformed { .. } => DiagnosticCode::MacroMalformedSource,
            UnresolvedReason::PortArity { .. } => DiagnosticCode::MacroPortArityMismatch,
            UnresolvedReason::Cyclic { .. } => DiagnosticCode::MacroCyclicResolution,
        }
    }

    /// Whether this issue excludes the whole document from lineage building
    pub fn is_fatal(&self) -> bool {
        matches!(self.reason, UnresolvedReason::Cyclic { .. })
    }

    /// The same issue seen from a document that spliced in its definition
    ///
    /// Node ids of spliced macro internals are prefixed with the call site
    /// and now live in the caller's document.
    pub fn relocated(&self, call_site: &str, caller: &Path) -> Self {
        Self {
            document: caller.to_path_buf(),
            node: format!("{}/{}", call_site, self.node),
            ..self.clone()
        }
    }

    /// Convert into a report diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = format!(
            "Macro '{}' referenced at {}: {}",
            self.reference, self.origin, self.reason
        );

        let diagnostic = Diagnostic::for_code(self.code(), message).with_location(
            Location::with_node(
                self.document.display().to_string(),
                self.node.clone(),
            ),
        );

        match &self.reason {
            UnresolvedReason::PortArity {
                expected_inputs,
                found_inputs,
                expected_outputs,
                found_outputs,
            } => diagnostic.with_comparison(
                format!("{} inputs, {} outputs", expected_inputs, expected_outputs),
                format!("{} inputs, {} outputs", found_inputs, found_outputs),
            ),
            _ => diagnostic,
        }
    }
}
