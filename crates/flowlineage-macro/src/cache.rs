//! Resolution cache
//!
//! Process-scoped memory of one run. Expanded definitions are keyed by
//! canonical path so two spellings of the same file share one expansion.
//! Operator answers are keyed by the reference (name + declared path) so the
//! same reference is never asked about twice. Plain search misses are not
//! remembered: every document searches its own directories first. Entries
//! are never evicted.

use crate::issue::MacroIssue;
use flowlineage_core::{MacroReference, UnresolvedReason, WorkflowDocument};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A macro referenced and expanded somewhere inside a definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedMacro {
    pub reference: MacroReference,
    pub path: PathBuf,
    pub inputs: usize,
    pub outputs: usize,
}

/// A fully expanded macro definition
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMacro {
    /// Canonical path of the definition file
    pub path: PathBuf,

    /// Definition with all nested macros already spliced in
    pub definition: WorkflowDocument,

    /// Issues raised while expanding nested references
    pub issues: Vec<MacroIssue>,

    /// Nested macros expanded into the definition
    pub uses: Vec<ExpandedMacro>,
}

impl ResolvedMacro {
    pub fn input_count(&self) -> usize {
        self.definition.boundary_inputs().len()
    }

    pub fn output_count(&self) -> usize {
        self.definition.boundary_outputs().len()
    }
}

/// Terminal outcome of resolving a reference
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Resolved(Arc<ResolvedMacro>),
    Unresolved(UnresolvedReason),
}

impl CacheEntry {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// What the operator answered for a reference that search could not locate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorDecision {
    /// A definition file, either given directly or found in a supplied directory
    Located(PathBuf),

    /// Skipped, declined, or no usable answer within the attempt limit
    Unresolved(UnresolvedReason),
}

/// Path-keyed definitions and reference-keyed operator decisions
#[derive(Debug, Default)]
pub struct ResolutionCache {
    by_path: HashMap<PathBuf, CacheEntry>,
    decisions: HashMap<MacroReference, OperatorDecision>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached outcome for a located definition file
    pub fn get_path(&self, path: &Path) -> Option<&CacheEntry> {
        self.by_path.get(path)
    }

    /// Record the outcome for a definition file
    pub fn insert_path(&mut self, path: PathBuf, entry: CacheEntry) {
        self.by_path.insert(path, entry);
    }

    /// Earlier operator answer for a reference
    pub fn decision(&self, reference: &MacroReference) -> Option<&OperatorDecision> {
        self.decisions.get(reference)
    }

    pub fn record_decision(&mut self, reference: MacroReference, decision: OperatorDecision) {
        self.decisions.insert(reference, decision);
    }

    /// Number of definition files recorded
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty() && self.decisions.is_empty()
    }

    /// All recorded operator decisions
    pub fn decisions(&self) -> impl Iterator<Item = (&MacroReference, &OperatorDecision)> {
        self.decisions.iter()
    }
}
