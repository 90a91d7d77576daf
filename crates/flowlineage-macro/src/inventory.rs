//! Macro inventory
//!
//! Run-wide tally of every macro referenced by the processed workflows:
//! where it was found, its boundary port counts, which workflows use it,
//! and a structural fingerprint of its expanded definition.

use crate::cache::CacheEntry;
use crate::context::ResolutionContext;
use crate::resolver::ResolveOutcome;
use flowlineage_core::{UnresolvedReason, WorkflowDocument};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Resolution status of an inventoried macro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroStatus {
    Found,
    Missing,
    Skipped,
    Malformed,
    PortMismatch,
    Cyclic,
}

impl MacroStatus {
    fn from_reason(reason: &UnresolvedReason) -> Self {
        match reason {
            UnresolvedReason::Missing => Self::Missing,
            UnresolvedReason::Skipped => Self::Skipped,
            UnresolvedReason::Malformed { .. } => Self::Malformed,
            UnresolvedReason::PortArity { .. } => Self::PortMismatch,
            UnresolvedReason::Cyclic { .. } => Self::Cyclic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Missing => "missing",
            Self::Skipped => "skipped",
            Self::Malformed => "malformed",
            Self::PortMismatch => "port_mismatch",
            Self::Cyclic => "cyclic",
        }
    }
}

/// One macro in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroRecord {
    pub name: String,
    pub status: MacroStatus,
    pub resolved_path: Option<PathBuf>,
    pub inputs: usize,
    pub outputs: usize,

    /// SHA-256 over the expanded definition's nodes and connections
    pub fingerprint: Option<String>,

    /// Workflows that reference this macro, directly or through other macros
    pub used_by: BTreeSet<String>,
}

impl MacroRecord {
    fn new(name: &str, status: MacroStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            resolved_path: None,
            inputs: 0,
            outputs: 0,
            fingerprint: None,
            used_by: BTreeSet::new(),
        }
    }
}

/// Inventory totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total: usize,
    pub found: usize,
    pub missing: usize,
    pub shared: usize,
}

/// Macros seen during one run, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroInventory {
    macros: BTreeMap<String, MacroRecord>,
}

impl MacroInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the macros one workflow's resolution touched
    pub fn record(&mut self, workflow: &str, outcome: &ResolveOutcome, context: &ResolutionContext) {
        for expanded in &outcome.expanded {
            let record = self
                .macros
                .entry(expanded.reference.name.clone())
                .or_insert_with(|| MacroRecord::new(&expanded.reference.name, MacroStatus::Found));

            record.status = MacroStatus::Found;
            record.resolved_path = Some(expanded.path.clone());
            record.inputs = expanded.inputs;
            record.outputs = expanded.outputs;
            if record.fingerprint.is_none() {
                if let Some(CacheEntry::Resolved(resolved)) = context.cache().get_path(&expanded.path) {
                    record.fingerprint = Some(fingerprint(&resolved.definition));
                }
            }
            record.used_by.insert(workflow.to_string());
        }

        for issue in &outcome.issues {
            let status = MacroStatus::from_reason(&issue.reason);
            let record = self
                .macros
                .entry(issue.reference.name.clone())
                .or_insert_with(|| MacroRecord::new(&issue.reference.name, status));

            if record.status != MacroStatus::Found {
                record.status = status;
            }
            record.used_by.insert(workflow.to_string());
        }
    }

    /// All records, ordered by macro name
    pub fn records(&self) -> impl Iterator<Item = &MacroRecord> {
        self.macros.values()
    }

    pub fn get(&self, name: &str) -> Option<&MacroRecord> {
        self.macros.get(name)
    }

    /// Macros used by more than one workflow
    pub fn shared(&self) -> Vec<&MacroRecord> {
        self.records().filter(|r| r.used_by.len() > 1).collect()
    }

    /// Macros that could not be expanded anywhere
    pub fn missing(&self) -> Vec<&MacroRecord> {
        self.records()
            .filter(|r| r.status != MacroStatus::Found)
            .collect()
    }

    pub fn summary(&self) -> InventorySummary {
        let missing = self.missing().len();
        InventorySummary {
            total: self.macros.len(),
            found: self.macros.len() - missing,
            missing,
            shared: self.shared().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// Order-independent structural hash of a definition
pub fn fingerprint(definition: &WorkflowDocument) -> String {
    let mut hasher = Sha256::new();

    let mut nodes: Vec<_> = definition.nodes.iter().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    for node in nodes {
        hasher.update(node.id.as_bytes());
        hasher.update(node.tool_type.as_bytes());
        hasher.update(node.category.as_str().as_bytes());
    }

    let mut connections: Vec<_> = definition.connections.iter().collect();
    connections.sort_by(|a, b| {
        (&a.from.node, &a.from.port, &a.to.node, &a.to.port)
            .cmp(&(&b.from.node, &b.from.port, &b.to.node, &b.to.port))
    });
    for conn in connections {
        hasher.update(conn.from.node.as_bytes());
        hasher.update(conn.from.port.as_bytes());
        hasher.update(conn.to.node.as_bytes());
        hasher.update(conn.to.port.as_bytes());
    }

    hex::encode(hasher.finalize())
}
