//! Batch lineage pipeline
//!
//! load -> resolve -> build -> classify, one document at a time against a
//! shared resolution context. A broken document is recorded as a failure and
//! the batch moves on; nothing here aborts the run.

use crate::builder::{LineageError, LineageGraphBuilder};
use crate::graph::LineageGraph;
use crate::layers::LayerClassifier;
use flowlineage_core::{
    Config, Diagnostic, DiagnosticCode, Location, Report, SeverityThreshold,
};
use flowlineage_macro::{
    MacroInventory, MacroIssue, MacroResolver, ResolutionContext, ResolutionPolicy, ResolveError,
    ResolverOptions,
};
use flowlineage_workflow::{WorkflowLoader, XmlWorkflowLoader};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Why a document produced no graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    LoadError,
    DuplicateNode,
    DanglingConnection,
    CyclicMacro,
    StructuralCycle,
}

/// A document excluded from the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub path: PathBuf,

    /// Workflow name, when the document could be loaded
    pub workflow: Option<String>,

    pub kind: FailureKind,
    pub message: String,
}

/// Everything one batch produced
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successfully built and classified graphs
    pub graphs: Vec<LineageGraph>,

    /// Documents that produced no graph
    pub failures: Vec<DocumentFailure>,

    /// Every unresolved macro reference across the batch
    pub issues: Vec<MacroIssue>,

    pub inventory: MacroInventory,

    /// Report entries, severities already adjusted
    pub diagnostics: Vec<Diagnostic>,

    /// Documents attempted
    pub processed: usize,
}

impl BatchOutcome {
    /// Versioned report with the macro inventory as metadata
    pub fn to_report(&self) -> Report {
        let mut report = Report::new();
        for diagnostic in &self.diagnostics {
            report.add_diagnostic(diagnostic.clone());
        }

        let macros: Vec<_> = self.inventory.records().collect();
        report
            .with_counts(self.processed, self.graphs.len(), self.failures.len())
            .with_metadata(serde_json::json!({
                "macro_inventory": {
                    "summary": self.inventory.summary(),
                    "macros": macros,
                },
                "failures": self.failures,
            }))
    }
}

/// Runs workflows through resolution, graph building and classification
pub struct LineagePipeline<L> {
    resolver: MacroResolver<L>,
    builder: LineageGraphBuilder,
    classifier: LayerClassifier,
    severity: SeverityThreshold,
}

impl LineagePipeline<XmlWorkflowLoader> {
    /// Pipeline over XML workflow files, configured from `flowlineage.toml`
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            MacroResolver::new(XmlWorkflowLoader::new(), ResolverOptions::from(&config.macros)),
            LayerClassifier::new(config.layers.clone()),
            config.severity.clone(),
        )
    }
}

impl<L: WorkflowLoader> LineagePipeline<L> {
    pub fn new(resolver: MacroResolver<L>, classifier: LayerClassifier, severity: SeverityThreshold) -> Self {
        Self {
            resolver,
            builder: LineageGraphBuilder::new(),
            classifier,
            severity,
        }
    }

    /// Process every document in order
    pub fn run(
        &self,
        paths: &[PathBuf],
        context: &mut ResolutionContext,
        policy: &mut dyn ResolutionPolicy,
    ) -> BatchOutcome {
        let mut batch = BatchOutcome::default();

        for path in paths {
            self.process_document(path, context, policy, &mut batch);
        }

        info!(
            processed = batch.processed,
            graphs = batch.graphs.len(),
            failures = batch.failures.len(),
            unresolved = batch.issues.len(),
            "Batch complete"
        );

        batch
    }

    /// Process one document into `batch`
    pub fn process_document(
        &self,
        path: &Path,
        context: &mut ResolutionContext,
        policy: &mut dyn ResolutionPolicy,
        batch: &mut BatchOutcome,
    ) {
        batch.processed += 1;
        let file = path.display().to_string();

        let outcome = match self.resolver.resolve_file(path, context, policy) {
            Ok(outcome) => outcome,
            Err(ResolveError::Load(error)) => {
                warn!(path = %file, %error, "Failed to load workflow");
                self.push(
                    batch,
                    Diagnostic::for_code(DiagnosticCode::WorkflowLoadError, error.to_string())
                        .with_location(Location::new(file.clone())),
                );
                batch.failures.push(DocumentFailure {
                    path: path.to_path_buf(),
                    workflow: None,
                    kind: FailureKind::LoadError,
                    message: error.to_string(),
                });
                return;
            }
        };

        let workflow = outcome.document.name.clone();
        batch.inventory.record(&workflow, &outcome, context);

        if outcome.is_fatal() {
            warn!(workflow = %workflow, "Excluded: cyclic macro reference");
            let message = outcome
                .issues
                .iter()
                .filter(|issue| issue.is_fatal())
                .map(|issue| issue.reason.to_string())
                .collect::<Vec<_>>()
                .join("; ");

            for issue in &outcome.issues {
                self.push(batch, issue.to_diagnostic());
            }
            batch.failures.push(DocumentFailure {
                path: path.to_path_buf(),
                workflow: Some(workflow),
                kind: FailureKind::CyclicMacro,
                message,
            });
            batch.issues.extend(outcome.issues);
            return;
        }

        match self.builder.build(&outcome.document) {
            Ok(mut graph) => {
                self.classifier.classify(&mut graph);

                for issue in &outcome.issues {
                    let impact = graph.downstream(&issue.node);
                    self.push(batch, issue.to_diagnostic().with_impact(impact));
                }
                batch.graphs.push(graph);
            }
            Err(error) => {
                for issue in &outcome.issues {
                    self.push(batch, issue.to_diagnostic());
                }

                let kind = match &error {
                    LineageError::DuplicateNodes { ids, .. } => {
                        for id in ids {
                            self.push(
                                batch,
                                Diagnostic::for_code(
                                    DiagnosticCode::WorkflowDuplicateNode,
                                    format!("Node id {} is used by more than one tool", id),
                                )
                                .with_location(Location::with_node(file.clone(), id.clone())),
                            );
                        }
                        FailureKind::DuplicateNode
                    }
                    LineageError::DanglingConnections { dangling, .. } => {
                        for entry in dangling {
                            let conn = &entry.connection;
                            self.push(
                                batch,
                                Diagnostic::for_code(
                                    DiagnosticCode::WorkflowDanglingConnection,
                                    format!(
                                        "Connection {}:{} -> {}:{} references missing node {}",
                                        conn.from.node, conn.from.port, conn.to.node, conn.to.port, entry.missing
                                    ),
                                )
                                .with_location(Location::with_node(file.clone(), entry.missing.clone())),
                            );
                        }
                        FailureKind::DanglingConnection
                    }
                    LineageError::StructuralCycle { cycle, unsorted, .. } => {
                        let mut diagnostic = Diagnostic::for_code(
                            DiagnosticCode::LineageStructuralCycle,
                            format!(
                                "Workflow '{}' contains a cycle: {} ({} node(s) cannot be ordered)",
                                workflow,
                                cycle.join(" -> "),
                                unsorted.len()
                            ),
                        )
                        .with_impact(unsorted.clone());
                        let location = match cycle.first() {
                            Some(node) => Location::with_node(file.clone(), node.clone()),
                            None => Location::new(file.clone()),
                        };
                        diagnostic = diagnostic.with_location(location);
                        self.push(batch, diagnostic);
                        FailureKind::StructuralCycle
                    }
                };

                batch.failures.push(DocumentFailure {
                    path: path.to_path_buf(),
                    workflow: Some(workflow),
                    kind,
                    message: error.to_string(),
                });
            }
        }

        batch.issues.extend(outcome.issues);
    }

    /// Record a diagnostic at its configured severity
    fn push(&self, batch: &mut BatchOutcome, mut diagnostic: Diagnostic) {
        diagnostic.severity = self.severity.severity_for(diagnostic.code);
        batch.diagnostics.push(diagnostic);
    }
}
