//! Lineage graph construction and layer classification
//!
//! This crate handles:
//! - Building lineage DAGs from expanded workflow documents
//! - Cycle detection with minimal-cycle reporting
//! - Source / intermediate / sink classification
//! - Impact analysis (downstream stages of an unresolved macro)
//! - The batch pipeline tying resolution and graph building together

pub mod graph;
pub mod builder;
pub mod layers;
pub mod pipeline;

pub use graph::{CycleReport, EdgeRole, LayerLabel, LineageEdge, LineageGraph, LineageNode};
pub use builder::{LineageError, LineageGraphBuilder};
pub use layers::{Affinity, LayerClassifier};
pub use pipeline::{BatchOutcome, DocumentFailure, FailureKind, LineagePipeline};
