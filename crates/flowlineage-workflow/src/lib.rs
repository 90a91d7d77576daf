//! flowlineage workflow
//!
//! Loading of Alteryx workflow files into [`flowlineage_core::WorkflowDocument`]s
//! and discovery of workflow files on disk.

pub mod xml;
pub mod tools;
pub mod loader;
pub mod discovery;

pub use loader::{LoadError, WorkflowLoader, XmlWorkflowLoader, WORKFLOW_EXTENSIONS};
pub use discovery::{discover_workflows, DiscoveryError};
pub use tools::{category_for_plugin, display_name_for_plugin, plugin_short_name};
