//! Workflow file discovery
//!
//! Expands the paths given on the command line into a list of workflow files.
//! Directories are walked recursively for `.yxmd` and `.yxwz` files; macro
//! definitions (`.yxmc`) are only picked up when named explicitly, since they
//! are normally reached through the workflows that call them.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions collected when walking a directory
const DISCOVERED_EXTENSIONS: &[&str] = &["yxmd", "yxwz"];

/// Discovery errors
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Path does not exist: {0}")]
    NotFound(String),
}

/// Collect workflow files from files and directories
///
/// The result is sorted and free of duplicates.
pub fn discover_workflows<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut workflows = Vec::new();

    for path in paths {
        let path = path.as_ref();

        if path.is_file() {
            workflows.push(path.to_path_buf());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && has_workflow_extension(entry.path()) {
                    workflows.push(entry.path().to_path_buf());
                }
            }
        } else {
            return Err(DiscoveryError::NotFound(path.display().to_string()));
        }
    }

    workflows.sort();
    workflows.dedup();

    tracing::debug!(count = workflows.len(), "Discovered workflow files");

    Ok(workflows)
}

fn has_workflow_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            DISCOVERED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
