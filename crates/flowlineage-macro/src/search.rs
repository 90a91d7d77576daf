//! Macro file search
//!
//! Search order, first existing file wins:
//! 1. the declared path (absolute, or relative to the referencing document)
//! 2. the referencing document's directory
//! 3. `macros/` then `Macros/` under that directory
//! 4. operator search directories, recursively when enabled
//! 5. the parent directory and its `macros/` (when enabled)

use flowlineage_core::MacroReference;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Conventional macro subdirectories next to a workflow
const MACRO_SUBDIRS: &[&str] = &["macros", "Macros"];

/// Search behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub recursive: bool,
    pub include_parent_dir: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            include_parent_dir: true,
        }
    }
}

/// Candidate paths that do not require walking directories, in search order
pub fn direct_candidates(
    reference: &MacroReference,
    document_dir: &Path,
    search_dirs: &[PathBuf],
    options: SearchOptions,
) -> Vec<PathBuf> {
    let file_name = reference.file_name();
    let mut candidates = Vec::new();

    if let Some(declared) = &reference.declared_path {
        let declared = declared_path(declared);
        if declared.is_absolute() {
            candidates.push(declared);
        } else {
            candidates.push(document_dir.join(&declared));
        }
    }

    candidates.push(document_dir.join(&file_name));
    for subdir in MACRO_SUBDIRS {
        candidates.push(document_dir.join(subdir).join(&file_name));
    }

    for dir in search_dirs {
        candidates.push(dir.join(&file_name));
    }

    if options.include_parent_dir {
        if let Some(parent) = document_dir.parent() {
            candidates.push(parent.join(&file_name));
            candidates.push(parent.join(MACRO_SUBDIRS[0]).join(&file_name));
        }
    }

    candidates
}

/// Locate a macro definition file
pub fn find_macro(
    reference: &MacroReference,
    document_dir: &Path,
    search_dirs: &[PathBuf],
    options: SearchOptions,
) -> Option<PathBuf> {
    let file_name = reference.file_name();
    let candidates = direct_candidates(reference, document_dir, search_dirs, options);

    // Direct candidates up to and including the operator directories come first;
    // recursive walks of operator directories sit between those and the
    // parent-directory fallbacks.
    let parent_probes = if options.include_parent_dir && document_dir.parent().is_some() {
        2
    } else {
        0
    };
    let (primary, parent) = candidates.split_at(candidates.len() - parent_probes);

    if let Some(found) = primary.iter().find(|p| p.is_file()) {
        return Some(found.clone());
    }

    if options.recursive {
        for dir in search_dirs {
            if let Some(found) = find_in_tree(dir, &file_name) {
                return Some(found);
            }
        }
    }

    parent.iter().find(|p| p.is_file()).cloned()
}

/// Depth-first walk of `root` for a file named `file_name`, in sorted order
fn find_in_tree(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(|entry| entry.into_path())
}

/// Declared paths authored on Windows use `\`; accept either separator
fn declared_path(declared: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(declared)
    } else {
        PathBuf::from(declared.replace('\\', "/"))
    }
}
