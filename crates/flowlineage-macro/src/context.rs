//! Per-run resolution state

use crate::cache::ResolutionCache;
use std::path::PathBuf;

/// Shared mutable state of one resolution run
///
/// Passed explicitly to every resolve call so independent runs never share
/// decisions. Documents must be resolved one at a time against the same
/// context for operator prompts to stay in a single, linear order.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    cache: ResolutionCache,
    search_dirs: Vec<PathBuf>,
    skip_all: bool,
    prompts: usize,
}

impl ResolutionContext {
    /// Start a run with the operator's initial search directories
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        let mut context = Self::default();
        for dir in search_dirs {
            context.add_search_dir(dir);
        }
        context
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResolutionCache {
        &mut self.cache
    }

    /// Search directories accumulated so far
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Add a directory to the search set; returns false if already present
    pub fn add_search_dir(&mut self, dir: PathBuf) -> bool {
        if self.search_dirs.contains(&dir) {
            return false;
        }
        self.search_dirs.push(dir);
        true
    }

    /// Whether the operator chose to skip every remaining unlocated macro
    pub fn skip_all(&self) -> bool {
        self.skip_all
    }

    pub(crate) fn set_skip_all(&mut self) {
        self.skip_all = true;
    }

    /// Number of times a policy was asked for a decision
    pub fn prompts_issued(&self) -> usize {
        self.prompts
    }

    pub(crate) fn record_prompt(&mut self) {
        self.prompts += 1;
    }
}
