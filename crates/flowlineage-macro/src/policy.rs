//! Resolution policies
//!
//! A policy decides what happens when a reference cannot be located. The
//! resolver consults it once per cache miss and caches the outcome.

use flowlineage_core::MacroReference;
use std::path::{Path, PathBuf};

/// Information handed to a policy about an unlocated reference
#[derive(Debug, Clone, Copy)]
pub struct MacroRequest<'a> {
    pub reference: &'a MacroReference,

    /// Document containing the reference
    pub referencing_document: &'a Path,

    /// Directories searched so far in this run
    pub search_dirs: &'a [PathBuf],

    /// 1-based attempt number within this prompt session
    pub attempt: usize,
}

/// Operator answer to an unlocated reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Use this macro file
    File(PathBuf),

    /// Add this directory to the run's search set and search again
    Directory(PathBuf),

    /// Leave this reference unresolved
    SkipOne,

    /// Leave this and every later unlocated reference unresolved
    SkipAll,

    /// No answer available; record the reference as missing
    Decline,
}

/// Strategy for unlocated references
pub trait ResolutionPolicy {
    /// Whether this policy may suspend to ask an operator
    ///
    /// Non-interactive policies are never queried; their references are
    /// recorded as missing directly.
    fn is_interactive(&self) -> bool {
        true
    }

    /// Decide what to do about an unlocated reference
    fn decide(&mut self, request: &MacroRequest<'_>) -> PolicyDecision;
}

/// Never asks; every unlocated reference is missing
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePolicy;

impl ResolutionPolicy for NonInteractivePolicy {
    fn is_interactive(&self) -> bool {
        false
    }

    fn decide(&mut self, _request: &MacroRequest<'_>) -> PolicyDecision {
        PolicyDecision::Decline
    }
}

/// External prompt collaborator
///
/// `None` means input ended (closed stdin, interrupted prompt).
pub trait MacroPrompt {
    fn ask_for_macro(&mut self, request: &MacroRequest<'_>) -> Option<PolicyDecision>;
}

/// Asks the operator through a [`MacroPrompt`]
#[derive(Debug)]
pub struct InteractivePolicy<P> {
    prompt: P,
}

impl<P: MacroPrompt> InteractivePolicy<P> {
    pub fn new(prompt: P) -> Self {
        Self { prompt }
    }

    pub fn into_inner(self) -> P {
        self.prompt
    }
}

impl<P: MacroPrompt> ResolutionPolicy for InteractivePolicy<P> {
    fn decide(&mut self, request: &MacroRequest<'_>) -> PolicyDecision {
        self.prompt
            .ask_for_macro(request)
            .unwrap_or(PolicyDecision::SkipOne)
    }
}
