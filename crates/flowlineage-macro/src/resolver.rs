//! Macro resolver
//!
//! Expands every macro reference in a document, depth first: a macro's own
//! references are resolved before the macro is spliced into its caller.
//! Nesting is tracked with an explicit frame stack rather than recursion;
//! the canonical paths of the frames on the stack form the visiting set used
//! for cycle detection.

use crate::cache::{CacheEntry, ExpandedMacro, OperatorDecision, ResolvedMacro};
use crate::context::ResolutionContext;
use crate::issue::MacroIssue;
use crate::policy::{MacroRequest, PolicyDecision, ResolutionPolicy};
use crate::search::{find_macro, SearchOptions};
use crate::splice::splice;
use flowlineage_core::{MacroConfig, MacroReference, NodeId, UnresolvedReason, WorkflowDocument};
use flowlineage_workflow::{LoadError, WorkflowLoader};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolver tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub search: SearchOptions,

    /// Decisions asked for per unlocated reference before giving up
    pub max_prompt_attempts: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            max_prompt_attempts: 3,
        }
    }
}

impl From<&MacroConfig> for ResolverOptions {
    fn from(config: &MacroConfig) -> Self {
        Self {
            search: SearchOptions {
                recursive: config.recursive_search,
                include_parent_dir: config.include_parent_dir,
            },
            max_prompt_attempts: config.max_prompt_attempts.max(1),
        }
    }
}

/// Errors that prevent resolution from starting
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result of resolving one document
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    /// Expanded document; unresolved references remain as placeholders
    pub document: WorkflowDocument,

    /// Every unresolved reference, including those inside nested macros
    pub issues: Vec<MacroIssue>,

    /// Every macro spliced in, including nested ones
    pub expanded: Vec<ExpandedMacro>,
}

impl ResolveOutcome {
    /// No reference was left unresolved
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    /// The document contains a cyclic macro reference and must not be built
    pub fn is_fatal(&self) -> bool {
        self.issues.iter().any(MacroIssue::is_fatal)
    }
}

/// Call site of a macro frame in the frame below it
#[derive(Debug)]
struct Call {
    call_site: NodeId,
    reference: MacroReference,
}

/// A document whose references are being expanded
#[derive(Debug)]
struct Frame {
    document: WorkflowDocument,
    label: String,
    canonical: PathBuf,
    call: Option<Call>,
    pending: VecDeque<NodeId>,
    issues: Vec<MacroIssue>,
    uses: Vec<ExpandedMacro>,
}

impl Frame {
    fn new(document: WorkflowDocument, label: String, canonical: PathBuf, call: Option<Call>) -> Self {
        let pending = document
            .macro_references()
            .into_iter()
            .map(|n| n.id.clone())
            .collect();

        Self {
            document,
            label,
            canonical,
            call,
            pending,
            issues: Vec::new(),
            uses: Vec::new(),
        }
    }
}

/// How a reference was answered before any file is loaded
enum Lookup {
    Unresolved(UnresolvedReason),
    Located(PathBuf),
}

impl From<OperatorDecision> for Lookup {
    fn from(decision: OperatorDecision) -> Self {
        match decision {
            OperatorDecision::Located(path) => Self::Located(path),
            OperatorDecision::Unresolved(reason) => Self::Unresolved(reason),
        }
    }
}

/// Resolves macro references against the file system
pub struct MacroResolver<L> {
    loader: L,
    options: ResolverOptions,
}

impl<L: WorkflowLoader> MacroResolver<L> {
    pub fn new(loader: L, options: ResolverOptions) -> Self {
        Self { loader, options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Load a workflow file and resolve it
    pub fn resolve_file(
        &self,
        path: &Path,
        context: &mut ResolutionContext,
        policy: &mut dyn ResolutionPolicy,
    ) -> Result<ResolveOutcome, ResolveError> {
        let document = self.loader.load(path)?;
        Ok(self.resolve(document, context, policy))
    }

    /// Expand every macro reference in `document`
    ///
    /// Never fails: references that cannot be expanded become placeholder
    /// nodes and are listed in the outcome's issues.
    pub fn resolve(
        &self,
        document: WorkflowDocument,
        context: &mut ResolutionContext,
        policy: &mut dyn ResolutionPolicy,
    ) -> ResolveOutcome {
        let label = document.name.clone();
        let canonical = canonical_path(&document.path);
        let mut root = Frame::new(document, label, canonical, None);
        let mut stack: Vec<Frame> = Vec::new();

        debug!(workflow = %root.document.name, references = root.pending.len(), "Resolving macros");

        loop {
            let next = current(&mut root, &mut stack).pending.pop_front();
            let Some(node_id) = next else {
                let Some(done) = stack.pop() else { break };
                complete(done, current(&mut root, &mut stack), context);
                continue;
            };

            let frame = current(&mut root, &mut stack);
            let Some(reference) = frame.document.node(&node_id).and_then(|n| n.macro_ref.clone()) else {
                continue;
            };
            let document_path = frame.document.path.clone();

            let path = match self.lookup(&reference, &document_path, context, policy) {
                Lookup::Unresolved(reason) => {
                    mark_placeholder(current(&mut root, &mut stack), &node_id, &reference, reason);
                    continue;
                }
                Lookup::Located(path) => path,
            };

            let visiting = std::iter::once(&root).chain(stack.iter());
            if let Some(start) = visiting.clone().position(|f| f.canonical == path) {
                let mut chain: Vec<String> = visiting.skip(start).map(|f| f.label.clone()).collect();
                chain.push(reference.name.clone());
                warn!(chain = %chain.join(" -> "), "Cyclic macro reference");

                let reason = UnresolvedReason::Cyclic { chain };
                mark_placeholder(current(&mut root, &mut stack), &node_id, &reference, reason);
                continue;
            }

            if let Some(entry) = context.cache().get_path(&path).cloned() {
                debug!(macro_name = %reference.name, path = %path.display(), "Definition already expanded");
                apply(current(&mut root, &mut stack), &node_id, &reference, entry);
                continue;
            }

            match self.loader.load(&path) {
                Ok(definition) => {
                    debug!(macro_name = %reference.name, path = %path.display(), "Expanding macro");
                    let label = reference.name.clone();
                    stack.push(Frame::new(
                        definition,
                        label,
                        path,
                        Some(Call {
                            call_site: node_id,
                            reference,
                        }),
                    ));
                }
                Err(error) => {
                    warn!(macro_name = %reference.name, path = %path.display(), %error, "Malformed macro");
                    let entry = CacheEntry::Unresolved(UnresolvedReason::Malformed {
                        message: error.to_string(),
                    });
                    context.cache_mut().insert_path(path, entry.clone());
                    apply(current(&mut root, &mut stack), &node_id, &reference, entry);
                }
            }
        }

        ResolveOutcome {
            document: root.document,
            issues: root.issues,
            expanded: root.uses,
        }
    }

    /// Search from the referencing document, then reuse or ask for an operator decision
    ///
    /// Search always runs first so a miss in one directory never hides a copy
    /// next to a later document. Only operator answers are remembered.
    fn lookup(
        &self,
        reference: &MacroReference,
        document_path: &Path,
        context: &mut ResolutionContext,
        policy: &mut dyn ResolutionPolicy,
    ) -> Lookup {
        let document_dir = document_path.parent().unwrap_or_else(|| Path::new("."));

        if let Some(path) = find_macro(reference, document_dir, context.search_dirs(), self.options.search) {
            debug!(macro_name = %reference.name, path = %path.display(), "Located macro");
            return Lookup::Located(canonical_path(&path));
        }

        if let Some(decision) = context.cache().decision(reference) {
            debug!(macro_name = %reference.name, "Reusing operator decision");
            return decision.clone().into();
        }

        if context.skip_all() || !policy.is_interactive() {
            debug!(macro_name = %reference.name, "Macro missing");
            return Lookup::Unresolved(UnresolvedReason::Missing);
        }

        let decision = match self.ask(reference, document_path, context, policy) {
            Ok(path) => OperatorDecision::Located(canonical_path(&path)),
            Err(reason) => OperatorDecision::Unresolved(reason),
        };
        context.cache_mut().record_decision(reference.clone(), decision.clone());
        decision.into()
    }

    /// Query the policy until it yields a file or gives up
    fn ask(
        &self,
        reference: &MacroReference,
        document_path: &Path,
        context: &mut ResolutionContext,
        policy: &mut dyn ResolutionPolicy,
    ) -> Result<PathBuf, UnresolvedReason> {
        let document_dir = document_path.parent().unwrap_or_else(|| Path::new("."));
        let search = self.options.search;

        for attempt in 1..=self.options.max_prompt_attempts {
            context.record_prompt();
            let decision = policy.decide(&MacroRequest {
                reference,
                referencing_document: document_path,
                search_dirs: context.search_dirs(),
                attempt,
            });

            match decision {
                PolicyDecision::File(path) => {
                    if path.is_file() {
                        info!(macro_name = %reference.name, path = %path.display(), "Macro supplied by operator");
                        return Ok(path);
                    }
                    warn!(path = %path.display(), "Supplied macro path is not a file");
                }
                PolicyDecision::Directory(dir) => {
                    if !dir.is_dir() {
                        warn!(dir = %dir.display(), "Supplied search directory does not exist");
                        continue;
                    }
                    context.add_search_dir(dir.clone());
                    if let Some(path) = find_macro(reference, document_dir, context.search_dirs(), search) {
                        info!(macro_name = %reference.name, path = %path.display(), "Macro found in supplied directory");
                        return Ok(path);
                    }
                    info!(dir = %dir.display(), "Macro not found; directory kept for later lookups");
                }
                PolicyDecision::SkipOne => return Err(UnresolvedReason::Skipped),
                PolicyDecision::SkipAll => {
                    info!("Skipping all remaining unlocated macros");
                    context.set_skip_all();
                    return Err(UnresolvedReason::Skipped);
                }
                PolicyDecision::Decline => return Err(UnresolvedReason::Missing),
            }
        }

        warn!(
            macro_name = %reference.name,
            attempts = self.options.max_prompt_attempts,
            "No usable answer; skipping macro"
        );
        Err(UnresolvedReason::Skipped)
    }
}

/// Innermost frame still being expanded
fn current<'a>(root: &'a mut Frame, stack: &'a mut [Frame]) -> &'a mut Frame {
    match stack.last_mut() {
        Some(frame) => frame,
        None => root,
    }
}

/// Cache a finished macro frame and splice it into its caller
fn complete(done: Frame, caller: &mut Frame, context: &mut ResolutionContext) {
    let Some(call) = done.call else {
        return;
    };

    let resolved = Arc::new(ResolvedMacro {
        path: done.canonical,
        definition: done.document,
        issues: done.issues,
        uses: done.uses,
    });

    let entry = CacheEntry::Resolved(resolved.clone());
    context.cache_mut().insert_path(resolved.path.clone(), entry);

    expand(caller, &call.call_site, &call.reference, &resolved);
}

fn apply(frame: &mut Frame, node_id: &str, reference: &MacroReference, entry: CacheEntry) {
    match entry {
        CacheEntry::Resolved(resolved) => expand(frame, node_id, reference, &resolved),
        CacheEntry::Unresolved(reason) => mark_placeholder(frame, node_id, reference, reason),
    }
}

fn expand(frame: &mut Frame, node_id: &str, reference: &MacroReference, resolved: &ResolvedMacro) {
    match splice(&mut frame.document, node_id, &resolved.definition) {
        Ok(()) => {
            let caller = frame.document.path.clone();
            frame
                .issues
                .extend(resolved.issues.iter().map(|issue| issue.relocated(node_id, &caller)));
            frame.uses.push(ExpandedMacro {
                reference: reference.clone(),
                path: resolved.path.clone(),
                inputs: resolved.input_count(),
                outputs: resolved.output_count(),
            });
            frame.uses.extend(resolved.uses.iter().cloned());
        }
        Err(reason) => {
            warn!(macro_name = %reference.name, %reason, "Macro port mismatch");
            mark_placeholder(frame, node_id, reference, reason);
        }
    }
}

fn mark_placeholder(
    frame: &mut Frame,
    node_id: &str,
    reference: &MacroReference,
    reason: UnresolvedReason,
) {
    let origin = match frame.document.node_mut(node_id) {
        Some(node) => {
            node.unresolved = Some(reason.clone());
            node.origin.clone()
        }
        None => format!("{}#{}", frame.document.name, node_id),
    };

    frame.issues.push(MacroIssue {
        reference: reference.clone(),
        document: frame.document.path.clone(),
        node: node_id.to_string(),
        origin,
        reason,
    });
}

fn canonical_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
