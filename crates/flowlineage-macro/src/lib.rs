//! flowlineage macro resolution
//!
//! Locates, loads and splices macro definitions into the workflows that
//! reference them. Resolution never aborts a run: references that cannot be
//! expanded stay behind as placeholder nodes and are reported as
//! [`MacroIssue`]s.

pub mod cache;
pub mod context;
pub mod issue;
pub mod policy;
pub mod search;
pub mod splice;
pub mod resolver;
pub mod inventory;

pub use cache::{CacheEntry, ExpandedMacro, OperatorDecision, ResolutionCache, ResolvedMacro};
pub use context::ResolutionContext;
pub use issue::MacroIssue;
pub use policy::{
    InteractivePolicy, MacroPrompt, MacroRequest, NonInteractivePolicy, PolicyDecision,
    ResolutionPolicy,
};
pub use search::{find_macro, SearchOptions};
pub use splice::splice;
pub use resolver::{MacroResolver, ResolveError, ResolveOutcome, ResolverOptions};
pub use inventory::{fingerprint, InventorySummary, MacroInventory, MacroRecord, MacroStatus};
