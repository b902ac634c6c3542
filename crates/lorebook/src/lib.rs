//! Lorebook engine — conditional knowledge retrieval.
//!
//! Given a knowledge base and a scan context (recent message text plus any
//! hidden scan keys), selects the entries that activate this turn, parses
//! each entry's `@@name value` decorator block, and returns the matches in
//! deterministic priority order with macro-expanded content.
//!
//! Per-entry failures (an invalid regex pattern, an unparseable decorator
//! value) degrade that entry, never the whole pass.

pub mod decorator;
pub mod matcher;

pub use decorator::{Decorators, parse_decorators};
pub use matcher::{MatchedEntry, ScanContext, find_matches, find_matches_in};
