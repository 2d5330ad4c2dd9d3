//! Resolver data models
//!
//! This module contains the core data types passed between the directory
//! providers, the matching engine, and the batch planner:
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `directory` - Directory rows and listed-name cleaning
//! - `snapshot` - Indexed point-in-time copies of the security directory
//! - `candidate` - Scored candidates produced by name matching
//! - `result` - Resolution outcomes and cross-validation summaries

mod candidate;
mod directory;
mod result;
mod snapshot;
mod types;

pub use candidate::{MatchCandidate, MatchKind};
pub use directory::{clean_name, DirectoryRow};
pub use result::{ProviderFinding, ResolutionResult, ResolutionStatus, ValidationSummary};
pub use snapshot::{Snapshot, SnapshotSource, SnapshotStats};
pub use types::ProviderId;
