//! Ticker Resolver Crate
//!
//! This crate resolves raw China A-share identifiers and listed names
//! against a point-in-time directory snapshot assembled from public
//! quotation sources.
//!
//! # Overview
//!
//! The resolver supports:
//! - Identifier repair: prefixed, padded, or float-formatted inputs are
//!   normalized before lookup
//! - Multiple directory sources: Eastmoney, Sina, Tencent, Netease,
//!   Xueqiu, plus local snapshot files
//! - Priority failover with a local-file fallback when every remote
//!   source is down
//! - Name matching in three passes (exact, fuzzy, substring) with
//!   price-aware ranking
//! - Cross-validation of resolved rows against independent quotation
//!   sources
//! - Batched, cached, bounded-concurrency resolution of large input
//!   lists
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +---------------------+
//! |    Input rows    | --> | ResolutionOptimizer |  (batching, caching)
//! +------------------+     +---------------------+
//!                                     |
//!                                     v
//!                            +------------------+
//!                            |     Matcher      |  (engine, optional validation)
//!                            +------------------+
//!                                     |
//!                                     v
//!                            +------------------+
//!                            |     Snapshot     |  (indexed directory rows)
//!                            +------------------+
//!                                     ^
//!                                     |
//!                            +------------------+
//!                            |  ProviderRouter  |  (priority failover)
//!                            +------------------+
//!                                     |
//!                                     v
//!                           +-------------------+
//!                           | DirectoryProvider |  (Eastmoney, Sina, ..., local)
//!                           +-------------------+
//! ```
//!
//! # Core Types
//!
//! - [`DirectoryRow`] - One listed security with its quoted fields
//! - [`Snapshot`] - Indexed point-in-time copy of the directory
//! - [`ResolutionResult`] - Outcome of resolving one raw input
//! - [`MatchCandidate`] - Scored row produced by name matching
//! - [`ValidationSummary`] - Agreement across quotation sources
//! - [`ResolveError`] - Directory and transport failures, with retry
//!   classification
//!
//! # Type Aliases
//!
//! - [`ProviderId`] - Source identifier (e.g., "sina", "local")

pub mod errors;
pub mod matching;
pub mod models;
pub mod normalizer;
pub mod optimizer;
pub mod provider;
pub mod router;
pub mod validation;

// Re-export all public types from models
pub use models::{
    clean_name, DirectoryRow, MatchCandidate, MatchKind, ProviderFinding, ProviderId,
    ResolutionResult, ResolutionStatus, Snapshot, SnapshotSource, SnapshotStats, ValidationSummary,
};

// Re-export error types
pub use errors::{ResolveError, RetryClass};

// Re-export normalization primitives
pub use normalizer::{normalize, venue_prefix, Board, Market};

// Re-export provider types
pub use provider::eastmoney::EastmoneyProvider;
pub use provider::local::LocalFileProvider;
pub use provider::netease::NeteaseProvider;
pub use provider::sina::SinaProvider;
pub use provider::tencent::TencentProvider;
pub use provider::xueqiu::XueqiuProvider;
pub use provider::{BatchPolicy, DirectoryProvider, ProviderCapabilities};

// Re-export resolution pipeline types
pub use matching::{similarity, Matcher, MatchingEngine};
pub use optimizer::{OptimizerConfig, ResolutionOptimizer};
pub use router::{ProviderRouter, RouterConfig};
pub use validation::{CrossValidator, ValidatedMatcher, ValidatorConfig};
