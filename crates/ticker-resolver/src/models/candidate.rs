//! Scored candidates produced by name matching.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How an input was matched to a directory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    /// Input already equalled the canonical identifier or listed name
    Exact,
    /// Input was repaired into the canonical identifier
    Normalized,
    /// Name similarity at or above the fuzzy threshold
    Fuzzy,
    /// One name contains the other
    Substring,
}

/// A scored directory row produced by name matching. Transient: candidates
/// are ranked and the winner is folded into a `ResolutionResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// Canonical identifier of the matched row
    pub identifier: String,
    /// Listed display name of the matched row
    pub display_name: String,
    /// Last traded price, when the directory carries one
    pub last_price: Option<Decimal>,
    /// How the row was matched
    pub kind: MatchKind,
    /// Match score, 0-100
    pub score: u8,
    /// Absolute gap to the reference price, when both sides are priced
    pub price_delta: Option<Decimal>,
}
