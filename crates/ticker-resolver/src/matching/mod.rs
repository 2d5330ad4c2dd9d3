//! Matching engine: identifier and name resolution against a directory
//! snapshot.
//!
//! Identifier matching normalizes the input, gates it on the prefix
//! allow-list, and does an exact directory lookup. Name matching runs three
//! passes of decreasing strictness (exact, fuzzy, substring) and ranks the
//! survivors, preferring the candidate whose price sits closest to the
//! caller's reference when one is supplied.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;

use crate::models::{
    clean_name, DirectoryRow, MatchCandidate, MatchKind, ResolutionResult, Snapshot,
};
use crate::normalizer::{normalize, validate};

/// Name matching never returns more than this many candidates.
const MAX_CANDIDATES: usize = 5;

/// Minimum similarity score for the fuzzy pass.
const FUZZY_THRESHOLD: u8 = 60;

/// Fixed score assigned by the substring pass.
const SUBSTRING_SCORE: u8 = 50;

/// String similarity on a 0-100 scale.
///
/// Symmetric; 100 only for identical inputs. Close-but-distinct long
/// strings are capped at 99 so rounding can never fake an exact match.
pub fn similarity(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }
    let scaled = (strsim::normalized_levenshtein(a, b) * 100.0).round() as u8;
    scaled.min(99)
}

/// Seam between batch orchestration and the engine. Implementations carry
/// their own directory snapshot and any validation they apply.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Resolve one raw identifier input.
    async fn resolve(&self, input: &str, reference_price: Option<Decimal>) -> ResolutionResult;
}

/// Resolves identifiers and names against one immutable directory snapshot.
///
/// The snapshot is taken at construction and never refreshed in place;
/// resolving against newer data means building a new engine.
pub struct MatchingEngine {
    snapshot: Arc<Snapshot>,
    similarity: fn(&str, &str) -> u8,
}

impl MatchingEngine {
    pub fn new(snapshot: Arc<Snapshot>) -> Self {
        Self::with_similarity(snapshot, similarity)
    }

    /// Build an engine with a different similarity collaborator.
    ///
    /// The collaborator contract: scores in 0..=100, symmetric, 100 iff the
    /// inputs are identical.
    pub fn with_similarity(snapshot: Arc<Snapshot>, similarity: fn(&str, &str) -> u8) -> Self {
        Self {
            snapshot,
            similarity,
        }
    }

    /// The directory snapshot this engine resolves against.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Resolve a raw identifier.
    ///
    /// Normalizes, gates on the prefix allow-list, then looks the repaired
    /// identifier up verbatim. The match kind records whether the caller's
    /// input already was canonical.
    pub fn match_by_identifier(
        &self,
        input: &str,
        reference_price: Option<Decimal>,
    ) -> ResolutionResult {
        let normalized = normalize(input);
        if !validate(&normalized) {
            debug!("identifier format invalid: {:?} -> {:?}", input, normalized);
            return ResolutionResult::invalid_format(input, normalized);
        }

        match self.snapshot.lookup(&normalized) {
            Some(row) => ResolutionResult::resolved(input, normalized, row, reference_price),
            None => {
                debug!("identifier not in directory: {:?} -> {}", input, normalized);
                ResolutionResult::not_found(input, normalized)
            }
        }
    }

    /// Find directory rows whose name matches the input.
    ///
    /// Passes run in order of decreasing strictness and stop adding rows a
    /// pass already claimed:
    /// 1. Exact: listed or cleaned name equals the cleaned input, score 100
    /// 2. Fuzzy: similarity of cleaned names at or above the threshold
    /// 3. Substring: one cleaned name contains the other, score 50
    ///
    /// With a reference price the ranking puts the smallest price gap first;
    /// rows without a comparable price rank after every priced row.
    pub fn match_by_name(
        &self,
        name: &str,
        reference_price: Option<Decimal>,
    ) -> Vec<MatchCandidate> {
        let cleaned_input = clean_name(name);
        if cleaned_input.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<MatchCandidate> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for row in self.snapshot.rows() {
            if row.display_name == cleaned_input || row.cleaned_name == cleaned_input {
                seen.insert(row.identifier.as_str());
                candidates.push(candidate(row, MatchKind::Exact, 100, reference_price));
            }
        }

        if candidates.len() < MAX_CANDIDATES {
            for row in self.snapshot.rows() {
                if seen.contains(row.identifier.as_str()) {
                    continue;
                }
                let score = (self.similarity)(&row.cleaned_name, &cleaned_input);
                if score >= FUZZY_THRESHOLD {
                    seen.insert(row.identifier.as_str());
                    candidates.push(candidate(row, MatchKind::Fuzzy, score, reference_price));
                }
            }
        }

        if candidates.len() < MAX_CANDIDATES {
            for row in self.snapshot.rows() {
                if seen.contains(row.identifier.as_str()) || row.cleaned_name.is_empty() {
                    continue;
                }
                if row.cleaned_name.contains(&cleaned_input)
                    || cleaned_input.contains(&row.cleaned_name)
                {
                    seen.insert(row.identifier.as_str());
                    candidates.push(candidate(
                        row,
                        MatchKind::Substring,
                        SUBSTRING_SCORE,
                        reference_price,
                    ));
                }
            }
        }

        rank(&mut candidates, reference_price.is_some());
        candidates.truncate(MAX_CANDIDATES);
        candidates
    }
}

#[async_trait]
impl Matcher for MatchingEngine {
    async fn resolve(&self, input: &str, reference_price: Option<Decimal>) -> ResolutionResult {
        self.match_by_identifier(input, reference_price)
    }
}

fn candidate(
    row: &DirectoryRow,
    kind: MatchKind,
    score: u8,
    reference_price: Option<Decimal>,
) -> MatchCandidate {
    let price_delta = match (reference_price, row.last_price) {
        (Some(reference), Some(last)) => Some((last - reference).abs()),
        _ => None,
    };
    MatchCandidate {
        identifier: row.identifier.clone(),
        display_name: row.display_name.clone(),
        last_price: row.last_price,
        kind,
        score,
        price_delta,
    }
}

/// Sort candidates in place. The sort is stable, so ties keep pass order.
fn rank(candidates: &mut [MatchCandidate], by_price: bool) {
    if by_price {
        candidates.sort_by(|a, b| match (a.price_delta, b.price_delta) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| b.score.cmp(&a.score)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.score.cmp(&a.score),
        });
    } else {
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
    }
}

// ============================================================================
// TESTS
// ============================================================================
