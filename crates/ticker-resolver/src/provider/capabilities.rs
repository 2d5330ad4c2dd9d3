//! Source capabilities and batch spacing configuration.
//!
//! This module defines structures for describing what a directory source
//! can do and how batched requests against it should be spaced.

use std::time::Duration;

/// Describes the capabilities of a directory source.
///
/// Used by the router to decide which sources can produce a full snapshot,
/// which can answer per-identifier lookups during cross-validation, and
/// which need to be told the identifier universe up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Whether the source can produce a full directory snapshot.
    pub snapshot: bool,

    /// Whether the source can answer a single-identifier quote lookup.
    pub quote_lookup: bool,

    /// Whether snapshot fetches require a caller-supplied identifier
    /// universe (true for quote endpoints that only answer for the
    /// identifiers they are asked about).
    pub needs_universe: bool,
}

/// Spacing configuration for batched requests.
///
/// Every component that walks a large identifier list in chunks consults
/// one of these, so request pacing is tuned in a single place per source
/// instead of being scattered through the call sites.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Identifiers per request.
    pub batch_size: usize,

    /// Pause between consecutive batches.
    pub pause: Duration,
}

impl BatchPolicy {
    pub fn new(batch_size: usize, pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pause,
        }
    }

    /// Splits `items` into request-sized chunks.
    pub fn chunks<'a, T>(&self, items: &'a [T]) -> std::slice::Chunks<'a, T> {
        items.chunks(self.batch_size.max(1))
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 100,
            pause: Duration::from_millis(500),
        }
    }
}
