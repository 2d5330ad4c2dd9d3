//! Batch resolution with caching and bounded concurrency.
//!
//! The optimizer takes a large ordered list of raw inputs, normalizes each
//! one up front, and resolves every distinct (identifier, reference price)
//! pair at most once. Work is split into batches with a pause between them
//! so upstream sources are not hammered, and each batch runs on a bounded
//! set of concurrent workers. The per-key cache lives for the lifetime of
//! the optimizer, so repeated calls keep benefiting from earlier runs.
//!
//! Failures never escape this module: a worker that fails or panics simply
//! leaves its key unresolved, and the affected rows come back with an
//! `error` status while every other row is unaffected.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::matching::Matcher;
use crate::models::{MatchKind, ResolutionResult};
use crate::normalizer::normalize;
use crate::provider::BatchPolicy;

/// Concurrent resolution workers per batch.
const DEFAULT_WORKERS: usize = 4;

/// Pacing configuration for batch resolution.
#[derive(Clone, Copy, Debug)]
pub struct OptimizerConfig {
    /// Chunking and inter-batch pause for large inputs.
    pub batch: BatchPolicy,

    /// Concurrent resolution workers within one batch.
    pub workers: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            batch: BatchPolicy::default(),
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Rows that repair to the same (identifier, reference price) pair share
/// one resolution through the cache.
type CacheKey = (String, Option<Decimal>);

/// Lock the resolution cache, recovering from poison if necessary.
///
/// A poisoned cache only means a worker died mid-insert; the surviving
/// entries are still individually consistent, so recovering is safe.
fn lock_cache(
    cache: &Mutex<HashMap<CacheKey, ResolutionResult>>,
) -> MutexGuard<'_, HashMap<CacheKey, ResolutionResult>> {
    cache.lock().unwrap_or_else(|poisoned| {
        warn!("Resolution cache mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Resolves large input lists against a [`Matcher`], preserving input
/// order and length.
///
/// The cache is keyed by the repaired identifier, so differently spelled
/// inputs for the same listing are resolved once. During reassembly each
/// row gets its own raw input back and the match kind is recomputed from
/// it.
pub struct ResolutionOptimizer {
    matcher: Arc<dyn Matcher>,
    cache: Arc<Mutex<HashMap<CacheKey, ResolutionResult>>>,
    config: OptimizerConfig,
}

impl ResolutionOptimizer {
    pub fn new(matcher: Arc<dyn Matcher>) -> Self {
        Self::with_config(matcher, OptimizerConfig::default())
    }

    pub fn with_config(matcher: Arc<dyn Matcher>, config: OptimizerConfig) -> Self {
        let config = OptimizerConfig {
            workers: config.workers.max(1),
            ..config
        };
        Self {
            matcher,
            cache: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Resolve every input row.
    ///
    /// The output has exactly one result per input row, in input order.
    /// Rows whose resolution failed outright carry an `error` status
    /// instead of aborting the batch.
    pub async fn resolve_all(&self, inputs: &[(String, Option<Decimal>)]) -> Vec<ResolutionResult> {
        if inputs.is_empty() {
            return Vec::new();
        }

        // Normalize every row up front so duplicates collapse onto one
        // cache key regardless of how they were spelled.
        let row_keys: Vec<CacheKey> = inputs
            .iter()
            .map(|(raw, price)| (normalize(raw), *price))
            .collect();

        let mut pending: Vec<CacheKey> = Vec::new();
        {
            let cache = lock_cache(&self.cache);
            let mut queued: HashSet<&CacheKey> = HashSet::new();
            for key in &row_keys {
                if !cache.contains_key(key) && queued.insert(key) {
                    pending.push(key.clone());
                }
            }
        }

        info!(
            "Resolving {} rows ({} uncached keys)",
            inputs.len(),
            pending.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let batches = self.config.batch.chunks(&pending);
        let batch_count = batches.len();

        for (index, batch) in batches.enumerate() {
            if index > 0 {
                sleep(self.config.batch.pause).await;
            }
            debug!(
                "Resolution batch {}/{} ({} keys)",
                index + 1,
                batch_count,
                batch.len()
            );

            let mut handles = Vec::with_capacity(batch.len());
            for key in batch {
                let key = key.clone();
                let matcher = Arc::clone(&self.matcher);
                let cache = Arc::clone(&self.cache);
                let semaphore = Arc::clone(&semaphore);
                handles.push(tokio::spawn(async move {
                    // A closed semaphore aborts the worker; the key then
                    // surfaces as an error row during reassembly.
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    let result = matcher.resolve(&key.0, key.1).await;
                    lock_cache(&cache).insert(key, result);
                }));
            }
            for handle in handles {
                if let Err(error) = handle.await {
                    warn!("Resolution worker failed: {}", error);
                }
            }
        }

        let cache = lock_cache(&self.cache);
        let mut results = Vec::with_capacity(inputs.len());
        for ((raw, _price), key) in inputs.iter().zip(&row_keys) {
            match cache.get(key) {
                Some(cached) => {
                    let mut result = cached.clone();
                    result.original_input = raw.clone();
                    if result.match_kind.is_some() {
                        let exact = result
                            .resolved_identifier
                            .as_deref()
                            .map(|resolved| raw.trim() == resolved)
                            .unwrap_or(false);
                        result.match_kind = Some(if exact {
                            MatchKind::Exact
                        } else {
                            MatchKind::Normalized
                        });
                    }
                    results.push(result);
                }
                None => {
                    warn!("No resolution produced for {:?}, reporting an error row", raw);
                    results.push(ResolutionResult::error(raw.clone(), key.0.clone()));
                }
            }
        }
        results
    }

    /// Number of distinct (identifier, price) pairs currently cached.
    pub fn cached_keys(&self) -> usize {
        lock_cache(&self.cache).len()
    }

    /// Drop every cached resolution.
    pub fn clear_cache(&self) {
        lock_cache(&self.cache).clear();
        debug!("Resolution cache cleared");
    }
}

// ============================================================================
// TESTS
// ============================================================================
