//! Provider router for directory snapshot acquisition.
//!
//! The router owns the prioritized source list and the failure policy:
//! - Source selection by capability and priority
//! - Fallback to the next source on failure or implausibly small responses
//! - Universe propagation from the local file to quote-driven sources
//! - Local snapshot as the guaranteed last resort

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::errors::{ResolveError, RetryClass};
use crate::models::Snapshot;
use crate::provider::DirectoryProvider;

/// Router tuning knobs.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Minimum row count a discovery source must return before its snapshot
    /// is trusted. Quote-driven sources are instead held to half the
    /// universe they were asked for.
    pub min_plausible_rows: usize,
    /// Pause inserted after a throttling failure before the next source.
    pub failover_pause: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            min_plausible_rows: 1000,
            failover_pause: Duration::from_millis(500),
        }
    }
}

/// Orchestrates snapshot-capable sources behind one `load()` contract.
pub struct ProviderRouter {
    remotes: Vec<Arc<dyn DirectoryProvider>>,
    local: Arc<dyn DirectoryProvider>,
    config: RouterConfig,
}

impl ProviderRouter {
    pub fn new(remotes: Vec<Arc<dyn DirectoryProvider>>, local: Arc<dyn DirectoryProvider>) -> Self {
        Self::with_config(remotes, local, RouterConfig::default())
    }

    pub fn with_config(
        remotes: Vec<Arc<dyn DirectoryProvider>>,
        local: Arc<dyn DirectoryProvider>,
        config: RouterConfig,
    ) -> Self {
        Self {
            remotes,
            local,
            config,
        }
    }

    /// Load a directory snapshot.
    ///
    /// Tries sources in order:
    /// 1. Filter remotes to snapshot-capable ones, sorted by priority
    /// 2. Feed universe-driven sources the local identifier list
    /// 3. Reject responses below the plausibility floor
    /// 4. On failure, move to the next source based on retry class
    /// 5. Fall back to the local file, which is exempt from the floor
    ///
    /// Every snapshot is a fresh value; reloading never mutates a snapshot
    /// an earlier caller still holds.
    pub async fn load(&self) -> Result<Snapshot, ResolveError> {
        let mut remotes: Vec<&Arc<dyn DirectoryProvider>> = self
            .remotes
            .iter()
            .filter(|provider| provider.capabilities().snapshot)
            .collect();
        remotes.sort_by_key(|provider| provider.priority());

        let mut local_result: Option<Result<Snapshot, ResolveError>> = None;

        for provider in remotes {
            let universe: Option<Vec<String>> = if provider.capabilities().needs_universe {
                if local_result.is_none() {
                    local_result = Some(self.local.fetch_snapshot(None).await);
                }
                let identifiers: Vec<String> = match &local_result {
                    Some(Ok(snapshot)) => snapshot.identifiers().map(str::to_string).collect(),
                    _ => Vec::new(),
                };
                if identifiers.is_empty() {
                    debug!(
                        "no local universe available for '{}', skipping",
                        provider.id()
                    );
                    continue;
                }
                Some(identifiers)
            } else {
                None
            };

            debug!("fetching directory snapshot from '{}'", provider.id());

            match provider.fetch_snapshot(universe.as_deref()).await {
                Ok(snapshot) => {
                    let floor = self.plausibility_floor(universe.as_ref().map(Vec::len));
                    if snapshot.len() < floor {
                        let error = ResolveError::IncompleteSnapshot {
                            provider: provider.id().to_string(),
                            rows: snapshot.len(),
                            floor,
                        };
                        warn!("{}, trying next source", error);
                        continue;
                    }
                    info!(
                        "loaded {} directory rows from '{}'",
                        snapshot.len(),
                        provider.id()
                    );
                    debug!("snapshot profile: {}", snapshot.stats());
                    return Ok(snapshot);
                }
                Err(error) => match error.retry_class() {
                    RetryClass::Never => {
                        debug!(
                            "terminal error from '{}': {}, not retrying",
                            provider.id(),
                            error
                        );
                        return Err(error);
                    }
                    RetryClass::FailoverWithPause => {
                        warn!(
                            "source '{}' failed: {}, pausing before next source",
                            provider.id(),
                            error
                        );
                        sleep(self.config.failover_pause).await;
                    }
                    RetryClass::NextSource => {
                        warn!(
                            "source '{}' failed: {}, trying next source",
                            provider.id(),
                            error
                        );
                    }
                },
            }
        }

        let local_result = match local_result {
            Some(result) => result,
            None => self.local.fetch_snapshot(None).await,
        };
        match local_result {
            Ok(snapshot) => {
                info!(
                    "falling back to local directory snapshot ({} rows)",
                    snapshot.len()
                );
                Ok(snapshot)
            }
            Err(cause) => {
                error!("local directory fallback failed: {}", cause);
                Err(ResolveError::DirectoryUnavailable)
            }
        }
    }

    /// Row-count floor below which a snapshot is treated as partial.
    fn plausibility_floor(&self, universe_len: Option<usize>) -> usize {
        match universe_len {
            Some(len) => len / 2,
            None => self.config.min_plausible_rows,
        }
    }

    /// Registered remote sources, in registration order.
    pub fn remotes(&self) -> &[Arc<dyn DirectoryProvider>] {
        &self.remotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DirectoryRow, SnapshotSource};
    use crate::provider::ProviderCapabilities;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Rows(usize),
        Throttled,
        Broken,
        Terminal,
    }

    struct MockSource {
        id: &'static str,
        priority: u8,
        snapshot: bool,
        needs_universe: bool,
        behavior: Behavior,
        calls: AtomicUsize,
        universe_len: AtomicUsize,
    }

    impl MockSource {
        fn new(id: &'static str, priority: u8, behavior: Behavior) -> Self {
            Self {
                id,
                priority,
                snapshot: true,
                needs_universe: false,
                behavior,
                calls: AtomicUsize::new(0),
                universe_len: AtomicUsize::new(0),
            }
        }

        fn universe_driven(id: &'static str, priority: u8, behavior: Behavior) -> Self {
            Self {
                needs_universe: true,
                ..Self::new(id, priority, behavior)
            }
        }

        fn quote_only(id: &'static str) -> Self {
            Self {
                snapshot: false,
                ..Self::new(id, 1, Behavior::Rows(0))
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DirectoryProvider for MockSource {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                snapshot: self.snapshot,
                quote_lookup: false,
                needs_universe: self.needs_universe,
            }
        }

        async fn fetch_snapshot(
            &self,
            universe: Option<&[String]>,
        ) -> Result<Snapshot, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(identifiers) = universe {
                self.universe_len.store(identifiers.len(), Ordering::SeqCst);
            }
            match &self.behavior {
                Behavior::Rows(count) => Ok(Snapshot::new(
                    SnapshotSource::Provider(self.id.into()),
                    make_rows(*count),
                )),
                Behavior::Throttled => Err(ResolveError::Timeout {
                    provider: self.id.to_string(),
                }),
                Behavior::Broken => Err(ResolveError::SourceError {
                    provider: self.id.to_string(),
                    message: "mock failure".to_string(),
                }),
                Behavior::Terminal => Err(ResolveError::DirectoryUnavailable),
            }
        }
    }

    fn make_rows(count: usize) -> Vec<DirectoryRow> {
        (0..count)
            .map(|i| DirectoryRow::new(format!("{:06}", 600000 + i), format!("公司{}", i)))
            .collect()
    }

    fn fast_config() -> RouterConfig {
        RouterConfig {
            min_plausible_rows: 1000,
            failover_pause: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_first_healthy_source_wins_by_priority() {
        let primary = Arc::new(MockSource::new("primary", 1, Behavior::Rows(1500)));
        let secondary = Arc::new(MockSource::new("secondary", 2, Behavior::Rows(2000)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(44)));

        let router = ProviderRouter::new(
            vec![secondary.clone(), primary.clone()],
            local.clone(),
        );

        let snapshot = router.load().await.unwrap();
        assert_eq!(snapshot.len(), 1500);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
        assert_eq!(local.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_source_falls_over_to_next() {
        let primary = Arc::new(MockSource::new("primary", 1, Behavior::Broken));
        let secondary = Arc::new(MockSource::new("secondary", 2, Behavior::Rows(1500)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(44)));

        let router = ProviderRouter::new(vec![primary.clone(), secondary.clone()], local);

        let snapshot = router.load().await.unwrap();
        assert_eq!(snapshot.len(), 1500);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_throttled_source_pauses_then_falls_over() {
        let primary = Arc::new(MockSource::new("primary", 1, Behavior::Throttled));
        let secondary = Arc::new(MockSource::new("secondary", 2, Behavior::Rows(1200)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(44)));

        let router = ProviderRouter::with_config(
            vec![primary.clone(), secondary.clone()],
            local,
            fast_config(),
        );

        let snapshot = router.load().await.unwrap();
        assert_eq!(snapshot.len(), 1200);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_snapshot_is_rejected() {
        let sparse = Arc::new(MockSource::new("sparse", 1, Behavior::Rows(10)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(44)));

        let router = ProviderRouter::new(vec![sparse.clone()], local.clone());

        let snapshot = router.load().await.unwrap();
        assert_eq!(snapshot.len(), 44);
        assert_eq!(sparse.calls(), 1);
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn test_universe_driven_floor_scales_to_universe() {
        let remote = Arc::new(MockSource::universe_driven("remote", 1, Behavior::Rows(3)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(6)));

        let router = ProviderRouter::new(vec![remote.clone()], local.clone());

        let snapshot = router.load().await.unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(remote.universe_len.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_universe_driven_partial_response_falls_back() {
        let remote = Arc::new(MockSource::universe_driven("remote", 1, Behavior::Rows(2)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(6)));

        let router = ProviderRouter::new(vec![remote.clone()], local.clone());

        let snapshot = router.load().await.unwrap();
        assert_eq!(snapshot.len(), 6);
        assert_eq!(remote.calls(), 1);
        // universe load plus the fallback reuse one cached local call
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn test_universe_source_skipped_without_local_universe() {
        let remote = Arc::new(MockSource::universe_driven("remote", 1, Behavior::Rows(3000)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Broken));

        let router = ProviderRouter::new(vec![remote.clone()], local);

        let error = router.load().await.unwrap_err();
        assert!(matches!(error, ResolveError::DirectoryUnavailable));
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn test_quote_only_source_is_never_asked() {
        let quote_only = Arc::new(MockSource::quote_only("quotes"));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(44)));

        let router = ProviderRouter::new(vec![quote_only.clone()], local);

        let snapshot = router.load().await.unwrap();
        assert_eq!(snapshot.len(), 44);
        assert_eq!(quote_only.calls(), 0);
    }

    #[tokio::test]
    async fn test_terminal_error_stops_the_chain() {
        let primary = Arc::new(MockSource::new("primary", 1, Behavior::Terminal));
        let secondary = Arc::new(MockSource::new("secondary", 2, Behavior::Rows(1500)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(44)));

        let router = ProviderRouter::new(
            vec![primary.clone(), secondary.clone()],
            local.clone(),
        );

        let error = router.load().await.unwrap_err();
        assert!(matches!(error, ResolveError::DirectoryUnavailable));
        assert_eq!(secondary.calls(), 0);
        assert_eq!(local.calls(), 0);
    }

    #[test]
    fn test_remotes_keep_registration_order() {
        let primary = Arc::new(MockSource::new("primary", 2, Behavior::Rows(1500)));
        let secondary = Arc::new(MockSource::new("secondary", 1, Behavior::Rows(1500)));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Rows(44)));

        let router = ProviderRouter::new(vec![primary, secondary], local);
        let ids: Vec<&str> = router.remotes().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["primary", "secondary"]);
    }

    #[tokio::test]
    async fn test_everything_failing_is_fatal() {
        let remote = Arc::new(MockSource::new("remote", 1, Behavior::Broken));
        let local = Arc::new(MockSource::new("local", 10, Behavior::Broken));

        let router = ProviderRouter::new(vec![remote], local.clone());

        let error = router.load().await.unwrap_err();
        assert!(matches!(error, ResolveError::DirectoryUnavailable));
        assert_eq!(local.calls(), 1);
    }
}
