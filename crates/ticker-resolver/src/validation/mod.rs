//! Cross-provider validation of resolved identifiers.
//!
//! A resolution that looks fine against one directory can still be stale or
//! wrong. The validator asks every quote-capable source for the identifier
//! independently and scores how much they agree with the resolved name.
//! Sources are queried concurrently; one source failing only costs its own
//! vote.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use log::debug;
use rust_decimal::Decimal;

use crate::matching::{Matcher, MatchingEngine};
use crate::models::{ProviderFinding, ResolutionResult, ResolutionStatus, ValidationSummary};
use crate::provider::DirectoryProvider;

/// Validator tuning knobs.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Confidence below which a resolved row is downgraded to
    /// `resolved-low-confidence`.
    pub confidence_threshold: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
        }
    }
}

/// Scores cross-source agreement for one resolved identifier.
pub struct CrossValidator {
    providers: Vec<Arc<dyn DirectoryProvider>>,
    config: ValidatorConfig,
}

impl CrossValidator {
    pub fn new(providers: Vec<Arc<dyn DirectoryProvider>>) -> Self {
        Self::with_config(providers, ValidatorConfig::default())
    }

    pub fn with_config(providers: Vec<Arc<dyn DirectoryProvider>>, config: ValidatorConfig) -> Self {
        Self { providers, config }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.config.confidence_threshold
    }

    /// Query every quote-capable source for `identifier` and summarize
    /// agreement with `expected_name`.
    ///
    /// Queries run concurrently and are isolated: a source that errors or
    /// times out is recorded as not having found the identifier. Name
    /// agreement is literal equality with the listed name.
    pub async fn cross_validate(&self, identifier: &str, expected_name: &str) -> ValidationSummary {
        let queries = self
            .providers
            .iter()
            .filter(|provider| provider.capabilities().quote_lookup)
            .map(|provider| async move {
                match provider.lookup_quote(identifier).await {
                    Ok(Some(row)) => ProviderFinding {
                        provider: provider.id().into(),
                        found: true,
                        name_matches: row.display_name == expected_name,
                        name: Some(row.display_name),
                        price: row.last_price,
                    },
                    Ok(None) => miss(provider.id()),
                    Err(error) => {
                        debug!(
                            "validation lookup on '{}' failed for {}: {}",
                            provider.id(),
                            identifier,
                            error
                        );
                        miss(provider.id())
                    }
                }
            });

        ValidationSummary::from_findings(join_all(queries).await)
    }
}

fn miss(provider: &'static str) -> ProviderFinding {
    ProviderFinding {
        provider: provider.into(),
        found: false,
        name: None,
        price: None,
        name_matches: false,
    }
}

/// Matcher that cross-validates every successful resolution.
///
/// Unresolved rows pass through untouched; resolved rows pick up a
/// validation summary and are downgraded when agreement is too thin.
pub struct ValidatedMatcher {
    engine: Arc<MatchingEngine>,
    validator: Arc<CrossValidator>,
}

impl ValidatedMatcher {
    pub fn new(engine: Arc<MatchingEngine>, validator: Arc<CrossValidator>) -> Self {
        Self { engine, validator }
    }
}

#[async_trait]
impl Matcher for ValidatedMatcher {
    async fn resolve(&self, input: &str, reference_price: Option<Decimal>) -> ResolutionResult {
        let result = self.engine.match_by_identifier(input, reference_price);
        if result.status != ResolutionStatus::Resolved {
            return result;
        }
        let (identifier, name) = match (&result.resolved_identifier, &result.resolved_name) {
            (Some(identifier), Some(name)) => (identifier.clone(), name.clone()),
            _ => return result,
        };

        let summary = self.validator.cross_validate(&identifier, &name).await;
        if summary.providers_queried == 0 {
            // Nothing to vote; an empty panel must not downgrade the row.
            return result;
        }
        result.with_validation(summary, self.validator.confidence_threshold())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ResolveError;
    use crate::models::{DirectoryRow, Snapshot, SnapshotSource};
    use crate::provider::ProviderCapabilities;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Found(&'static str),
        Miss,
        Fail,
    }

    struct MockQuoteSource {
        id: &'static str,
        quote_lookup: bool,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockQuoteSource {
        fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                quote_lookup: true,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn snapshot_only(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                quote_lookup: false,
                behavior: Behavior::Miss,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DirectoryProvider for MockQuoteSource {
        fn id(&self) -> &'static str {
            self.id
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                snapshot: !self.quote_lookup,
                quote_lookup: self.quote_lookup,
                needs_universe: false,
            }
        }

        async fn lookup_quote(
            &self,
            identifier: &str,
        ) -> Result<Option<DirectoryRow>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Found(name) => {
                    let mut row = DirectoryRow::new(identifier, *name);
                    row.last_price = Some(dec!(7.52));
                    Ok(Some(row))
                }
                Behavior::Miss => Ok(None),
                Behavior::Fail => Err(ResolveError::Timeout {
                    provider: self.id.to_string(),
                }),
            }
        }
    }

    fn validator(
        sources: Vec<Arc<MockQuoteSource>>,
    ) -> CrossValidator {
        let providers: Vec<Arc<dyn DirectoryProvider>> = sources
            .into_iter()
            .map(|source| source as Arc<dyn DirectoryProvider>)
            .collect();
        CrossValidator::new(providers)
    }

    #[tokio::test]
    async fn test_agreement_across_sources() {
        let validator = validator(vec![
            MockQuoteSource::new("sina", Behavior::Found("浦发银行")),
            MockQuoteSource::new("tencent", Behavior::Found("浦发银行")),
            MockQuoteSource::new("xueqiu", Behavior::Miss),
        ]);

        let summary = validator.cross_validate("600000", "浦发银行").await;
        assert_eq!(summary.providers_queried, 3);
        assert_eq!(summary.found_count, 2);
        assert_eq!(summary.name_match_count, 2);
        assert!((summary.confidence - 2.0 / 3.0).abs() < f64::EPSILON);
        assert!((summary.name_consistency - 1.0).abs() < f64::EPSILON);
        assert_eq!(summary.consensus_name.as_deref(), Some("浦发银行"));
    }

    #[tokio::test]
    async fn test_source_failure_costs_only_its_own_vote() {
        let failing = MockQuoteSource::new("sina", Behavior::Fail);
        let validator = validator(vec![
            failing.clone(),
            MockQuoteSource::new("tencent", Behavior::Found("浦发银行")),
        ]);

        let summary = validator.cross_validate("600000", "浦发银行").await;
        assert_eq!(failing.calls(), 1);
        assert_eq!(summary.providers_queried, 2);
        assert_eq!(summary.found_count, 1);
        assert!((summary.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_name_agreement_is_literal() {
        let validator = validator(vec![MockQuoteSource::new(
            "sina",
            Behavior::Found("万 科A"),
        )]);

        let summary = validator.cross_validate("000002", "万科A").await;
        assert_eq!(summary.found_count, 1);
        assert_eq!(summary.name_match_count, 0);
        assert_eq!(summary.name_consistency, 0.0);
    }

    #[tokio::test]
    async fn test_snapshot_only_sources_are_not_queried() {
        let bystander = MockQuoteSource::snapshot_only("eastmoney");
        let validator = validator(vec![
            bystander.clone(),
            MockQuoteSource::new("sina", Behavior::Found("浦发银行")),
        ]);

        let summary = validator.cross_validate("600000", "浦发银行").await;
        assert_eq!(bystander.calls(), 0);
        assert_eq!(summary.providers_queried, 1);
        assert!((summary.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_confidence_is_monotonic_in_finding_sources() {
        let disagreeing = validator(vec![
            MockQuoteSource::new("sina", Behavior::Found("浦发银行")),
            MockQuoteSource::new("tencent", Behavior::Miss),
        ]);
        let with_extra_finder = validator(vec![
            MockQuoteSource::new("sina", Behavior::Found("浦发银行")),
            MockQuoteSource::new("tencent", Behavior::Miss),
            MockQuoteSource::new("xueqiu", Behavior::Found("浦发银行")),
        ]);

        let base = disagreeing.cross_validate("600000", "浦发银行").await;
        let extended = with_extra_finder.cross_validate("600000", "浦发银行").await;
        assert!(extended.confidence >= base.confidence);
    }

    #[tokio::test]
    async fn test_name_consistency_rises_when_dissenters_drop_out() {
        let with_dissenter = validator(vec![
            MockQuoteSource::new("sina", Behavior::Found("浦发银行")),
            MockQuoteSource::new("tencent", Behavior::Found("别的名字")),
            MockQuoteSource::new("xueqiu", Behavior::Miss),
        ]);
        let agreeing_only = validator(vec![
            MockQuoteSource::new("sina", Behavior::Found("浦发银行")),
            MockQuoteSource::new("xueqiu", Behavior::Miss),
        ]);

        let base = with_dissenter.cross_validate("600000", "浦发银行").await;
        let trimmed = agreeing_only.cross_validate("600000", "浦发银行").await;
        assert!((base.name_consistency - 0.5).abs() < f64::EPSILON);
        assert!(trimmed.name_consistency >= base.name_consistency);
        assert!((trimmed.name_consistency - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_name_consistency_holds_when_every_finder_dissents() {
        let dissenting = validator(vec![
            MockQuoteSource::new("sina", Behavior::Found("别的名字")),
            MockQuoteSource::new("tencent", Behavior::Found("另一个名字")),
        ]);
        let emptied = validator(vec![MockQuoteSource::new("xueqiu", Behavior::Miss)]);

        let base = dissenting.cross_validate("600000", "浦发银行").await;
        let trimmed = emptied.cross_validate("600000", "浦发银行").await;
        assert_eq!(base.found_count, 2);
        assert_eq!(base.name_consistency, 0.0);
        assert_eq!(trimmed.found_count, 0);
        assert_eq!(trimmed.name_consistency, 0.0);
        assert!(trimmed.name_consistency >= base.name_consistency);
    }

    fn engine() -> Arc<MatchingEngine> {
        let mut row = DirectoryRow::new("600000", "浦发银行");
        row.last_price = Some(dec!(7.52));
        let snapshot = Arc::new(Snapshot::new(
            SnapshotSource::Provider("test".into()),
            vec![row],
        ));
        Arc::new(MatchingEngine::new(snapshot))
    }

    #[tokio::test]
    async fn test_validated_matcher_downgrades_on_thin_agreement() {
        let matcher = ValidatedMatcher::new(
            engine(),
            Arc::new(validator(vec![
                MockQuoteSource::new("sina", Behavior::Miss),
                MockQuoteSource::new("tencent", Behavior::Miss),
            ])),
        );

        let result = matcher.resolve("600000", None).await;
        assert_eq!(result.status, ResolutionStatus::ResolvedLowConfidence);
        let summary = result.validation.unwrap();
        assert_eq!(summary.found_count, 0);
    }

    #[tokio::test]
    async fn test_validated_matcher_keeps_backed_resolutions() {
        let matcher = ValidatedMatcher::new(
            engine(),
            Arc::new(validator(vec![
                MockQuoteSource::new("sina", Behavior::Found("浦发银行")),
                MockQuoteSource::new("tencent", Behavior::Found("浦发银行")),
            ])),
        );

        let result = matcher.resolve("600000", None).await;
        assert_eq!(result.status, ResolutionStatus::Resolved);
        assert!(result.validation.is_some());
    }

    #[tokio::test]
    async fn test_validated_matcher_passes_unresolved_through() {
        let source = MockQuoteSource::new("sina", Behavior::Found("浦发银行"));
        let matcher = ValidatedMatcher::new(engine(), Arc::new(validator(vec![source.clone()])));

        let invalid = matcher.resolve("abc", None).await;
        assert_eq!(invalid.status, ResolutionStatus::InvalidFormat);
        assert!(invalid.validation.is_none());

        let missing = matcher.resolve("600999", None).await;
        assert_eq!(missing.status, ResolutionStatus::NotFound);
        assert!(missing.validation.is_none());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_panel_does_not_downgrade() {
        let matcher = ValidatedMatcher::new(engine(), Arc::new(validator(Vec::new())));

        let result = matcher.resolve("600000", None).await;
        assert_eq!(result.status, ResolutionStatus::Resolved);
        assert!(result.validation.is_none());
    }
}
