//! Netease quotation source implementation.
//!
//! This module provides directory rows from the Netease feed endpoint:
//! - Quotes via http://api.money.126.net/data/feed/0600000,1000001,...
//!
//! Identifiers are addressed with a one-digit venue prefix: `0` for
//! Shanghai, `1` for everything else. The response is a UTF-8 JSONP
//! payload (`_ntes_quote_callback({...});`) keyed by prefixed identifier.
//! Change percent arrives as a fraction and is rescaled to percent.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::ResolveError;
use crate::models::{DirectoryRow, Snapshot, SnapshotSource};
use crate::normalizer::Market;
use crate::provider::{BatchPolicy, DirectoryProvider, ProviderCapabilities};

const BASE_URL: &str = "http://api.money.126.net";
const PROVIDER_ID: &str = "netease";
const BATCH_SIZE: usize = 200;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

// ============================================================================
// API Response Structures
// ============================================================================

/// One entry of the feed payload.
#[derive(Debug, Deserialize)]
struct FeedQuote {
    /// Display name
    name: Option<String>,
    /// Last price
    price: Option<Decimal>,
    /// Change as a fraction of the previous close
    percent: Option<Decimal>,
    /// Absolute change
    updown: Option<Decimal>,
    /// Traded volume
    volume: Option<Decimal>,
    /// Traded turnover
    turnover: Option<Decimal>,
}

// ============================================================================
// NeteaseProvider
// ============================================================================

/// Netease feed quote source.
pub struct NeteaseProvider {
    client: Client,
    policy: BatchPolicy,
}

impl NeteaseProvider {
    pub fn new() -> Self {
        Self::with_policy(BatchPolicy::new(BATCH_SIZE, Duration::from_millis(500)))
    }

    /// Create a source with custom batch spacing.
    pub fn with_policy(policy: BatchPolicy) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, policy }
    }

    /// Fetch one batch of quotes and parse the JSONP wrapper.
    async fn fetch(&self, identifiers: &[String]) -> Result<Vec<DirectoryRow>, ResolveError> {
        let list = identifiers
            .iter()
            .map(|id| format!("{}{}", feed_prefix(id), id))
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/data/feed/{}", BASE_URL, list);

        let request = self.client.get(&url).header("User-Agent", USER_AGENT);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(ResolveError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ResolveError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ResolveError::SourceError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let text = response.text().await?;
        parse_payload(&text).ok_or_else(|| ResolveError::Decode {
            provider: PROVIDER_ID.to_string(),
            message: "malformed JSONP payload".to_string(),
        })
    }
}

impl Default for NeteaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryProvider for NeteaseProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        4
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            snapshot: true,
            quote_lookup: true,
            needs_universe: true,
        }
    }

    async fn fetch_snapshot(&self, universe: Option<&[String]>) -> Result<Snapshot, ResolveError> {
        let universe = universe.ok_or_else(|| ResolveError::SourceError {
            provider: PROVIDER_ID.to_string(),
            message: "snapshot requires an identifier universe".to_string(),
        })?;

        let mut rows = Vec::with_capacity(universe.len());
        for (i, chunk) in self.policy.chunks(universe).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.policy.pause).await;
            }
            rows.extend(self.fetch(chunk).await?);
        }
        debug!(
            "{}: quoted {} of {} identifiers",
            PROVIDER_ID,
            rows.len(),
            universe.len()
        );
        Ok(Snapshot::new(
            SnapshotSource::Provider(PROVIDER_ID.into()),
            rows,
        ))
    }

    async fn lookup_quote(&self, identifier: &str) -> Result<Option<DirectoryRow>, ResolveError> {
        let rows = self.fetch(&[identifier.to_string()]).await?;
        Ok(rows.into_iter().next())
    }
}

// ============================================================================
// Payload parsing
// ============================================================================

/// One-digit venue prefix used by the feed endpoint.
fn feed_prefix(identifier: &str) -> &'static str {
    match Market::classify(identifier) {
        Market::Shanghai => "0",
        _ => "1",
    }
}

fn parse_payload(text: &str) -> Option<Vec<DirectoryRow>> {
    let json = strip_jsonp(text)?;
    let entries: HashMap<String, FeedQuote> = serde_json::from_str(json).ok()?;

    let mut rows = Vec::with_capacity(entries.len());
    for (key, quote) in entries {
        let identifier = key.get(1..).unwrap_or_default();
        let Some(name) = quote.name else { continue };
        if identifier.is_empty() || name.is_empty() {
            continue;
        }
        let mut row = DirectoryRow::new(identifier, name.trim());
        row.last_price = quote.price;
        row.change_percent = quote
            .percent
            .map(|fraction| (fraction * Decimal::ONE_HUNDRED).round_dp(2));
        row.change_amount = quote.updown;
        row.volume = quote.volume;
        row.turnover = quote.turnover;
        rows.push(row);
    }
    Some(rows)
}

/// Strips the `_ntes_quote_callback(...)` wrapper.
fn strip_jsonp(text: &str) -> Option<&str> {
    let start = text.find('(')?;
    let end = text.rfind(')')?;
    text.get(start + 1..end)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = concat!(
        "_ntes_quote_callback({",
        "\"0600000\": {\"code\": \"0600000\", \"name\": \"浦发银行\", \"price\": 7.52, ",
        "\"percent\": 0.0027, \"updown\": 0.02, \"volume\": 252345, \"turnover\": 189456789.0},",
        "\"1000001\": {\"code\": \"1000001\", \"name\": \"平安银行\", \"price\": 11.73, ",
        "\"percent\": 0.0026, \"updown\": 0.03, \"volume\": 987654, \"turnover\": 1145678901.0}",
        "});"
    );

    #[test]
    fn test_parse_payload_strips_wrapper_and_prefix() {
        let rows = parse_payload(SAMPLE).unwrap();
        assert_eq!(rows.len(), 2);

        let row = rows.iter().find(|r| r.identifier == "600000").unwrap();
        assert_eq!(row.display_name, "浦发银行");
        assert_eq!(row.last_price, Some(dec!(7.52)));
        assert_eq!(row.change_amount, Some(dec!(0.02)));
    }

    #[test]
    fn test_percent_fraction_is_rescaled() {
        let rows = parse_payload(SAMPLE).unwrap();
        let row = rows.iter().find(|r| r.identifier == "000001").unwrap();
        assert_eq!(row.change_percent, Some(dec!(0.26)));
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        assert!(parse_payload("no wrapper here").is_none());
        assert!(parse_payload("_ntes_quote_callback(not json);").is_none());
    }

    #[test]
    fn test_feed_prefix() {
        assert_eq!(feed_prefix("600000"), "0");
        assert_eq!(feed_prefix("000001"), "1");
        assert_eq!(feed_prefix("830799"), "1");
    }
}
