//! Tencent quotation source implementation.
//!
//! This module provides directory rows from the Tencent batch quote endpoint:
//! - Quotes via http://qt.gtimg.cn/q=sh600000,sz000001,...
//!
//! Like Sina, the endpoint only answers for the identifiers it is asked
//! about and responds in GBK. Each line carries one `v_<venue><id>="..."`
//! entry with tilde-separated fields. The endpoint reports no turnover, so
//! it is approximated as volume times last price.

use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::GBK;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;

use crate::errors::ResolveError;
use crate::models::{DirectoryRow, Snapshot, SnapshotSource};
use crate::normalizer::venue_prefix;
use crate::provider::{BatchPolicy, DirectoryProvider, ProviderCapabilities};

const BASE_URL: &str = "http://qt.gtimg.cn";
const PROVIDER_ID: &str = "tencent";
const BATCH_SIZE: usize = 100;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

// Tilde-separated payload positions we consume.
const FIELD_NAME: usize = 1;
const FIELD_IDENTIFIER: usize = 2;
const FIELD_CURRENT: usize = 3;
const FIELD_PREV_CLOSE: usize = 4;
const FIELD_VOLUME: usize = 6;
const MIN_FIELDS: usize = 7;

// ============================================================================
// TencentProvider
// ============================================================================

/// Tencent batch quote source.
pub struct TencentProvider {
    client: Client,
    policy: BatchPolicy,
}

impl TencentProvider {
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

    /// Fetch and decode one batch of quotes.
    async fn fetch(&self, identifiers: &[String]) -> Result<String, ResolveError> {
        let list = identifiers
            .iter()
            .map(|id| format!("{}{}", venue_prefix(id), id))
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/q={}", BASE_URL, list);

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

        let bytes = response.bytes().await?;
        let (text, _, had_errors) = GBK.decode(&bytes);
        if had_errors {
            debug!("{}: payload contained invalid GBK sequences", PROVIDER_ID);
        }
        Ok(text.into_owned())
    }
}

impl Default for TencentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryProvider for TencentProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
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
            let text = self.fetch(chunk).await?;
            rows.extend(parse_payload(&text));
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
        let text = self.fetch(&[identifier.to_string()]).await?;
        Ok(parse_payload(&text).into_iter().next())
    }
}

// ============================================================================
// Payload parsing
// ============================================================================

fn parse_payload(text: &str) -> Vec<DirectoryRow> {
    text.lines().filter_map(parse_line).collect()
}

/// Parses one `v_sh600000="1~浦发银行~600000~...";` line.
fn parse_line(line: &str) -> Option<DirectoryRow> {
    let rest = line.split_once("v_")?.1;
    let (_, payload) = rest.split_once('=')?;
    let payload = payload.trim().trim_end_matches(';').trim_matches('"');
    if payload.is_empty() {
        return None;
    }
    let fields: Vec<&str> = payload.split('~').collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let identifier = fields[FIELD_IDENTIFIER].trim();
    if identifier.is_empty() {
        return None;
    }
    let mut row = DirectoryRow::new(identifier, fields[FIELD_NAME].trim());
    let current = parse_decimal(fields[FIELD_CURRENT]);
    let prev_close = parse_decimal(fields[FIELD_PREV_CLOSE]);
    let volume = parse_decimal(fields[FIELD_VOLUME]);
    row.last_price = current;
    row.volume = volume;
    if let (Some(volume), Some(current)) = (volume, current) {
        row.turnover = Some((volume * current).round_dp(2));
    }
    if let (Some(prev), Some(current)) = (prev_close, current) {
        if !prev.is_zero() {
            let change = current - prev;
            row.change_amount = Some(change.round_dp(2));
            row.change_percent = Some((change / prev * Decimal::ONE_HUNDRED).round_dp(2));
        }
    }
    Some(row)
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    value.trim().parse().ok()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = concat!(
        "v_sh600000=\"1~浦发银行~600000~7.52~7.50~7.51~252345~126172~126173~7.52~86\";\n",
        "v_sz000001=\"51~平安银行~000001~11.73~11.70~11.71~987654~493827~493827~11.73~12\";\n",
    );

    #[test]
    fn test_parse_payload_extracts_rows() {
        let rows = parse_payload(SAMPLE);
        assert_eq!(rows.len(), 2);

        let row = &rows[0];
        assert_eq!(row.identifier, "600000");
        assert_eq!(row.display_name, "浦发银行");
        assert_eq!(row.last_price, Some(dec!(7.52)));
        assert_eq!(row.volume, Some(dec!(252345)));
    }

    #[test]
    fn test_turnover_is_approximated_from_volume() {
        let rows = parse_payload(SAMPLE);
        let row = &rows[0];
        assert_eq!(row.turnover, Some(dec!(1897634.40)));
    }

    #[test]
    fn test_change_is_derived_from_previous_close() {
        let rows = parse_payload(SAMPLE);
        let row = &rows[1];
        assert_eq!(row.change_amount, Some(dec!(0.03)));
        assert_eq!(row.change_percent, Some(dec!(0.26)));
    }

    #[test]
    fn test_empty_and_noise_payloads_are_skipped() {
        assert!(parse_payload("v_sz999999=\"\";\n").is_empty());
        assert!(parse_payload("pv_none=1\n").is_empty());
    }
}
