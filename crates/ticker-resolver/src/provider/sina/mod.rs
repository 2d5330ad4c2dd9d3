//! Sina quotation source implementation.
//!
//! This module provides directory rows from the Sina batch quote endpoint:
//! - Quotes via http://hq.sinajs.cn/list=sh600000,sz000001,...
//!
//! The endpoint only answers for the identifiers it is asked about, so
//! snapshot fetches require a caller-supplied universe. Payloads are GBK
//! encoded; each line carries one `var hq_str_<venue><id>="..."` entry with
//! comma-separated fields. Unknown identifiers come back as `=""` and are
//! skipped.

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

const BASE_URL: &str = "http://hq.sinajs.cn";
const PROVIDER_ID: &str = "sina";
const BATCH_SIZE: usize = 800;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

// Comma-separated payload positions we consume. The full payload carries
// over thirty fields; the rest are bid/ask depth and session timestamps.
const FIELD_NAME: usize = 0;
const FIELD_PREV_CLOSE: usize = 2;
const FIELD_CURRENT: usize = 3;
const FIELD_VOLUME: usize = 8;
const FIELD_TURNOVER: usize = 9;
const MIN_FIELDS: usize = 10;

// ============================================================================
// SinaProvider
// ============================================================================

/// Sina batch quote source.
///
/// The endpoint tolerates very large batches, so the default policy asks
/// for 800 identifiers per request.
pub struct SinaProvider {
    client: Client,
    policy: BatchPolicy,
}

impl SinaProvider {
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
        let url = format!("{}/list={}", BASE_URL, list);

        let request = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Referer", "https://finance.sina.com.cn");

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

impl Default for SinaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryProvider for SinaProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
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

/// Parses one `var hq_str_sh600000="...";` line. Returns `None` for
/// noise lines and for identifiers the endpoint does not know (`=""`).
fn parse_line(line: &str) -> Option<DirectoryRow> {
    let rest = line.split_once("hq_str_")?.1;
    let (symbol, payload) = rest.split_once('=')?;
    let identifier = symbol.get(2..)?;
    if identifier.is_empty() {
        return None;
    }

    let payload = payload.trim().trim_end_matches(';').trim_matches('"');
    if payload.is_empty() {
        return None;
    }
    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let mut row = DirectoryRow::new(identifier, fields[FIELD_NAME].trim());
    let prev_close = parse_decimal(fields[FIELD_PREV_CLOSE]);
    let current = parse_decimal(fields[FIELD_CURRENT]);
    row.last_price = current;
    row.volume = parse_decimal(fields[FIELD_VOLUME]);
    row.turnover = parse_decimal(fields[FIELD_TURNOVER]);
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
