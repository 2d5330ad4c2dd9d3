//! Xueqiu quotation source implementation.
//!
//! This module provides per-identifier quotes from the Xueqiu API:
//! - Single quotes via /v5/stock/quote.json?symbol=SH600000&extend=detail
//!
//! The endpoint answers one identifier at a time and expects browser-like
//! headers, so it is not a snapshot source. It is mainly used during
//! cross-validation, where one lookup per source is all that's needed.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::ResolveError;
use crate::models::DirectoryRow;
use crate::normalizer::venue_prefix;
use crate::provider::{DirectoryProvider, ProviderCapabilities};

const BASE_URL: &str = "https://stock.xueqiu.com";
const PROVIDER_ID: &str = "xueqiu";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /v5/stock/quote.json
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Zero on success
    error_code: Option<i64>,
    /// Human-readable failure reason
    error_description: Option<String>,
    /// Payload, absent on errors
    data: Option<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    quote: Option<XueqiuQuote>,
}

#[derive(Debug, Deserialize)]
struct XueqiuQuote {
    /// Display name
    name: Option<String>,
    /// Last price
    current: Option<Decimal>,
    /// Change percent (already scaled to percent)
    percent: Option<Decimal>,
    /// Absolute change
    chg: Option<Decimal>,
    /// Traded volume
    volume: Option<Decimal>,
    /// Traded turnover
    amount: Option<Decimal>,
    /// Trailing price/earnings ratio
    pe_ttm: Option<Decimal>,
    /// Price/book ratio
    pb: Option<Decimal>,
}

// ============================================================================
// XueqiuProvider
// ============================================================================

/// Xueqiu single-quote source.
pub struct XueqiuProvider {
    client: Client,
}

impl XueqiuProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

impl Default for XueqiuProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryProvider for XueqiuProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            snapshot: false,
            quote_lookup: true,
            needs_universe: false,
        }
    }

    async fn lookup_quote(&self, identifier: &str) -> Result<Option<DirectoryRow>, ResolveError> {
        let symbol = format!("{}{}", venue_prefix(identifier).to_uppercase(), identifier);
        let url = format!("{}/v5/stock/quote.json", BASE_URL);

        let request = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Referer", "https://xueqiu.com/")
            .query(&[("symbol", symbol.as_str()), ("extend", "detail")]);

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

        let payload: QuoteResponse =
            response
                .json()
                .await
                .map_err(|e| ResolveError::Decode {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })?;

        // The API reports unknown symbols through error_code, not HTTP
        // status. Treat those as a miss rather than a source failure.
        if payload.error_code.unwrap_or(0) != 0 {
            debug!(
                "{}: {} -> {}",
                PROVIDER_ID,
                symbol,
                payload.error_description.as_deref().unwrap_or("error")
            );
            return Ok(None);
        }

        let Some(quote) = payload.data.and_then(|data| data.quote) else {
            return Ok(None);
        };
        Ok(convert_quote(identifier, quote))
    }
}

fn convert_quote(identifier: &str, quote: XueqiuQuote) -> Option<DirectoryRow> {
    let name = quote.name?;
    if name.is_empty() {
        return None;
    }
    let mut row = DirectoryRow::new(identifier, name.trim());
    row.last_price = quote.current;
    row.change_percent = quote.percent;
    row.change_amount = quote.chg;
    row.volume = quote.volume;
    row.turnover = quote.amount;
    row.pe_ratio = quote.pe_ttm;
    row.pb_ratio = quote.pb;
    Some(row)
}

// ============================================================================
// TESTS
// ============================================================================
