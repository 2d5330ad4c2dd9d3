//! Eastmoney quotation source implementation.
//!
//! This module provides the full-market directory from the Eastmoney
//! screener endpoint:
//! - All listed A-shares via /api/qt/clist/get
//!
//! Unlike the venue quote endpoints, this one enumerates the whole market
//! in a single paged request, so it needs no identifier universe and is the
//! preferred way to discover the directory. Suspended securities report
//! `"-"` for their numeric fields, which parse to absent metrics.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ResolveError;
use crate::models::{DirectoryRow, Snapshot, SnapshotSource};
use crate::provider::{DirectoryProvider, ProviderCapabilities};

const BASE_URL: &str = "http://82.push2.eastmoney.com";
const PROVIDER_ID: &str = "eastmoney";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// Market filter covering SH main board, SZ main board, ChiNext, STAR and
/// the Beijing exchange.
const MARKET_FILTER: &str = "m:0+t:6,m:0+t:13,m:0+t:80,m:1+t:2,m:1+t:23,m:1+t:13";

/// Field selection for /clist. Only a handful are consumed; asking for the
/// full set keeps the endpoint serving the same cached page it serves the
/// official frontend.
const FIELD_LIST: &str = "f1,f2,f3,f4,f5,f6,f7,f8,f9,f10,f12,f13,f14,f15,f16,f17,f18,f20,f21,\
                          f23,f24,f25,f22,f11,f62,f128,f136,f115,f152";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /api/qt/clist/get
#[derive(Debug, Deserialize)]
struct ClistResponse {
    /// Return code, zero on success
    rc: i64,
    /// Payload, absent on errors
    data: Option<ClistData>,
}

#[derive(Debug, Deserialize)]
struct ClistData {
    /// One entry per listed security
    #[serde(default)]
    diff: Option<Vec<ClistRow>>,
}

/// Individual screener row. Numeric fields arrive as JSON numbers for
/// traded securities and as the string `"-"` for suspended ones.
#[derive(Debug, Deserialize)]
struct ClistRow {
    /// Identifier
    #[serde(default)]
    f12: Option<String>,
    /// Display name
    #[serde(default)]
    f14: Option<String>,
    /// Last price
    #[serde(default)]
    f2: Option<Value>,
    /// Change percent
    #[serde(default)]
    f3: Option<Value>,
    /// Change amount
    #[serde(default)]
    f4: Option<Value>,
    /// Volume (lots)
    #[serde(default)]
    f5: Option<Value>,
    /// Turnover
    #[serde(default)]
    f6: Option<Value>,
    /// Price/earnings ratio (dynamic)
    #[serde(default)]
    f9: Option<Value>,
    /// Price/book ratio
    #[serde(default)]
    f23: Option<Value>,
}

// ============================================================================
// EastmoneyProvider
// ============================================================================

/// Eastmoney full-market screener source.
pub struct EastmoneyProvider {
    client: Client,
}

impl EastmoneyProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

impl Default for EastmoneyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryProvider for EastmoneyProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            snapshot: true,
            quote_lookup: false,
            needs_universe: false,
        }
    }

    async fn fetch_snapshot(&self, _universe: Option<&[String]>) -> Result<Snapshot, ResolveError> {
        let url = format!("{}/api/qt/clist/get", BASE_URL);
        let request = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("pn", "1"),
                ("pz", "6000"),
                ("po", "1"),
                ("np", "1"),
                ("ut", "bd1d9ddb04089700cf9c27f6f7426281"),
                ("fltt", "2"),
                ("invt", "2"),
                ("fid", "f3"),
                ("fs", MARKET_FILTER),
                ("fields", FIELD_LIST),
            ]);

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

        let payload: ClistResponse =
            response
                .json()
                .await
                .map_err(|e| ResolveError::Decode {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })?;

        if payload.rc != 0 {
            return Err(ResolveError::SourceError {
                provider: PROVIDER_ID.to_string(),
                message: format!("rc {}", payload.rc),
            });
        }
        let diff = payload
            .data
            .and_then(|data| data.diff)
            .ok_or_else(|| ResolveError::Decode {
                provider: PROVIDER_ID.to_string(),
                message: "missing data.diff".to_string(),
            })?;

        let rows = convert_rows(diff);
        debug!("{}: screener returned {} rows", PROVIDER_ID, rows.len());
        Ok(Snapshot::new(
            SnapshotSource::Provider(PROVIDER_ID.into()),
            rows,
        ))
    }
}

// ============================================================================
// Row conversion
// ============================================================================

fn convert_rows(diff: Vec<ClistRow>) -> Vec<DirectoryRow> {
    diff.into_iter()
        .filter_map(|entry| {
            let identifier = entry.f12?;
            let name = entry.f14?;
            if identifier.is_empty() || name.is_empty() {
                return None;
            }
            let mut row = DirectoryRow::new(identifier, name.trim());
            row.last_price = value_decimal(&entry.f2);
            row.change_percent = value_decimal(&entry.f3);
            row.change_amount = value_decimal(&entry.f4);
            row.volume = value_decimal(&entry.f5);
            row.turnover = value_decimal(&entry.f6);
            row.pe_ratio = value_decimal(&entry.f9);
            row.pb_ratio = value_decimal(&entry.f23);
            Some(row)
        })
        .collect()
}

/// Converts a screener value to a decimal. Suspended securities report the
/// string `"-"`, which comes back as `None`.
fn value_decimal(value: &Option<Value>) -> Option<Decimal> {
    match value.as_ref()? {
        Value::Number(number) => number.to_string().parse().ok(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"{
        "rc": 0,
        "rt": 6,
        "data": {
            "total": 3,
            "diff": [
                {"f12": "600000", "f14": "浦发银行", "f2": 7.52, "f3": 0.27, "f4": 0.02,
                 "f5": 252345, "f6": 189456789.0, "f9": 5.21, "f23": 0.52},
                {"f12": "000001", "f14": "平安银行", "f2": 11.73, "f3": 0.26, "f4": 0.03,
                 "f5": 987654, "f6": 1145678901.0, "f9": 4.89, "f23": 0.61},
                {"f12": "300750", "f14": "宁德时代", "f2": "-", "f3": "-", "f4": "-",
                 "f5": "-", "f6": "-", "f9": "-", "f23": "-"}
            ]
        }
    }"#;

    #[test]
    fn test_convert_rows_maps_screener_fields() {
        let payload: ClistResponse = serde_json::from_str(SAMPLE).unwrap();
        let diff = payload.data.unwrap().diff.unwrap();
        let rows = convert_rows(diff);
        assert_eq!(rows.len(), 3);

        let row = &rows[0];
        assert_eq!(row.identifier, "600000");
        assert_eq!(row.display_name, "浦发银行");
        assert_eq!(row.last_price, Some(dec!(7.52)));
        assert_eq!(row.change_percent, Some(dec!(0.27)));
        assert_eq!(row.pe_ratio, Some(dec!(5.21)));
        assert_eq!(row.pb_ratio, Some(dec!(0.52)));
    }

    #[test]
    fn test_suspended_rows_have_no_metrics() {
        let payload: ClistResponse = serde_json::from_str(SAMPLE).unwrap();
        let rows = convert_rows(payload.data.unwrap().diff.unwrap());
        let suspended = &rows[2];
        assert_eq!(suspended.display_name, "宁德时代");
        assert_eq!(suspended.last_price, None);
        assert_eq!(suspended.volume, None);
    }

    #[test]
    fn test_rows_without_identifier_or_name_are_dropped() {
        let diff = vec![
            ClistRow {
                f12: None,
                f14: Some("无代码".to_string()),
                f2: None,
                f3: None,
                f4: None,
                f5: None,
                f6: None,
                f9: None,
                f23: None,
            },
            ClistRow {
                f12: Some("600000".to_string()),
                f14: None,
                f2: None,
                f3: None,
                f4: None,
                f5: None,
                f6: None,
                f9: None,
                f23: None,
            },
        ];
        assert!(convert_rows(diff).is_empty());
    }
}
