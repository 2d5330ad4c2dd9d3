//! Indexed point-in-time copies of the security directory.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::debug;

use super::directory::DirectoryRow;
use super::types::ProviderId;
use crate::normalizer::Market;

/// Where a snapshot was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Parsed from a file on disk
    LocalFile(PathBuf),
    /// Fetched from a remote quotation source
    Provider(ProviderId),
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::LocalFile(path) => write!(f, "local file {}", path.display()),
            SnapshotSource::Provider(id) => write!(f, "provider {}", id),
        }
    }
}

/// A point-in-time copy of the security directory, indexed by identifier.
///
/// Construction deduplicates on identifier (first row wins) so lookups are
/// unambiguous no matter how messy the source data was.
#[derive(Debug, Clone)]
pub struct Snapshot {
    rows: Vec<DirectoryRow>,
    index: HashMap<String, usize>,
    source: SnapshotSource,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(source: SnapshotSource, rows: Vec<DirectoryRow>) -> Self {
        let mut unique = Vec::with_capacity(rows.len());
        let mut index = HashMap::with_capacity(rows.len());
        for row in rows {
            match index.entry(row.identifier.clone()) {
                Entry::Occupied(_) => {
                    debug!("dropping duplicate directory row for {}", row.identifier);
                }
                Entry::Vacant(slot) => {
                    slot.insert(unique.len());
                    unique.push(row);
                }
            }
        }
        Self {
            rows: unique,
            index,
            source,
            loaded_at: Utc::now(),
        }
    }

    /// Constant-time lookup by canonical identifier.
    pub fn lookup(&self, identifier: &str) -> Option<&DirectoryRow> {
        self.index.get(identifier).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[DirectoryRow] {
        &self.rows
    }

    /// All identifiers in row order, e.g. as a universe for quotation
    /// sources that can only answer per-identifier queries.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.identifier.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn source(&self) -> &SnapshotSource {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Aggregate counts, shaped for log lines.
    pub fn stats(&self) -> SnapshotStats {
        let mut by_market: HashMap<Market, usize> = HashMap::new();
        for row in &self.rows {
            *by_market.entry(row.market()).or_insert(0) += 1;
        }
        SnapshotStats {
            row_count: self.rows.len(),
            priced_count: self.rows.iter().filter(|r| r.last_price.is_some()).count(),
            by_market,
        }
    }
}

/// Aggregate counts for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStats {
    /// Total rows after deduplication
    pub row_count: usize,
    /// Rows carrying a last price
    pub priced_count: usize,
    /// Rows per exchange venue
    pub by_market: HashMap<Market, usize>,
}

impl fmt::Display for SnapshotStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows, {} priced", self.row_count, self.priced_count)?;
        for market in [
            Market::Shanghai,
            Market::Shenzhen,
            Market::Beijing,
            Market::Other,
        ] {
            if let Some(count) = self.by_market.get(&market) {
                write!(f, ", {} {}", market, count)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(rows: Vec<DirectoryRow>) -> Snapshot {
        Snapshot::new(SnapshotSource::Provider("test".into()), rows)
    }

    #[test]
    fn test_first_row_wins_on_duplicate_identifier() {
        let snap = snapshot(vec![
            DirectoryRow::new("600000", "浦发银行"),
            DirectoryRow::new("600000", "重复行"),
            DirectoryRow::new("000001", "平安银行"),
        ]);
        assert_eq!(snap.len(), 2);
        let row = snap.lookup("600000");
        assert_eq!(row.map(|r| r.display_name.as_str()), Some("浦发银行"));
    }

    #[test]
    fn test_lookup_misses_absent_identifier() {
        let snap = snapshot(vec![DirectoryRow::new("600000", "浦发银行")]);
        assert!(snap.lookup("600001").is_none());
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_identifiers_preserve_row_order() {
        let snap = snapshot(vec![
            DirectoryRow::new("600000", "浦发银行"),
            DirectoryRow::new("000001", "平安银行"),
            DirectoryRow::new("830799", "艾融软件"),
        ]);
        let ids: Vec<&str> = snap.identifiers().collect();
        assert_eq!(ids, vec!["600000", "000001", "830799"]);
    }

    #[test]
    fn test_stats_count_markets_and_priced_rows() {
        let mut priced = DirectoryRow::new("600000", "浦发银行");
        priced.last_price = Some(dec!(7.5));
        let snap = snapshot(vec![
            priced,
            DirectoryRow::new("000001", "平安银行"),
            DirectoryRow::new("830799", "艾融软件"),
        ]);
        let stats = snap.stats();
        assert_eq!(stats.row_count, 3);
        assert_eq!(stats.priced_count, 1);
        assert_eq!(stats.by_market.get(&Market::Shanghai), Some(&1));
        assert_eq!(stats.by_market.get(&Market::Shenzhen), Some(&1));
        assert_eq!(stats.by_market.get(&Market::Beijing), Some(&1));
        assert_eq!(stats.by_market.get(&Market::Other), None);
        assert_eq!(stats.to_string(), "3 rows, 1 priced, Shanghai 1, Shenzhen 1, Beijing 1");
    }
}
