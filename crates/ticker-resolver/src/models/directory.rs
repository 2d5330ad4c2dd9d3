//! Directory rows and listed-name cleaning.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::normalizer::{Board, Market};

lazy_static! {
    /// Leading special-treatment marker (`ST` / `*ST`) on listed names
    static ref ST_MARKER_REGEX: Regex = Regex::new(r"^\*?ST\s*").expect("Invalid regex pattern");
}

/// Decoration tokens stripped when deriving a cleaned name, checked in order.
const NAME_SUFFIXES: &[&str] = &["股份有限公司", "有限公司", "集团", "控股", "股份", "A", "B", "H"];

/// Strips decoration from a listed name so user input like `平安银行` lines
/// up with directory entries like `平安银行A` or `*ST平安`.
pub fn clean_name(name: &str) -> String {
    let mut cleaned = ST_MARKER_REGEX.replace(name.trim(), "").into_owned();
    for suffix in NAME_SUFFIXES {
        if let Some(stripped) = cleaned.strip_suffix(suffix) {
            cleaned = stripped.to_string();
        }
    }
    cleaned.trim().to_string()
}

/// One entry in the canonical security directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryRow {
    /// Canonical six-digit identifier
    pub identifier: String,
    /// Listed display name as published by the venue
    pub display_name: String,
    /// Display name with ST markers and decoration suffixes stripped
    pub cleaned_name: String,
    /// Last traded price
    pub last_price: Option<Decimal>,
    /// Percentage change over the previous close
    pub change_percent: Option<Decimal>,
    /// Absolute change over the previous close
    pub change_amount: Option<Decimal>,
    /// Traded volume
    pub volume: Option<Decimal>,
    /// Traded turnover
    pub turnover: Option<Decimal>,
    /// Price/earnings ratio
    pub pe_ratio: Option<Decimal>,
    /// Price/book ratio
    pub pb_ratio: Option<Decimal>,
}

impl DirectoryRow {
    /// Creates a row with no quoted metrics. The cleaned name is derived
    /// from `display_name`.
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let cleaned_name = clean_name(&display_name);
        Self {
            identifier: identifier.into(),
            display_name,
            cleaned_name,
            last_price: None,
            change_percent: None,
            change_amount: None,
            volume: None,
            turnover: None,
            pe_ratio: None,
            pb_ratio: None,
        }
    }

    /// Exchange venue the identifier belongs to.
    pub fn market(&self) -> Market {
        Market::classify(&self.identifier)
    }

    /// Listing board the identifier belongs to.
    pub fn board(&self) -> Board {
        Board::classify(&self.identifier)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_clean_name_strips_st_markers() {
        assert_eq!(clean_name("ST康美"), "康美");
        assert_eq!(clean_name("*ST海润"), "海润");
        assert_eq!(clean_name("*ST 海润"), "海润");
    }

    #[test]
    fn test_clean_name_strips_suffix_tokens() {
        assert_eq!(clean_name("平安银行A"), "平安银行");
        assert_eq!(clean_name("万科A"), "万科");
        assert_eq!(clean_name("中国平安保险集团"), "中国平安保险");
        assert_eq!(clean_name("贵州茅台股份有限公司"), "贵州茅台");
    }

    #[test]
    fn test_clean_name_plain_names_untouched() {
        assert_eq!(clean_name("浦发银行"), "浦发银行");
        assert_eq!(clean_name("  浦发银行  "), "浦发银行");
    }

    #[test]
    fn test_row_derives_cleaned_name_and_venue() {
        let mut row = DirectoryRow::new("000001", "平安银行A");
        row.last_price = Some(dec!(11.73));
        assert_eq!(row.cleaned_name, "平安银行");
        assert_eq!(row.market(), Market::Shenzhen);
        assert_eq!(row.board(), Board::ShenzhenMain);
        assert_eq!(row.last_price, Some(dec!(11.73)));
        assert_eq!(row.pe_ratio, None);
    }
}
