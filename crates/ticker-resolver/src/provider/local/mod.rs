//! Local directory file source implementation.
//!
//! This module loads the security directory from files on disk:
//! - CSV exports under `stock_name_list/`, `data/` or the base directory
//! - Identifier-only TXT lists (`all_stocks_*.txt`) as a last resort
//!
//! Several generations of export files tend to accumulate, so discovery
//! ranks candidates with a fixed total order: files from the preferred
//! `stock_name_list/` directory beat the rest, then a `latest` marker in
//! the name, then the newest date embedded in the name, then modification
//! time, then size, then position. CSV payloads may be UTF-8 (with or
//! without BOM) or GBK, and may use several generations of column naming.
//!
//! The module also writes directory exports in the same format it reads,
//! which is how a remote snapshot becomes the next session's local file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use csv::StringRecord;
use encoding_rs::GBK;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use rust_decimal::Decimal;

use crate::errors::ResolveError;
use crate::models::{DirectoryRow, Snapshot, SnapshotSource};
use crate::normalizer::validate;
use crate::provider::{DirectoryProvider, ProviderCapabilities};

const PROVIDER_ID: &str = "local";

/// Directory whose CSV files are preferred over everything else.
const PREFERRED_DIR: &str = "stock_name_list";

/// Directory that exports are written to (and read back from).
const DATA_DIR: &str = "data";

/// Recognized file name prefixes for CSV directory exports.
const CSV_PREFIXES: &[&str] = &[
    "stock_list_",
    "all_stocks_",
    "stocks_",
    "股票数据",
    "股票列表",
    "stock_data_",
    "stocklist_",
];

/// Ordered column synonym table. Later entries overwrite earlier ones when
/// a file carries several generations of the same column.
const COLUMN_SYNONYMS: &[(&str, &str)] = &[
    ("股票代码", "代码"),
    ("代码", "代码"),
    ("code", "代码"),
    ("股票名称", "名称"),
    ("名称", "名称"),
    ("name", "名称"),
    ("最新价", "最新价"),
    ("涨跌幅", "涨跌幅"),
    ("涨跌额", "涨跌额"),
    ("成交量", "成交量"),
    ("成交额", "成交额"),
    ("市盈率", "市盈率-动态"),
    ("市盈率-动态", "市盈率-动态"),
    ("市净率", "市净率"),
];

/// Columns written by exports, in order.
const EXPORT_HEADERS: &[&str] = &[
    "代码",
    "名称",
    "最新价",
    "涨跌幅",
    "涨跌额",
    "成交量",
    "成交额",
    "市盈率-动态",
    "市净率",
];

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

lazy_static! {
    /// Date embedded in export file names: YYYYMMDD, YYYY-MM-DD or YYYY_MM_DD
    static ref FILE_DATE_REGEX: Regex =
        Regex::new(r"(\d{4})[_-]?(\d{2})[_-]?(\d{2})").expect("Invalid regex pattern");
}

// ============================================================================
// LocalFileProvider
// ============================================================================

/// Directory source backed by files on disk.
pub struct LocalFileProvider {
    base_dir: PathBuf,
}

impl LocalFileProvider {
    pub fn new() -> Self {
        Self::with_base_dir(".")
    }

    /// Create a source rooted somewhere other than the working directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Collects candidate files: preferred CSVs, other CSVs, and TXT lists.
    fn discover(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>, Vec<PathBuf>), ResolveError> {
        let mut preferred = Vec::new();
        let mut regular = Vec::new();
        let mut txt = Vec::new();

        let preferred_dir = self.base_dir.join(PREFERRED_DIR);
        if preferred_dir.is_dir() {
            for entry in fs::read_dir(&preferred_dir)? {
                let path = entry?.path();
                if path.is_file() && file_name_lower(&path).ends_with(".csv") {
                    preferred.push(path);
                }
            }
        }

        let data_dir = self.base_dir.join(DATA_DIR);
        if data_dir.is_dir() {
            for entry in fs::read_dir(&data_dir)? {
                let path = entry?.path();
                if path.is_file() && is_directory_file(&file_name_lower(&path)) {
                    regular.push(path);
                }
            }
        }

        if self.base_dir.is_dir() {
            for entry in fs::read_dir(&self.base_dir)? {
                let path = entry?.path();
                if !path.is_file() {
                    continue;
                }
                let name = file_name_lower(&path);
                if is_directory_file(&name) {
                    regular.push(path);
                } else if name.starts_with("all_stocks_") && name.ends_with(".txt") {
                    txt.push(path);
                }
            }
        }

        Ok((preferred, regular, txt))
    }

    /// Parses a CSV directory export.
    fn load_csv(&self, path: &Path) -> Result<Vec<DirectoryRow>, ResolveError> {
        let bytes = fs::read(path)?;
        let text = decode_text(&bytes);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        let mut columns: HashMap<&'static str, usize> = HashMap::new();
        for (synonym, canonical) in COLUMN_SYNONYMS {
            if let Some(i) = headers.iter().position(|h| h == *synonym) {
                columns.insert(canonical, i);
            }
        }
        let code_col = *columns.get("代码").ok_or_else(|| ResolveError::Decode {
            provider: PROVIDER_ID.to_string(),
            message: format!("{}: no identifier column", path.display()),
        })?;
        let name_col = *columns.get("名称").ok_or_else(|| ResolveError::Decode {
            provider: PROVIDER_ID.to_string(),
            message: format!("{}: no name column", path.display()),
        })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let identifier = record.get(code_col).unwrap_or("").trim();
            let name = record.get(name_col).unwrap_or("").trim();
            if identifier.is_empty() || name.is_empty() {
                continue;
            }
            let mut row = DirectoryRow::new(identifier, name);
            row.last_price = metric(&record, &columns, "最新价");
            row.change_percent = metric(&record, &columns, "涨跌幅");
            row.change_amount = metric(&record, &columns, "涨跌额");
            row.volume = metric(&record, &columns, "成交量");
            row.turnover = metric(&record, &columns, "成交额");
            row.pe_ratio = metric(&record, &columns, "市盈率-动态");
            row.pb_ratio = metric(&record, &columns, "市净率");
            rows.push(row);
        }
        Ok(rows)
    }

    /// Parses an identifier-only TXT list (`code,name` per line, `#` for
    /// comments). Rows carry no quoted metrics.
    fn load_txt(&self, path: &Path) -> Result<Vec<DirectoryRow>, ResolveError> {
        let bytes = fs::read(path)?;
        let text = decode_text(&bytes);

        let mut rows = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((code, name)) = line.split_once(',') else {
                debug!("line {}: missing separator in {:?}", line_no + 1, line);
                continue;
            };
            let code = code.trim();
            let name = name.trim();
            if !is_loadable_identifier(code) {
                debug!("line {}: invalid identifier {:?}", line_no + 1, code);
                continue;
            }
            if name.is_empty() {
                continue;
            }
            rows.push(DirectoryRow::new(code, name));
        }
        Ok(rows)
    }

    /// Writes a snapshot as a BOM-prefixed UTF-8 CSV under the data
    /// directory. Without an explicit name the export gets a timestamped
    /// one; `stock_list_latest.csv` is the conventional rolling name.
    pub fn export_snapshot(
        &self,
        snapshot: &Snapshot,
        filename: Option<&str>,
    ) -> Result<PathBuf, ResolveError> {
        let data_dir = self.base_dir.join(DATA_DIR);
        fs::create_dir_all(&data_dir)?;

        let filename = match filename {
            Some(name) => name.to_string(),
            None => format!("stock_list_{}.csv", Local::now().format("%Y%m%d_%H%M%S")),
        };
        let path = data_dir.join(filename);

        let mut buffer = Vec::from(UTF8_BOM);
        {
            let mut writer = csv::Writer::from_writer(&mut buffer);
            writer.write_record(EXPORT_HEADERS)?;
            for row in snapshot.rows() {
                writer.write_record(&[
                    row.identifier.clone(),
                    row.display_name.clone(),
                    metric_string(row.last_price),
                    metric_string(row.change_percent),
                    metric_string(row.change_amount),
                    metric_string(row.volume),
                    metric_string(row.turnover),
                    metric_string(row.pe_ratio),
                    metric_string(row.pb_ratio),
                ])?;
            }
            writer.flush()?;
        }
        fs::write(&path, buffer)?;
        info!(
            "exported {} directory rows to {}",
            snapshot.len(),
            path.display()
        );
        Ok(path)
    }

    /// Refreshes `stock_list_latest.csv` from a remote source, optionally
    /// copying the newest existing export to a `backup_` twin first.
    pub async fn refresh_from(
        &self,
        source: &dyn DirectoryProvider,
        backup: bool,
    ) -> Result<PathBuf, ResolveError> {
        let data_dir = self.base_dir.join(DATA_DIR);
        if backup && data_dir.is_dir() {
            let mut existing = Vec::new();
            for entry in fs::read_dir(&data_dir)? {
                let name = entry?.file_name().to_string_lossy().into_owned();
                if name.starts_with("stock_list_") && name.ends_with(".csv") {
                    existing.push(name);
                }
            }
            if let Some(newest) = existing.iter().max() {
                let backup_name = format!("backup_{}", newest);
                fs::copy(data_dir.join(newest), data_dir.join(&backup_name))?;
                info!("backed up {} to {}", newest, backup_name);
            }
        }

        let snapshot = source.fetch_snapshot(None).await?;
        self.export_snapshot(&snapshot, Some("stock_list_latest.csv"))
    }
}

impl Default for LocalFileProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryProvider for LocalFileProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            snapshot: true,
            quote_lookup: false,
            needs_universe: false,
        }
    }

    async fn fetch_snapshot(&self, _universe: Option<&[String]>) -> Result<Snapshot, ResolveError> {
        let (preferred, regular, txt) = self.discover()?;

        let candidates = if preferred.is_empty() {
            &regular
        } else {
            &preferred
        };
        if let Some(path) = select_best(candidates) {
            info!("loading directory from {}", path.display());
            let rows = self.load_csv(&path)?;
            return Ok(Snapshot::new(SnapshotSource::LocalFile(path), rows));
        }

        let txt_refs: Vec<&PathBuf> = txt.iter().collect();
        if let Some(path) = pick_newest_mtime(&txt_refs).or_else(|| txt_refs.first().copied()) {
            info!("no CSV export found, loading TXT list {}", path.display());
            let rows = self.load_txt(path)?;
            return Ok(Snapshot::new(SnapshotSource::LocalFile(path.clone()), rows));
        }

        Err(ResolveError::NoDirectoryFile)
    }
}

// ============================================================================
// File selection
// ============================================================================

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn is_directory_file(name_lower: &str) -> bool {
    if !name_lower.ends_with(".csv") {
        return false;
    }
    CSV_PREFIXES
        .iter()
        .any(|prefix| name_lower.starts_with(&prefix.to_lowercase()))
}

/// Identifiers acceptable in a TXT list: the listed-prefix allow-list plus
/// the Beijing ranges (8xx / 4xx), which carry quotes but are not
/// resolvable inputs.
fn is_loadable_identifier(code: &str) -> bool {
    validate(code)
        || (code.len() == 6
            && code.chars().all(|c| c.is_ascii_digit())
            && (code.starts_with('8') || code.starts_with('4')))
}

/// Picks the best candidate under the fixed total order.
fn select_best(files: &[PathBuf]) -> Option<PathBuf> {
    if files.is_empty() {
        return None;
    }

    let latest: Vec<&PathBuf> = files
        .iter()
        .filter(|path| file_name_lower(path).contains("latest"))
        .collect();
    if !latest.is_empty() {
        let best = pick_newest_mtime(&latest).or_else(|| latest.first().copied());
        return best.cloned();
    }

    let mut best_dated: Option<(&PathBuf, NaiveDate)> = None;
    for path in files {
        if let Some(date) = file_date(&file_name_lower(path)) {
            if best_dated.map_or(true, |(_, d)| date > d) {
                best_dated = Some((path, date));
            }
        }
    }
    if let Some((path, _)) = best_dated {
        return Some(path.clone());
    }

    let all: Vec<&PathBuf> = files.iter().collect();
    if let Some(path) = pick_newest_mtime(&all) {
        return Some(path.clone());
    }
    if let Some(path) = pick_largest(&all) {
        return Some(path.clone());
    }
    files.first().cloned()
}

/// Date embedded in a file name, if it parses as a real calendar date.
fn file_date(name_lower: &str) -> Option<NaiveDate> {
    let caps = FILE_DATE_REGEX.captures(name_lower)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn pick_newest_mtime<'a>(files: &[&'a PathBuf]) -> Option<&'a PathBuf> {
    let mut best: Option<(&PathBuf, std::time::SystemTime)> = None;
    for path in files {
        if let Ok(modified) = fs::metadata(path).and_then(|meta| meta.modified()) {
            if best.map_or(true, |(_, t)| modified > t) {
                best = Some((path, modified));
            }
        }
    }
    best.map(|(path, _)| path)
}

fn pick_largest<'a>(files: &[&'a PathBuf]) -> Option<&'a PathBuf> {
    let mut best: Option<(&PathBuf, u64)> = None;
    for path in files {
        if let Ok(size) = fs::metadata(path).map(|meta| meta.len()) {
            if best.map_or(true, |(_, s)| size > s) {
                best = Some((path, size));
            }
        }
    }
    best.map(|(path, _)| path)
}

// ============================================================================
// Payload decoding
// ============================================================================

/// Decodes file bytes: UTF-8 BOM stripped, UTF-8 preferred, GBK fallback.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = GBK.decode(bytes);
            text.into_owned()
        }
    }
}

fn metric(
    record: &StringRecord,
    columns: &HashMap<&'static str, usize>,
    key: &str,
) -> Option<Decimal> {
    let index = *columns.get(key)?;
    record.get(index)?.trim().parse().ok()
}

fn metric_string(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================
