//! Identifier normalization for six-digit A-share security codes.
//!
//! Raw identifiers arrive from spreadsheets with quote-character padding,
//! dropped leading zeros, or truncated exchange prefixes. [`normalize`]
//! repairs them into canonical six-digit form; [`validate`] checks the
//! repaired code against the known exchange/board prefixes.
//!
//! The length-specific repair branches encode board-prefix conventions and
//! are deliberately kept as a literal table. Extending them to new boards
//! needs product-owner confirmation, not inference.

/// Exchange/board prefixes accepted by [`validate`].
///
/// Shanghai main board (600/601/603/605), STAR market (688), Shenzhen main
/// board (000/001/002/003), ChiNext (300/301).
pub const VALID_PREFIXES: &[&str] = &[
    "600", "601", "603", "605", "688", "000", "001", "002", "003", "300", "301",
];

/// Prefixes that route to the Shanghai exchange on quote APIs; everything
/// else in the allow-list routes to Shenzhen.
pub const SHANGHAI_PREFIXES: &[&str] = &["600", "601", "603", "605", "688"];

const SHENZHEN_PREFIXES: &[&str] = &["000", "001", "002", "003", "300", "301"];

/// Repair a raw identifier string into canonical six-digit form.
///
/// Deterministic and side-effect-free. If no digits survive the cleanup the
/// trimmed input is returned unchanged so the caller can report it as
/// invalid; otherwise the result is at least six digits long.
pub fn normalize(raw: &str) -> String {
    let mut code = raw.trim();

    // Spreadsheet numeric-to-text coercion wraps codes in quotes ('000037).
    if let Some(rest) = code.strip_prefix('\'') {
        code = rest.trim();
    }
    if let Some(rest) = code.strip_prefix('"') {
        code = rest.trim();
    }

    let digits: String = code.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return code.to_string();
    }

    match digits.len() {
        6 => digits,
        3 => {
            if digits.starts_with('6') {
                // Shanghai main board truncated to its tail.
                format!("600{digits}")
            } else {
                zero_fill(&digits)
            }
        }
        4 => {
            if digits.starts_with("30") || digits.starts_with("68") {
                // Board prefix survived the truncation; zero-fill the tail.
                format!("{}{:0>4}", &digits[..2], &digits[2..])
            } else {
                zero_fill(&digits)
            }
        }
        5 => format!("0{digits}"),
        _ => zero_fill(&digits),
    }
}

/// True iff `identifier` is exactly six digits with a recognized prefix.
///
/// Expects already-normalized input; unknown prefixes are rejected even when
/// the shape is otherwise well-formed.
pub fn validate(identifier: &str) -> bool {
    identifier.len() == 6
        && identifier.chars().all(|c| c.is_ascii_digit())
        && VALID_PREFIXES.iter().any(|p| identifier.starts_with(p))
}

fn zero_fill(digits: &str) -> String {
    format!("{digits:0>6}")
}

/// Exchange venue derived from an identifier's prefix.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Market {
    Shanghai,
    Shenzhen,
    Beijing,
    Other,
}

impl Market {
    /// Classify a six-digit identifier by its prefix.
    pub fn classify(identifier: &str) -> Self {
        if SHANGHAI_PREFIXES.iter().any(|p| identifier.starts_with(p)) {
            Self::Shanghai
        } else if SHENZHEN_PREFIXES.iter().any(|p| identifier.starts_with(p)) {
            Self::Shenzhen
        } else if identifier.starts_with('8') || identifier.starts_with('4') {
            Self::Beijing
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shanghai => write!(f, "Shanghai"),
            Self::Shenzhen => write!(f, "Shenzhen"),
            Self::Beijing => write!(f, "Beijing"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Two-letter venue prefix ("sh" / "sz") used by quote endpoints that key
/// identifiers by exchange. Everything that is not Shanghai is addressed
/// through the Shenzhen gateway, Beijing listings included.
pub fn venue_prefix(identifier: &str) -> &'static str {
    match Market::classify(identifier) {
        Market::Shanghai => "sh",
        _ => "sz",
    }
}

/// Listing board derived from an identifier's prefix.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Board {
    ShanghaiMain,
    Star,
    ShenzhenMain,
    Sme,
    ChiNext,
    Beijing,
    Other,
}

impl Board {
    /// Classify a six-digit identifier by its prefix.
    pub fn classify(identifier: &str) -> Self {
        if identifier.starts_with("688") {
            Self::Star
        } else if identifier.starts_with("300") || identifier.starts_with("301") {
            Self::ChiNext
        } else if identifier.starts_with("000") || identifier.starts_with("001") {
            Self::ShenzhenMain
        } else if identifier.starts_with("002") || identifier.starts_with("003") {
            Self::Sme
        } else if SHANGHAI_PREFIXES.iter().any(|p| identifier.starts_with(p)) {
            Self::ShanghaiMain
        } else if identifier.starts_with('8') || identifier.starts_with('4') {
            Self::Beijing
        } else {
            Self::Other
        }
    }
}
