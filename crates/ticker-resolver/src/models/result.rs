//! Resolution outcomes and cross-validation summaries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::candidate::MatchKind;
use super::directory::DirectoryRow;
use super::types::ProviderId;

/// Terminal status of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStatus {
    /// Canonical identifier confirmed against the directory
    Resolved,
    /// Resolved, but cross-validation could not back the match
    ResolvedLowConfidence,
    /// Input could not be repaired into a listed identifier shape
    InvalidFormat,
    /// Well-formed identifier with no directory entry
    NotFound,
    /// A directory or transport failure prevented a verdict
    Error,
}

/// What one quotation source reported for an identifier during
/// cross-validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderFinding {
    /// Source that was queried
    pub provider: ProviderId,
    /// Whether the source returned a row for the identifier
    pub found: bool,
    /// Name the source reported
    pub name: Option<String>,
    /// Price the source reported
    pub price: Option<Decimal>,
    /// Whether the reported name agrees with the resolved name
    pub name_matches: bool,
}

/// Agreement summary across independently queried quotation sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidationSummary {
    /// Sources queried
    pub providers_queried: usize,
    /// Sources that returned a row
    pub found_count: usize,
    /// Sources whose reported name agreed with the resolved name
    pub name_match_count: usize,
    /// found / queried, in 0..=1
    pub confidence: f64,
    /// name matches / found, in 0..=1; zero when nothing was found
    pub name_consistency: f64,
    /// Most frequently reported name; the earliest source wins ties
    pub consensus_name: Option<String>,
    /// Per-source findings in query order
    pub findings: Vec<ProviderFinding>,
}

impl ValidationSummary {
    /// Aggregates per-source findings into agreement fractions.
    pub fn from_findings(findings: Vec<ProviderFinding>) -> Self {
        let providers_queried = findings.len();
        let found_count = findings.iter().filter(|f| f.found).count();
        let name_match_count = findings.iter().filter(|f| f.found && f.name_matches).count();
        let confidence = if providers_queried == 0 {
            0.0
        } else {
            found_count as f64 / providers_queried as f64
        };
        let name_consistency = if found_count == 0 {
            0.0
        } else {
            name_match_count as f64 / found_count as f64
        };

        let mut tallies: Vec<(&str, usize)> = Vec::new();
        for name in findings.iter().filter_map(|f| f.name.as_deref()) {
            match tallies.iter_mut().find(|(seen, _)| *seen == name) {
                Some((_, count)) => *count += 1,
                None => tallies.push((name, 1)),
            }
        }
        // Strictly-greater comparison keeps the earliest name on ties.
        let mut consensus_name = None;
        let mut best = 0usize;
        for (name, count) in &tallies {
            if *count > best {
                best = *count;
                consensus_name = Some((*name).to_string());
            }
        }

        Self {
            providers_queried,
            found_count,
            name_match_count,
            confidence,
            name_consistency,
            consensus_name,
            findings,
        }
    }
}

/// The outcome of resolving one raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolutionResult {
    /// Input exactly as supplied by the caller
    pub original_input: String,
    /// Output of identifier normalization on that input
    pub normalized_identifier: String,
    /// Terminal status
    pub status: ResolutionStatus,
    /// Canonical identifier, when resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_identifier: Option<String>,
    /// Listed name of the resolved row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_name: Option<String>,
    /// Last price of the resolved row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_price: Option<Decimal>,
    /// Absolute gap between the resolved price and the caller's reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_delta: Option<Decimal>,
    /// How the identifier was matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<MatchKind>,
    /// Cross-validation outcome, when validation ran
    #[serde(
        default,
        rename = "cross-validation",
        skip_serializing_if = "Option::is_none"
    )]
    pub validation: Option<ValidationSummary>,
}

impl ResolutionResult {
    fn base(
        original_input: impl Into<String>,
        normalized: impl Into<String>,
        status: ResolutionStatus,
    ) -> Self {
        Self {
            original_input: original_input.into(),
            normalized_identifier: normalized.into(),
            status,
            resolved_identifier: None,
            resolved_name: None,
            resolved_price: None,
            price_delta: None,
            match_kind: None,
            validation: None,
        }
    }

    /// Input that could not be repaired into a listed identifier shape.
    pub fn invalid_format(original: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self::base(original, normalized, ResolutionStatus::InvalidFormat)
    }

    /// Well-formed identifier with no directory entry.
    pub fn not_found(original: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self::base(original, normalized, ResolutionStatus::NotFound)
    }

    /// Resolution that failed on a directory or transport error.
    pub fn error(original: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self::base(original, normalized, ResolutionStatus::Error)
    }

    /// Successful resolution against a directory row.
    pub fn resolved(
        original: impl Into<String>,
        normalized: impl Into<String>,
        row: &DirectoryRow,
        reference_price: Option<Decimal>,
    ) -> Self {
        let original = original.into();
        let match_kind = if original.trim() == row.identifier {
            MatchKind::Exact
        } else {
            MatchKind::Normalized
        };
        let price_delta = match (reference_price, row.last_price) {
            (Some(reference), Some(last)) => Some((last - reference).abs()),
            _ => None,
        };
        let mut result = Self::base(original, normalized, ResolutionStatus::Resolved);
        result.resolved_identifier = Some(row.identifier.clone());
        result.resolved_name = Some(row.display_name.clone());
        result.resolved_price = row.last_price;
        result.price_delta = price_delta;
        result.match_kind = Some(match_kind);
        result
    }

    /// Attaches a cross-validation summary, downgrading the status when
    /// agreement falls below `threshold`.
    pub fn with_validation(mut self, summary: ValidationSummary, threshold: f64) -> Self {
        if self.status == ResolutionStatus::Resolved && summary.confidence < threshold {
            self.status = ResolutionStatus::ResolvedLowConfidence;
        }
        self.validation = Some(summary);
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================
