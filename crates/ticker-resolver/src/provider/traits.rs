//! Directory source trait definitions.
//!
//! This module defines the core `DirectoryProvider` trait that all
//! directory sources must implement.

use async_trait::async_trait;

use crate::errors::ResolveError;
use crate::models::{DirectoryRow, Snapshot};

use super::capabilities::ProviderCapabilities;

/// Trait for directory sources.
///
/// Implement this trait to add support for a new quotation source.
/// The router uses the source's capabilities and priority to decide
/// when and how to use it.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use ticker_resolver::provider::{DirectoryProvider, ProviderCapabilities};
///
/// struct MySource;
///
/// #[async_trait]
/// impl DirectoryProvider for MySource {
///     fn id(&self) -> &'static str {
///         "my-source"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             snapshot: true,
///             quote_lookup: false,
///             needs_universe: false,
///         }
///     }
///
///     // ... override fetch_snapshot
/// }
/// ```
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// Unique identifier for this source.
    ///
    /// Should be a constant string like "sina", "eastmoney", etc.
    /// Used for logging and error attribution.
    fn id(&self) -> &'static str;

    /// Source priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    /// The router uses this to order sources when several can
    /// produce a snapshot.
    fn priority(&self) -> u8 {
        10
    }

    /// Describes what this source can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Fetch a directory snapshot.
    ///
    /// # Arguments
    ///
    /// * `universe` - The identifiers to quote, for sources that only
    ///   answer for the identifiers they are asked about. Sources that
    ///   enumerate the whole market themselves ignore it.
    ///
    /// # Returns
    ///
    /// A snapshot on success, or a `ResolveError` on failure.
    /// Default implementation returns `NotSupported`.
    async fn fetch_snapshot(&self, universe: Option<&[String]>) -> Result<Snapshot, ResolveError> {
        let _ = universe;
        Err(ResolveError::NotSupported {
            operation: "snapshot".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Look up a single identifier.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the source answered but knows no such identifier,
    /// a row when it does, or an error when the source itself failed.
    /// Default implementation returns `NotSupported`.
    async fn lookup_quote(&self, identifier: &str) -> Result<Option<DirectoryRow>, ResolveError> {
        let _ = identifier;
        Err(ResolveError::NotSupported {
            operation: "quote lookup".to_string(),
            provider: self.id().to_string(),
        })
    }
}
