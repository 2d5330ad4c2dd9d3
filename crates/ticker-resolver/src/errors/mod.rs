//! Error types and retry classification for the resolver crate.
//!
//! This module provides:
//! - [`ResolveError`]: The main error enum for all directory and resolution operations
//! - [`RetryClass`]: Classification for determining failover behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while loading the directory or resolving inputs.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the directory router should handle the error.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A quotation source returned a payload that could not be decoded.
    /// Try the next source in the chain.
    #[error("Decode error: {provider} - {message}")]
    Decode {
        /// The source that returned the payload
        provider: String,
        /// What failed while decoding it
        message: String,
    },

    /// A quotation source answered, but with far fewer rows than a full
    /// directory plausibly holds. The partial snapshot is discarded.
    #[error("Incomplete snapshot from {provider}: {rows} rows, floor {floor}")]
    IncompleteSnapshot {
        /// The source that produced the snapshot
        provider: String,
        /// Rows the snapshot actually carried
        rows: usize,
        /// Minimum row count the router was prepared to accept
        floor: usize,
    },

    /// A source-specific error occurred.
    /// Try the next source in the chain.
    #[error("Source error: {provider} - {message}")]
    SourceError {
        /// The source that returned the error
        provider: String,
        /// The error message from the source
        message: String,
    },

    /// The operation is not supported by this source.
    /// Try the next source in the chain.
    #[error("Not supported: {operation} by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The source that cannot perform it
        provider: String,
    },

    /// The request to a quotation source timed out.
    /// Fail over after the configured pause.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The source that timed out
        provider: String,
    },

    /// The source rate limited the request (HTTP 429).
    /// Fail over after the configured pause.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The source that rate limited the request
        provider: String,
    },

    /// No directory file was found in any of the search locations.
    #[error("No directory file found")]
    NoDirectoryFile,

    /// Every directory source was tried and all failed.
    /// This is a terminal error after exhausting all options.
    #[error("Directory unavailable: all sources failed")]
    DirectoryUnavailable,

    /// A network error occurred while communicating with a source.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A directory file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A directory file could not be parsed as CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ResolveError {
    /// Returns the retry classification for this error.
    ///
    /// This classification determines how the directory router should handle
    /// the error:
    ///
    /// - [`RetryClass::Never`]: Don't retry, the error is terminal
    /// - [`RetryClass::FailoverWithPause`]: Sleep for the failover pause, then try the next source
    /// - [`RetryClass::NextSource`]: Try the next source immediately
    ///
    /// # Examples
    ///
    /// ```
    /// use ticker_resolver::errors::{ResolveError, RetryClass};
    ///
    /// let error = ResolveError::RateLimited { provider: "sina".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::FailoverWithPause);
    ///
    /// let error = ResolveError::DirectoryUnavailable;
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient throttling - pause before the next source
            Self::Timeout { .. } | Self::RateLimited { .. } => RetryClass::FailoverWithPause,

            // Source-specific failures - try next source
            Self::Decode { .. }
            | Self::IncompleteSnapshot { .. }
            | Self::SourceError { .. }
            | Self::NotSupported { .. }
            | Self::NoDirectoryFile
            | Self::Network(_)
            | Self::Io(_)
            | Self::Csv(_) => RetryClass::NextSource,

            // Exhausted all options - terminal
            Self::DirectoryUnavailable => RetryClass::Never,
        }
    }
}
