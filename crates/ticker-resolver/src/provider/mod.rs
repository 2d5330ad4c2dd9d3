//! Directory source abstractions and implementations.
//!
//! This module contains:
//! - The `DirectoryProvider` trait that all directory sources implement
//! - Source capabilities and batch spacing configuration
//! - Concrete source implementations (local files, Sina, Tencent,
//!   Eastmoney, Netease, Xueqiu)
//!
//! # Architecture
//!
//! The source system is designed to be:
//! - **Source-agnostic**: The router doesn't know about specific sources
//! - **Extensible**: New sources can be added by implementing `DirectoryProvider`
//! - **Polite**: Batched endpoints are walked under a shared `BatchPolicy`
//!   so no single source gets hammered
//!
//! Remote sources return quotes keyed by canonical six-digit identifiers;
//! identifier repair happens in the normalizer, not in the sources.

mod capabilities;
mod traits;

// Source implementations
pub mod eastmoney;
pub mod local;
pub mod netease;
pub mod sina;
pub mod tencent;
pub mod xueqiu;

// Re-exports
pub use capabilities::{BatchPolicy, ProviderCapabilities};
pub use traits::DirectoryProvider;
