//! Background update checking for plugins and applications.
//!
//! This crate owns everything that has state or talks to the network:
//! - Version string comparison.
//! - A proxy-aware HTTP client whose proxy can be swapped at runtime.
//! - Fetch strategies for the supported update sources (Spigot, Modrinth,
//!   GitHub, Spiget, Hangar, and plain-text endpoints).
//! - The cached update check, its background poller, and message rendering.

mod error;
pub mod executor;
mod fetcher;
pub mod http;
mod message;
mod poller;
pub mod source;
#[cfg(test)]
mod testing;
mod version;

/// Construction-time and fetch-time error types.
pub use error::{EngineError, FetchError};
/// Runtime detection and shared task executor used for ad hoc async work.
pub use executor::{ExecutionModel, SharedExecutor};
/// Cached update check with its builder and observability types.
pub use fetcher::{
    DEFAULT_CACHE_WINDOW, DEFAULT_POLL_INTERVAL, FetchFailure, FetcherBuilder, VersionFetcher,
};
/// Proxy-aware HTTP client and proxy configuration contract.
pub use http::{HttpClient, HttpSettings, PendingResponse, ProxyProvider, ProxySetting};
/// Message templates and the notification sink contract.
pub use message::{
    DEFAULT_NO_UPDATE_TEMPLATE, DEFAULT_UPDATE_TEMPLATE, MessageContext, MessageTemplates,
    NotificationSink, render_template,
};
/// Fetch strategy contract and the built-in source configurations.
pub use source::{LatestRelease, SourceConfig, VersionSource};
/// Segment-aware version comparison.
pub use version::{compare_versions, is_newer_version};
