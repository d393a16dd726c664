//! Cached update check for one monitored resource.
//!
//! The latest version and the time it was observed live in one immutable
//! snapshot that is replaced as a whole, so readers never see a fresh version
//! paired with a stale timestamp. Readers load the snapshot without locking;
//! only the "check cache, maybe fetch, write" sequence is serialized.

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};

use crate::error::EngineError;
use crate::executor::SharedExecutor;
use crate::http::{HttpClient, HttpSettings};
use crate::message::{MessageContext, MessageTemplates, NotificationSink, render_template};
use crate::poller::Poller;
use crate::source::{LatestRelease, VersionSource};
use crate::version::is_newer_version;

pub const DEFAULT_CACHE_WINDOW: Duration = Duration::from_secs(1440 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone, Default)]
pub(crate) struct CacheState {
    pub(crate) latest_version: Option<String>,
    pub(crate) last_checked_at: Option<DateTime<Utc>>,
    pub(crate) resource_url: String,
}

/// The most recent failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub message: String,
    pub at: DateTime<Utc>,
    pub timed_out: bool,
}

pub(crate) struct FetcherInner {
    pub(crate) plugin_name: String,
    pub(crate) current_version: String,
    cache_window: TimeDelta,
    pub(crate) poll_interval: Duration,
    source: Box<dyn VersionSource>,
    client: HttpClient,
    templates: MessageTemplates,
    pub(crate) sink: Option<Arc<dyn NotificationSink>>,
    state: ArcSwap<CacheState>,
    last_error: ArcSwapOption<FetchFailure>,
    fetch_gate: tokio::sync::Mutex<()>,
    pub(crate) active_pollers: AtomicUsize,
}

impl FetcherInner {
    pub(crate) fn snapshot(&self) -> Arc<CacheState> {
        self.state.load_full()
    }

    pub(crate) async fn has_update_at(&self, now: DateTime<Utc>) -> bool {
        let _gate = self.fetch_gate.lock().await;

        let cached = self.state.load_full();
        if let Some(latest) = self.fresh_version(&cached, now) {
            debug!(
                "Using cached version {latest} for {} (checked at {:?})",
                self.plugin_name, cached.last_checked_at
            );
            return latest != self.current_version;
        }

        let Some(release) = self.fetch_latest_version_at(now).await else {
            return false;
        };

        let has_update = release.version != self.current_version;
        if has_update {
            info!(
                "{} has an update available: {} -> {}",
                self.plugin_name, self.current_version, release.version
            );
        }
        self.state.store(Arc::new(CacheState {
            resource_url: release
                .resource_url
                .unwrap_or_else(|| cached.resource_url.clone()),
            latest_version: Some(release.version),
            last_checked_at: Some(now),
        }));
        has_update
    }

    fn fresh_version<'a>(&self, cached: &'a CacheState, now: DateTime<Utc>) -> Option<&'a str> {
        let latest = cached.latest_version.as_deref()?;
        let checked_at = cached.last_checked_at?;
        (!latest.trim().is_empty() && now - checked_at < self.cache_window).then_some(latest)
    }

    /// Ask the source once. Failures are logged and remembered, never raised.
    pub(crate) async fn fetch_latest_version_at(
        &self,
        now: DateTime<Utc>,
    ) -> Option<LatestRelease> {
        match self
            .source
            .fetch_latest_version(&self.client, &self.current_version)
            .await
        {
            Ok(release) => {
                self.last_error.store(None);
                if release.is_none() {
                    debug!(
                        "{} source '{}' offered no usable version",
                        self.plugin_name,
                        self.source.name()
                    );
                }
                release
            }
            Err(error) => {
                warn!("Update check for {} failed: {error}", self.plugin_name);
                self.last_error.store(Some(Arc::new(FetchFailure {
                    message: error.to_string(),
                    at: now,
                    timed_out: error.is_timeout(),
                })));
                None
            }
        }
    }

    /// One fetch that ignores the cache window. Only a published release
    /// page is kept; the cached version and timestamp stay as they were.
    async fn fetch_uncached_at(&self, now: DateTime<Utc>) -> Option<String> {
        let _gate = self.fetch_gate.lock().await;

        let release = self.fetch_latest_version_at(now).await?;
        if let Some(resource_url) = release.resource_url {
            let cached = self.state.load_full();
            self.state.store(Arc::new(CacheState {
                resource_url,
                ..(*cached).clone()
            }));
        }
        Some(release.version)
    }

    pub(crate) fn render(&self, template: &str) -> String {
        let cached = self.state.load();
        render_template(
            template,
            &MessageContext {
                plugin: &self.plugin_name,
                current_version: &self.current_version,
                latest_version: cached.latest_version.as_deref(),
                resource_url: &cached.resource_url,
            },
        )
    }

    pub(crate) fn update_message(&self) -> String {
        self.render(&self.templates.update)
    }

    pub(crate) fn no_update_message(&self) -> String {
        self.render(&self.templates.no_update)
    }
}

/// Answers "is there a newer release?" for one resource, with caching and an
/// optional background poller.
///
/// Dropping the fetcher stops its poller.
pub struct VersionFetcher {
    inner: Arc<FetcherInner>,
    poller: Mutex<Poller>,
}

impl std::fmt::Debug for VersionFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionFetcher")
            .field("plugin_name", &self.inner.plugin_name)
            .field("current_version", &self.inner.current_version)
            .field("source", &self.inner.source.name())
            .field("endpoint", &self.inner.source.endpoint().as_str())
            .finish_non_exhaustive()
    }
}

impl VersionFetcher {
    pub fn builder(
        plugin_name: impl Into<String>,
        current_version: impl Into<String>,
        source: Box<dyn VersionSource>,
    ) -> FetcherBuilder {
        FetcherBuilder {
            plugin_name: plugin_name.into(),
            current_version: current_version.into(),
            source,
            cache_window: DEFAULT_CACHE_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            client: None,
            templates: MessageTemplates::default(),
            sink: None,
            resource_url: None,
        }
    }

    /// Whether the latest known version differs from the running one.
    ///
    /// Reuses the cached answer while it is younger than the cache window;
    /// otherwise makes exactly one fetch. A failed fetch answers `false` and
    /// leaves the cache as it was.
    pub async fn has_update(&self) -> bool {
        self.inner.has_update_at(Utc::now()).await
    }

    /// [`VersionFetcher::has_update`] for synchronous callers.
    ///
    /// The check runs on the shared executor.
    ///
    /// # Errors
    /// Returns an error when the shared executor cannot be started.
    ///
    /// # Panics
    /// Panics when called from within an async runtime.
    pub fn has_update_blocking(&self) -> Result<bool, EngineError> {
        let executor = SharedExecutor::global()?;
        let inner = Arc::clone(&self.inner);
        let task = executor.spawn(async move { inner.has_update_at(Utc::now()).await });

        match executor.block_on(task) {
            Ok(has_update) => Ok(has_update),
            Err(error) => {
                warn!("Update check task for {} failed: {error}", self.inner.plugin_name);
                Ok(false)
            }
        }
    }

    /// Ask the source directly, bypassing the cache.
    ///
    /// The cached latest version and check time are not touched, so this does
    /// not reset the cache window. A release page published by the source does
    /// replace [`VersionFetcher::resource_url`].
    pub async fn fetch_latest_version(&self) -> Option<String> {
        self.inner.fetch_uncached_at(Utc::now()).await
    }

    #[must_use]
    pub fn latest_version(&self) -> Option<String> {
        self.inner.snapshot().latest_version.clone()
    }

    #[must_use]
    pub fn resource_url(&self) -> String {
        self.inner.snapshot().resource_url.clone()
    }

    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.inner.current_version
    }

    #[must_use]
    pub fn plugin_name(&self) -> &str {
        &self.inner.plugin_name
    }

    /// When the last successful fetch happened.
    #[must_use]
    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot().last_checked_at
    }

    /// The last failed fetch, cleared by the next successful one.
    #[must_use]
    pub fn last_error(&self) -> Option<FetchFailure> {
        self.inner.last_error.load_full().map(|failure| (*failure).clone())
    }

    /// Whether the next [`VersionFetcher::has_update`] will go to the network.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.inner
            .fresh_version(&self.inner.snapshot(), Utc::now())
            .is_none()
    }

    /// Whether the cached latest version sorts after the running one.
    ///
    /// Unlike [`VersionFetcher::has_update`] this never fetches and uses
    /// segment-aware comparison instead of string equality.
    #[must_use]
    pub fn is_newer(&self) -> bool {
        self.inner
            .snapshot()
            .latest_version
            .as_deref()
            .is_some_and(|latest| is_newer_version(latest, &self.inner.current_version))
    }

    /// Rendered "update available" message for the cached state.
    ///
    /// Before any successful fetch the latest version renders empty; check
    /// [`VersionFetcher::has_update`] first.
    #[must_use]
    pub fn update_message(&self) -> String {
        self.inner.update_message()
    }

    #[must_use]
    pub fn no_update_message(&self) -> String {
        self.inner.no_update_message()
    }

    /// Send the message matching the cached state to `sink`.
    pub fn notify(&self, sink: &dyn NotificationSink) {
        let cached = self.inner.snapshot();
        match cached.latest_version.as_deref() {
            Some(latest) if latest != self.inner.current_version => {
                sink.notify_update(&self.inner.update_message());
            }
            _ => sink.notify_up_to_date(&self.inner.no_update_message()),
        }
    }

    /// Start the background poller, restarting it when already running.
    ///
    /// # Errors
    /// Returns an error when the poller thread cannot be spawned.
    pub fn start(&self) -> Result<(), EngineError> {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start(Arc::clone(&self.inner))
    }

    /// Stop the background poller. A no-op when it is not running.
    pub fn close(&self) {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running()
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<FetcherInner> {
        &self.inner
    }
}

impl Drop for VersionFetcher {
    fn drop(&mut self) {
        self.poller
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }
}

pub struct FetcherBuilder {
    plugin_name: String,
    current_version: String,
    source: Box<dyn VersionSource>,
    cache_window: Duration,
    poll_interval: Duration,
    client: Option<HttpClient>,
    templates: MessageTemplates,
    sink: Option<Arc<dyn NotificationSink>>,
    resource_url: Option<String>,
}

impl FetcherBuilder {
    #[must_use]
    pub fn cache_window(mut self, cache_window: Duration) -> Self {
        self.cache_window = cache_window;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Share an existing client, and with it the proxy slot.
    #[must_use]
    pub fn client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use]
    pub fn templates(mut self, templates: MessageTemplates) -> Self {
        self.templates = templates;
        self
    }

    /// Sink the background poller announces new versions to.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Page shown in messages until the source publishes a release page.
    #[must_use]
    pub fn resource_url(mut self, resource_url: impl Into<String>) -> Self {
        self.resource_url = Some(resource_url.into());
        self
    }

    /// # Errors
    /// Returns an error when no client was given and the default one cannot
    /// be built.
    pub fn build(self) -> Result<VersionFetcher, EngineError> {
        let client = match self.client {
            Some(client) => client,
            None => HttpClient::new(HttpSettings::default())?,
        };
        let resource_url = self
            .resource_url
            .unwrap_or_else(|| self.source.resource_url().to_string());

        Ok(VersionFetcher {
            inner: Arc::new(FetcherInner {
                plugin_name: self.plugin_name,
                current_version: self.current_version,
                cache_window: TimeDelta::from_std(self.cache_window).unwrap_or(TimeDelta::MAX),
                poll_interval: self.poll_interval,
                source: self.source,
                client,
                templates: self.templates,
                sink: self.sink,
                state: ArcSwap::from_pointee(CacheState {
                    resource_url,
                    ..CacheState::default()
                }),
                last_error: ArcSwapOption::empty(),
                fetch_gate: tokio::sync::Mutex::new(()),
                active_pollers: AtomicUsize::new(0),
            }),
            poller: Mutex::new(Poller::default()),
        })
    }
}
