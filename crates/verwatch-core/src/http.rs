//! Outbound HTTP with a runtime-replaceable proxy.
//!
//! The proxy lives in an atomically swapped slot together with the
//! `reqwest::Client` built for it. Every request takes a snapshot of the slot
//! when it starts, so replacing the proxy affects the next request only and
//! never blocks or disturbs requests already in flight.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{debug, info};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{EngineError, FetchError};
use crate::executor::SharedExecutor;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const ERROR_SNIPPET_CHARS: usize = 160;

/// Outbound proxy selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxySetting {
    /// Connect directly.
    #[default]
    None,
    Http {
        host: String,
        port: u16,
    },
    Socks5 {
        host: String,
        port: u16,
    },
}

impl ProxySetting {
    /// Parse `none`, an empty string, or a `scheme://host:port` proxy URL.
    ///
    /// # Errors
    /// Returns an error for unsupported schemes or URLs without a host.
    pub fn parse(value: &str) -> Result<Self, EngineError> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }

        let url = Url::parse(value).map_err(|error| EngineError::invalid_proxy(value, error))?;
        let host = url
            .host_str()
            .ok_or_else(|| EngineError::invalid_proxy(value, "missing host"))?
            .to_string();

        match url.scheme() {
            "http" => Ok(Self::Http {
                host,
                port: url.port().unwrap_or(80),
            }),
            "socks5" | "socks5h" => Ok(Self::Socks5 {
                host,
                port: url.port().unwrap_or(1080),
            }),
            scheme => Err(EngineError::invalid_proxy(
                value,
                format!("unsupported scheme '{scheme}'"),
            )),
        }
    }

    fn proxy_url(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Http { host, port } => Some(format!("http://{host}:{port}")),
            Self::Socks5 { host, port } => Some(format!("socks5h://{host}:{port}")),
        }
    }
}

impl std::fmt::Display for ProxySetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.proxy_url() {
            Some(url) => write!(f, "{url}"),
            None => write!(f, "none"),
        }
    }
}

/// Source of the proxy the engine should route through.
///
/// Consulted at construction and on every [`HttpClient::refresh_proxy`].
pub trait ProxyProvider: Send + Sync {
    fn proxy(&self) -> ProxySetting;
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("verwatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

struct Transport {
    proxy: ProxySetting,
    client: reqwest::Client,
}

impl Transport {
    fn build(settings: &HttpSettings, proxy: ProxySetting) -> Result<Self, EngineError> {
        let mut builder = reqwest::Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent.clone());

        builder = match proxy.proxy_url() {
            Some(url) => builder.proxy(
                reqwest::Proxy::all(&url).map_err(|error| EngineError::invalid_proxy(url, error))?,
            ),
            None => builder.no_proxy(),
        };

        let client = builder.build().map_err(EngineError::ClientBuild)?;
        Ok(Self { proxy, client })
    }
}

/// HTTP client shared by every fetcher in the process.
///
/// Cloning is cheap and clones share the same proxy slot.
#[derive(Clone)]
pub struct HttpClient {
    settings: Arc<HttpSettings>,
    transport: Arc<ArcSwap<Transport>>,
    provider: Option<Arc<dyn ProxyProvider>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("settings", &self.settings)
            .field("proxy", &self.proxy())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Client that connects directly until a proxy is set.
    ///
    /// # Errors
    /// Returns an error when the TLS backend cannot be initialized.
    pub fn new(settings: HttpSettings) -> Result<Self, EngineError> {
        let transport = Transport::build(&settings, ProxySetting::None)?;
        Ok(Self {
            settings: Arc::new(settings),
            transport: Arc::new(ArcSwap::from_pointee(transport)),
            provider: None,
        })
    }

    /// Client whose proxy comes from `provider`, now and on every refresh.
    ///
    /// # Errors
    /// Returns an error when the provided proxy is unusable or the TLS
    /// backend cannot be initialized.
    pub fn with_provider(
        settings: HttpSettings,
        provider: Arc<dyn ProxyProvider>,
    ) -> Result<Self, EngineError> {
        let transport = Transport::build(&settings, provider.proxy())?;
        Ok(Self {
            settings: Arc::new(settings),
            transport: Arc::new(ArcSwap::from_pointee(transport)),
            provider: Some(provider),
        })
    }

    /// The proxy the next request will use.
    #[must_use]
    pub fn proxy(&self) -> ProxySetting {
        self.transport.load().proxy.clone()
    }

    /// Replace the proxy for all clones of this client.
    ///
    /// # Errors
    /// Returns an error when `proxy` cannot be turned into a client; the
    /// previous proxy stays active in that case.
    pub fn set_custom_proxy(&self, proxy: ProxySetting) -> Result<(), EngineError> {
        let transport = Transport::build(&self.settings, proxy)?;
        info!("HTTP proxy set to {}", transport.proxy);
        self.transport.store(Arc::new(transport));
        Ok(())
    }

    /// Re-read the proxy from the provider, or fall back to a direct
    /// connection when the client has none.
    ///
    /// # Errors
    /// Returns an error when the provider's proxy is unusable.
    pub fn refresh_proxy(&self) -> Result<(), EngineError> {
        let proxy = self
            .provider
            .as_ref()
            .map_or(ProxySetting::None, |provider| provider.proxy());
        if proxy == self.proxy() {
            debug!("HTTP proxy unchanged after refresh ({proxy})");
            return Ok(());
        }
        self.set_custom_proxy(proxy)
    }

    /// Issue a GET and return the response once its status is known to be
    /// successful.
    ///
    /// The returned response owns the connection; dropping it releases the
    /// connection on every path.
    ///
    /// # Errors
    /// Returns an error when the request fails, times out, or the server
    /// answers with a non-success status.
    pub async fn get(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let client = self.transport.load().client.clone();

        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|error| FetchError::request(url, error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, ERROR_SNIPPET_CHARS))
                .unwrap_or_default();
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
                body_snippet,
            });
        }

        Ok(response)
    }

    /// Submit [`HttpClient::get`] to the shared executor.
    ///
    /// Failures inside the task, including a panicked or cancelled task,
    /// arrive through the returned future's error.
    ///
    /// # Errors
    /// Returns an error only when the shared executor cannot be started.
    pub fn get_async(&self, url: Url) -> Result<PendingResponse, EngineError> {
        let executor = SharedExecutor::global()?;
        let client = self.clone();
        let handle = executor.spawn(async move { client.get(&url).await });
        Ok(PendingResponse { handle })
    }
}

/// A GET running on the shared executor.
pub struct PendingResponse {
    handle: JoinHandle<Result<reqwest::Response, FetchError>>,
}

impl Future for PendingResponse {
    type Output = Result<reqwest::Response, FetchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| joined.unwrap_or_else(|error| Err(FetchError::Task(error))))
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
