//! Fetch strategies, one per update-source protocol.
//!
//! Every strategy turns a raw HTTP response into at most one "latest version"
//! plus, optionally, a more specific resource URL for that release.

mod github;
mod hangar;
mod modrinth;
mod plaintext;
mod spiget;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, FetchError};
use crate::http::HttpClient;

pub use github::GitHubSource;
pub use hangar::{HangarPlatform, HangarSource};
pub use modrinth::{Loader, ModrinthSource};
pub use plaintext::PlaintextSource;
pub use spiget::SpigetSource;

/// The answer of one successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRelease {
    pub version: String,
    /// Page for this exact release, when the source knows one.
    pub resource_url: Option<String>,
}

impl LatestRelease {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            resource_url: None,
        }
    }

    #[must_use]
    pub fn with_resource_url(mut self, resource_url: impl Into<String>) -> Self {
        self.resource_url = Some(resource_url.into());
        self
    }
}

#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Short protocol name used in logs.
    fn name(&self) -> &'static str;

    fn endpoint(&self) -> &Url;

    /// Human-facing page for the monitored resource.
    fn resource_url(&self) -> &str;

    /// Ask the remote service for the latest version.
    ///
    /// `Ok(None)` means the service answered but offered nothing usable for
    /// this engine, for example an incompatible newest release.
    ///
    /// # Errors
    /// Returns an error when the request fails or the response cannot be
    /// understood.
    async fn fetch_latest_version(
        &self,
        client: &HttpClient,
        current_version: &str,
    ) -> Result<Option<LatestRelease>, FetchError>;
}

/// Serializable description of a built-in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Spigot {
        resource_id: String,
    },
    Modrinth {
        slug: String,
        loader: String,
    },
    Github {
        repo: String,
    },
    Spiget {
        resource_id: String,
    },
    Hangar {
        author: String,
        slug: String,
        platform: String,
    },
    Plaintext {
        url: String,
        resource_url: String,
    },
}

impl SourceConfig {
    /// Build the strategy this configuration describes.
    ///
    /// # Errors
    /// Returns an error when an identifier produces an invalid endpoint URL
    /// or names an unknown loader or platform.
    pub fn build(&self) -> Result<Box<dyn VersionSource>, EngineError> {
        Ok(match self {
            Self::Spigot { resource_id } => Box::new(PlaintextSource::spigot(resource_id)?),
            Self::Modrinth { slug, loader } => {
                Box::new(ModrinthSource::new(slug, loader.parse::<Loader>()?)?)
            }
            Self::Github { repo } => Box::new(GitHubSource::new(repo)?),
            Self::Spiget { resource_id } => Box::new(SpigetSource::new(resource_id)?),
            Self::Hangar {
                author,
                slug,
                platform,
            } => Box::new(HangarSource::new(
                author,
                slug,
                platform.parse::<HangarPlatform>()?,
            )?),
            Self::Plaintext { url, resource_url } => {
                Box::new(PlaintextSource::new(url, resource_url.clone())?)
            }
        })
    }
}

pub(crate) fn parse_endpoint(url: &str) -> Result<Url, EngineError> {
    let parsed = Url::parse(url).map_err(|error| EngineError::invalid_endpoint(url, error))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(EngineError::invalid_endpoint(
            url,
            format!("unsupported scheme '{scheme}'"),
        )),
    }
}

pub(crate) fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::{SourceConfig, parse_endpoint};

    #[test]
    fn source_config_deserializes_tagged_json() {
        let config: SourceConfig = serde_json::from_str(
            r#"{ "type": "modrinth", "slug": "viaversion", "loader": "paper" }"#,
        )
        .expect("modrinth config should deserialize");

        assert_eq!(
            config,
            SourceConfig::Modrinth {
                slug: "viaversion".to_string(),
                loader: "paper".to_string(),
            }
        );
    }

    #[test]
    fn build_creates_matching_strategy() {
        let source = SourceConfig::Spigot {
            resource_id: "19254".to_string(),
        }
        .build()
        .expect("spigot source should build");

        assert_eq!(source.name(), "spigot");
        assert_eq!(
            source.endpoint().as_str(),
            "https://api.spigotmc.org/legacy/update.php?resource=19254"
        );
        assert_eq!(source.resource_url(), "https://spigotmc.org/resources/19254");
    }

    #[test]
    fn build_rejects_unknown_loader() {
        let result = SourceConfig::Modrinth {
            slug: "viaversion".to_string(),
            loader: "minestom".to_string(),
        }
        .build();

        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_malformed_plaintext_url() {
        let result = SourceConfig::Plaintext {
            url: "updates.example.com/latest".to_string(),
            resource_url: "https://example.com".to_string(),
        }
        .build();

        assert!(result.is_err());
    }

    #[test]
    fn parse_endpoint_rejects_non_http_scheme() {
        assert!(parse_endpoint("ftp://example.com/latest").is_err());
        assert!(parse_endpoint("https://example.com/latest").is_ok());
    }
}
