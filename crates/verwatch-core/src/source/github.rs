use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::{LatestRelease, VersionSource, parse_endpoint, trim_base};
use crate::error::{EngineError, FetchError};
use crate::http::HttpClient;

const GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    html_url: String,
}

/// The latest published release of a GitHub repository.
#[derive(Debug, Clone)]
pub struct GitHubSource {
    endpoint: Url,
    resource_url: String,
}

impl GitHubSource {
    /// `repo` is `owner/name`.
    ///
    /// # Errors
    /// Returns an error when `repo` is not of the form `owner/name`.
    pub fn new(repo: &str) -> Result<Self, EngineError> {
        Self::at(GITHUB_API_BASE, repo)
    }

    /// Like [`GitHubSource::new`] but against another API host.
    ///
    /// # Errors
    /// Returns an error when `repo` is malformed or the URL is invalid.
    pub fn at(api_base: &str, repo: &str) -> Result<Self, EngineError> {
        let valid = repo.split_once('/').is_some_and(|(owner, name)| {
            !owner.is_empty() && !name.is_empty() && !name.contains('/')
        });
        if !valid {
            return Err(EngineError::invalid_endpoint(
                repo,
                "expected a repository in the form owner/name",
            ));
        }

        Ok(Self {
            endpoint: parse_endpoint(&format!(
                "{}/repos/{repo}/releases/latest",
                trim_base(api_base)
            ))?,
            resource_url: format!("https://github.com/{repo}/releases"),
        })
    }
}

#[async_trait]
impl VersionSource for GitHubSource {
    fn name(&self) -> &'static str {
        "github"
    }

    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn resource_url(&self) -> &str {
        &self.resource_url
    }

    async fn fetch_latest_version(
        &self,
        client: &HttpClient,
        _current_version: &str,
    ) -> Result<Option<LatestRelease>, FetchError> {
        let release: GitHubRelease = client
            .get(&self.endpoint)
            .await?
            .json()
            .await
            .map_err(|error| FetchError::parse(&self.endpoint, error))?;

        let version = release
            .tag_name
            .strip_prefix('v')
            .unwrap_or(&release.tag_name)
            .trim();
        if version.is_empty() {
            return Err(FetchError::empty(&self.endpoint));
        }

        Ok(Some(
            LatestRelease::new(version).with_resource_url(release.html_url),
        ))
    }
}
