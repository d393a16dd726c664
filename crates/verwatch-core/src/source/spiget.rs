use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::{LatestRelease, VersionSource, parse_endpoint, trim_base};
use crate::error::{EngineError, FetchError};
use crate::http::HttpClient;

const SPIGET_API_BASE: &str = "https://api.spiget.org";
const SPIGOT_RESOURCE_PAGE: &str = "https://www.spigotmc.org/resources/";

#[derive(Debug, Deserialize)]
struct SpigetVersion {
    name: String,
}

/// Spiget's mirror of a SpigotMC resource's latest version.
#[derive(Debug, Clone)]
pub struct SpigetSource {
    endpoint: Url,
    resource_url: String,
}

impl SpigetSource {
    /// # Errors
    /// Returns an error when `resource_id` does not form a valid URL.
    pub fn new(resource_id: &str) -> Result<Self, EngineError> {
        Self::at(SPIGET_API_BASE, resource_id)
    }

    /// Like [`SpigetSource::new`] but against another API host.
    ///
    /// # Errors
    /// Returns an error when the base and id do not form a valid URL.
    pub fn at(api_base: &str, resource_id: &str) -> Result<Self, EngineError> {
        Ok(Self {
            endpoint: parse_endpoint(&format!(
                "{}/v2/resources/{resource_id}/versions/latest",
                trim_base(api_base)
            ))?,
            resource_url: format!("{SPIGOT_RESOURCE_PAGE}{resource_id}"),
        })
    }
}

#[async_trait]
impl VersionSource for SpigetSource {
    fn name(&self) -> &'static str {
        "spiget"
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
        let latest: SpigetVersion = client
            .get(&self.endpoint)
            .await?
            .json()
            .await
            .map_err(|error| FetchError::parse(&self.endpoint, error))?;

        let version = latest.name.trim();
        if version.is_empty() {
            return Err(FetchError::empty(&self.endpoint));
        }
        Ok(Some(LatestRelease::new(version)))
    }
}
