use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use log::debug;
use reqwest::Url;
use serde::Deserialize;

use super::{LatestRelease, VersionSource, parse_endpoint, trim_base};
use crate::error::{EngineError, FetchError};
use crate::http::HttpClient;

const HANGAR_API_BASE: &str = "https://hangar.papermc.io";
const HANGAR_PAGE_BASE: &str = "https://hangar.papermc.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HangarPlatform {
    Paper,
    Waterfall,
    Velocity,
}

impl HangarPlatform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paper => "PAPER",
            Self::Waterfall => "WATERFALL",
            Self::Velocity => "VELOCITY",
        }
    }
}

impl std::fmt::Display for HangarPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HangarPlatform {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Self::Paper, Self::Waterfall, Self::Velocity]
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| EngineError::UnknownTag {
                kind: "platform",
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct HangarVersions {
    #[serde(default)]
    result: Vec<HangarVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HangarVersion {
    name: String,
    #[serde(default)]
    platform_dependencies: HashMap<String, Vec<String>>,
}

/// A Hangar project's version list, filtered by platform.
///
/// Same shallow policy as Modrinth: only the first record is considered.
#[derive(Debug, Clone)]
pub struct HangarSource {
    platform: HangarPlatform,
    endpoint: Url,
    resource_url: String,
}

impl HangarSource {
    /// # Errors
    /// Returns an error when the author and slug do not form a valid URL.
    pub fn new(author: &str, slug: &str, platform: HangarPlatform) -> Result<Self, EngineError> {
        Self::at(HANGAR_API_BASE, author, slug, platform)
    }

    /// Like [`HangarSource::new`] but against another API host.
    ///
    /// # Errors
    /// Returns an error when the base, author, and slug do not form a valid URL.
    pub fn at(
        api_base: &str,
        author: &str,
        slug: &str,
        platform: HangarPlatform,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            platform,
            endpoint: parse_endpoint(&format!(
                "{}/api/v1/projects/{slug}/versions",
                trim_base(api_base)
            ))?,
            resource_url: format!("{HANGAR_PAGE_BASE}/{author}/{slug}"),
        })
    }

    fn select_latest(
        &self,
        versions: &HangarVersions,
        current_version: &str,
    ) -> Result<Option<LatestRelease>, FetchError> {
        let latest = versions
            .result
            .first()
            .ok_or_else(|| FetchError::empty(&self.endpoint))?;

        let supported = latest
            .platform_dependencies
            .keys()
            .any(|platform| platform.eq_ignore_ascii_case(self.platform.as_str()));
        if !supported {
            debug!(
                "Newest Hangar release {} does not target {}",
                latest.name, self.platform
            );
            return Ok(None);
        }
        if latest.name == current_version {
            return Ok(None);
        }

        let version_page = format!("{}/versions/{}", self.resource_url, latest.name);
        Ok(Some(
            LatestRelease::new(latest.name.clone()).with_resource_url(version_page),
        ))
    }
}

#[async_trait]
impl VersionSource for HangarSource {
    fn name(&self) -> &'static str {
        "hangar"
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
        current_version: &str,
    ) -> Result<Option<LatestRelease>, FetchError> {
        let versions: HangarVersions = client
            .get(&self.endpoint)
            .await?
            .json()
            .await
            .map_err(|error| FetchError::parse(&self.endpoint, error))?;

        self.select_latest(&versions, current_version)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{HangarPlatform, HangarSource};
    use crate::http::{HttpClient, HttpSettings};
    use crate::source::VersionSource;

    async fn fetch(body: serde_json::Value, current: &str) -> Option<crate::LatestRelease> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/projects/ViaVersion/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        let source = HangarSource::at(
            &server.uri(),
            "ViaVersion",
            "ViaVersion",
            HangarPlatform::Paper,
        )
        .expect("source");
        let client = HttpClient::new(HttpSettings::default()).expect("client should build");

        source
            .fetch_latest_version(&client, current)
            .await
            .expect("fetch should succeed")
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!(
            "velocity".parse::<HangarPlatform>().expect("velocity"),
            HangarPlatform::Velocity
        );
        assert!("fabric".parse::<HangarPlatform>().is_err());
    }

    #[tokio::test]
    async fn accepts_first_release_for_platform() {
        let release = fetch(
            json!({
                "pagination": { "limit": 25, "offset": 0, "count": 2 },
                "result": [
                    { "name": "5.3.0", "platformDependencies": { "PAPER": ["1.20-1.21"] } },
                    { "name": "5.2.1", "platformDependencies": { "PAPER": ["1.20"] } }
                ]
            }),
            "5.2.1",
        )
        .await
        .expect("release should be accepted");

        assert_eq!(release.version, "5.3.0");
        assert_eq!(
            release.resource_url.as_deref(),
            Some("https://hangar.papermc.io/ViaVersion/ViaVersion/versions/5.3.0")
        );
    }

    #[tokio::test]
    async fn rejects_first_release_for_other_platform() {
        let release = fetch(
            json!({
                "result": [
                    { "name": "5.3.0", "platformDependencies": { "VELOCITY": ["3.3"] } },
                    { "name": "5.2.9", "platformDependencies": { "PAPER": ["1.20"] } }
                ]
            }),
            "5.2.1",
        )
        .await;

        assert_eq!(release, None);
    }
}
