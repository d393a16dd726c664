use std::str::FromStr;

use async_trait::async_trait;
use log::debug;
use reqwest::Url;
use serde::Deserialize;

use super::{LatestRelease, VersionSource, parse_endpoint, trim_base};
use crate::error::{EngineError, FetchError};
use crate::http::HttpClient;

const MODRINTH_API_BASE: &str = "https://api.modrinth.com";
const MODRINTH_PROJECT_URL: &str = "https://modrinth.com/project/";

/// Loader and platform tags used by Modrinth version records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Loader {
    Bukkit,
    Spigot,
    Paper,
    Purpur,
    Folia,
    Sponge,
    BungeeCord,
    Waterfall,
    Velocity,
    Forge,
    NeoForge,
    Fabric,
    Quilt,
    LiteLoader,
    Rift,
    RisugamiModLoader,
    Datapack,
}

impl Loader {
    const ALL: [Self; 17] = [
        Self::Bukkit,
        Self::Spigot,
        Self::Paper,
        Self::Purpur,
        Self::Folia,
        Self::Sponge,
        Self::BungeeCord,
        Self::Waterfall,
        Self::Velocity,
        Self::Forge,
        Self::NeoForge,
        Self::Fabric,
        Self::Quilt,
        Self::LiteLoader,
        Self::Rift,
        Self::RisugamiModLoader,
        Self::Datapack,
    ];

    /// The tag as it appears in the API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bukkit => "bukkit",
            Self::Spigot => "spigot",
            Self::Paper => "paper",
            Self::Purpur => "purpur",
            Self::Folia => "folia",
            Self::Sponge => "sponge",
            Self::BungeeCord => "bungeecord",
            Self::Waterfall => "waterfall",
            Self::Velocity => "velocity",
            Self::Forge => "forge",
            Self::NeoForge => "neoforge",
            Self::Fabric => "fabric",
            Self::Quilt => "quilt",
            Self::LiteLoader => "liteloader",
            Self::Rift => "rift",
            Self::RisugamiModLoader => "modloader",
            Self::Datapack => "datapack",
        }
    }
}

impl std::fmt::Display for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Loader {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|loader| loader.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| EngineError::UnknownTag {
                kind: "loader",
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct ModrinthVersion {
    version_number: String,
    #[serde(default)]
    loaders: Vec<String>,
    project_id: String,
}

/// A Modrinth project's version list, filtered by loader.
///
/// Only the first (newest) record is inspected. When it targets another
/// loader or equals the running version the fetch yields nothing; older
/// records are never scanned.
#[derive(Debug, Clone)]
pub struct ModrinthSource {
    loader: Loader,
    endpoint: Url,
    resource_url: String,
}

impl ModrinthSource {
    /// # Errors
    /// Returns an error when `slug` does not form a valid URL.
    pub fn new(slug: &str, loader: Loader) -> Result<Self, EngineError> {
        Self::at(MODRINTH_API_BASE, slug, loader)
    }

    /// Like [`ModrinthSource::new`] but against another API host.
    ///
    /// # Errors
    /// Returns an error when the base and slug do not form a valid URL.
    pub fn at(api_base: &str, slug: &str, loader: Loader) -> Result<Self, EngineError> {
        Ok(Self {
            loader,
            endpoint: parse_endpoint(&format!(
                "{}/v2/project/{slug}/version",
                trim_base(api_base)
            ))?,
            resource_url: format!("{MODRINTH_PROJECT_URL}{slug}"),
        })
    }

    fn select_latest(
        &self,
        versions: &[ModrinthVersion],
        current_version: &str,
    ) -> Result<Option<LatestRelease>, FetchError> {
        let latest = versions.first().ok_or_else(|| FetchError::empty(&self.endpoint))?;

        if !latest.loaders.iter().any(|tag| tag == self.loader.as_str()) {
            debug!(
                "Newest Modrinth release {} does not target {} (loaders: {:?})",
                latest.version_number, self.loader, latest.loaders
            );
            return Ok(None);
        }
        if latest.version_number == current_version {
            return Ok(None);
        }

        Ok(Some(
            LatestRelease::new(latest.version_number.clone()).with_resource_url(format!(
                "{MODRINTH_PROJECT_URL}{}/version/{}",
                latest.project_id, latest.version_number
            )),
        ))
    }
}

#[async_trait]
impl VersionSource for ModrinthSource {
    fn name(&self) -> &'static str {
        "modrinth"
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
        let versions: Vec<ModrinthVersion> = client
            .get(&self.endpoint)
            .await?
            .json()
            .await
            .map_err(|error| FetchError::parse(&self.endpoint, error))?;

        self.select_latest(&versions, current_version)
    }
}
