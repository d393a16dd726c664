use async_trait::async_trait;
use reqwest::Url;

use super::{LatestRelease, VersionSource, parse_endpoint, trim_base};
use crate::error::{EngineError, FetchError};
use crate::http::HttpClient;

const SPIGOT_API_BASE: &str = "https://api.spigotmc.org";
const SPIGOT_RESOURCE_PAGE: &str = "https://spigotmc.org/resources/";

/// An endpoint whose body's first line is the latest version.
#[derive(Debug, Clone)]
pub struct PlaintextSource {
    name: &'static str,
    endpoint: Url,
    resource_url: String,
}

impl PlaintextSource {
    /// # Errors
    /// Returns an error when `endpoint` is not an absolute http(s) URL.
    pub fn new(endpoint: &str, resource_url: impl Into<String>) -> Result<Self, EngineError> {
        Ok(Self {
            name: "plaintext",
            endpoint: parse_endpoint(endpoint)?,
            resource_url: resource_url.into(),
        })
    }

    /// The legacy SpigotMC update endpoint for `resource_id`.
    ///
    /// # Errors
    /// Returns an error when `resource_id` does not form a valid URL.
    pub fn spigot(resource_id: &str) -> Result<Self, EngineError> {
        Self::spigot_at(SPIGOT_API_BASE, resource_id)
    }

    /// Like [`PlaintextSource::spigot`] but against another API host.
    ///
    /// # Errors
    /// Returns an error when the base and id do not form a valid URL.
    pub fn spigot_at(api_base: &str, resource_id: &str) -> Result<Self, EngineError> {
        let endpoint = parse_endpoint(&format!(
            "{}/legacy/update.php?resource={resource_id}",
            trim_base(api_base)
        ))?;
        Ok(Self {
            name: "spigot",
            endpoint,
            resource_url: format!("{SPIGOT_RESOURCE_PAGE}{resource_id}"),
        })
    }
}

#[async_trait]
impl VersionSource for PlaintextSource {
    fn name(&self) -> &'static str {
        self.name
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
        let body = client
            .get(&self.endpoint)
            .await?
            .text()
            .await
            .map_err(|error| FetchError::request(&self.endpoint, error))?;

        first_line(&body)
            .map(|version| Some(LatestRelease::new(version)))
            .ok_or_else(|| FetchError::empty(&self.endpoint))
    }
}

fn first_line(body: &str) -> Option<&str> {
    body.lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{PlaintextSource, first_line};
    use crate::error::FetchError;
    use crate::http::{HttpClient, HttpSettings};
    use crate::source::VersionSource;

    fn client() -> HttpClient {
        HttpClient::new(HttpSettings::default()).expect("client should build")
    }

    #[test]
    fn first_line_trims_and_rejects_blank() {
        assert_eq!(first_line("2.4.1\r\nignored"), Some("2.4.1"));
        assert_eq!(first_line("  3.0 "), Some("3.0"));
        assert_eq!(first_line(""), None);
        assert_eq!(first_line("   \n2.0"), None);
    }

    #[tokio::test]
    async fn spigot_reads_first_line_of_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/legacy/update.php"))
            .and(query_param("resource", "19254"))
            .respond_with(ResponseTemplate::new(200).set_body_string("5.2.1\n"))
            .mount(&server)
            .await;
        let source = PlaintextSource::spigot_at(&server.uri(), "19254").expect("source");

        let release = source
            .fetch_latest_version(&client(), "5.2.0")
            .await
            .expect("fetch should succeed")
            .expect("a version should be returned");

        assert_eq!(release.version, "5.2.1");
        assert_eq!(release.resource_url, None);
        assert_eq!(source.resource_url(), "https://spigotmc.org/resources/19254");
    }

    #[tokio::test]
    async fn blank_body_is_reported_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("\n"))
            .mount(&server)
            .await;
        let source = PlaintextSource::new(&format!("{}/version.txt", server.uri()), "https://example.com")
            .expect("source");

        let error = source
            .fetch_latest_version(&client(), "1.0")
            .await
            .expect_err("blank body should fail");

        assert!(matches!(error, FetchError::Empty { .. }));
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let source = PlaintextSource::new(&format!("{}/version.txt", server.uri()), "https://example.com")
            .expect("source");

        let error = source
            .fetch_latest_version(&client(), "1.0")
            .await
            .expect_err("503 should fail");

        assert!(matches!(error, FetchError::HttpStatus { .. }));
    }
}
