use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::FetchError;
use crate::http::HttpClient;
use crate::source::{LatestRelease, VersionSource};

#[derive(Debug, Clone)]
pub(crate) enum Answer {
    Version(&'static str),
    VersionAt(&'static str, &'static str),
    Nothing,
    Fail,
}

/// A source that replays scripted answers and counts how often it is asked.
///
/// Once the script runs out every further fetch yields [`Answer::Nothing`].
pub(crate) struct ScriptedSource {
    endpoint: Url,
    answers: Mutex<VecDeque<Answer>>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedSource {
    pub(crate) fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            endpoint: Url::parse("https://updates.example.com/latest").expect("valid url"),
            answers: Mutex::new(answers.into_iter().collect()),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter that outlives the boxed source.
    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl VersionSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn resource_url(&self) -> &str {
        "https://example.com/plugin"
    }

    async fn fetch_latest_version(
        &self,
        _client: &HttpClient,
        _current_version: &str,
    ) -> Result<Option<LatestRelease>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let answer = self
            .answers
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Answer::Nothing);
        match answer {
            Answer::Version(version) => Ok(Some(LatestRelease::new(version))),
            Answer::VersionAt(version, url) => {
                Ok(Some(LatestRelease::new(version).with_resource_url(url)))
            }
            Answer::Nothing => Ok(None),
            Answer::Fail => Err(FetchError::empty(&self.endpoint)),
        }
    }
}
