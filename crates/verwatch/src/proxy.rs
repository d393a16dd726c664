use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use log::warn;
use verwatch_core::{ProxyProvider, ProxySetting};

use crate::settings::AppSettings;

pub const PROXY_ENV_VAR: &str = "VERWATCH_PROXY";

/// Proxy taken from `VERWATCH_PROXY` when set, otherwise re-read from the
/// settings file so edits apply on the next refresh.
///
/// When the file cannot be re-read, the proxy handed out last time is
/// returned again.
pub struct SettingsProxyProvider {
    settings_path: PathBuf,
    last_known: Mutex<ProxySetting>,
    env_override: Box<dyn Fn() -> Option<String> + Send + Sync>,
}

impl SettingsProxyProvider {
    pub fn new(settings_path: PathBuf, initial: ProxySetting) -> Self {
        Self {
            settings_path,
            last_known: Mutex::new(initial),
            env_override: Box::new(|| std::env::var(PROXY_ENV_VAR).ok()),
        }
    }

    #[cfg(test)]
    fn with_env_override(mut self, value: Option<&'static str>) -> Self {
        self.env_override = Box::new(move || value.map(str::to_string));
        self
    }

    fn env_proxy(&self) -> Option<ProxySetting> {
        let value = (self.env_override)()?;
        ProxySetting::parse(&value)
            .inspect_err(|error| warn!("Ignoring {PROXY_ENV_VAR}: {error}"))
            .ok()
    }

    fn settings_file_proxy(&self) -> Option<ProxySetting> {
        AppSettings::load_from_path(&self.settings_path)
            .inspect_err(|error| {
                warn!("Keeping previous proxy, settings could not be re-read: {error}");
            })
            .ok()
            .map(|settings| settings.proxy)
    }
}

impl ProxyProvider for SettingsProxyProvider {
    fn proxy(&self) -> ProxySetting {
        let resolved = self
            .env_proxy()
            .or_else(|| self.settings_file_proxy());

        let mut last_known = self
            .last_known
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(proxy) = resolved {
            *last_known = proxy;
        }
        last_known.clone()
    }
}
