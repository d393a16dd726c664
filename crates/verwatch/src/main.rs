mod error;
mod logging;
mod notify;
mod proxy;
mod settings;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use log::{info, warn};
use verwatch_core::{HttpClient, NotificationSink, VersionFetcher};
use verwatch_platform::AppPaths;

use crate::error::AppError;
use crate::notify::ConsoleSink;
use crate::proxy::SettingsProxyProvider;
use crate::settings::AppSettings;

const PROXY_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

const USAGE: &str = "\
usage: verwatch [check | watch]

  check   check every configured resource once and print the result (default)
  watch   keep checking in the background until Ctrl-C";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Check,
    Watch,
    Help,
    Version,
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, AppError> {
        let command = match args.next().as_deref() {
            None | Some("check") => Self::Check,
            Some("watch") => Self::Watch,
            Some("help" | "-h" | "--help") => Self::Help,
            Some("-V" | "--version") => Self::Version,
            Some(other) => return Err(AppError::Usage(format!("unknown command '{other}'"))),
        };
        match args.next() {
            Some(extra) => Err(AppError::Usage(format!("unexpected argument '{extra}'"))),
            None => Ok(command),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("verwatch: {error}");
            if matches!(error, AppError::Usage(_)) {
                eprintln!("\n{USAGE}");
            }
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<(), AppError> {
    let command = Command::parse(std::env::args().skip(1))?;
    match command {
        Command::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        Command::Version => {
            println!("verwatch {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Check | Command::Watch => {}
    }

    let paths = AppPaths::new()?;
    let settings_path = paths.settings_file();
    let settings = AppSettings::load_from_path(&settings_path)?;
    logging::init_logging(&paths, settings.debug_logging, settings.max_log_size_bytes);

    if settings.resources.is_empty() {
        eprintln!(
            "verwatch: no resources configured in {}",
            settings_path.display()
        );
        return Ok(());
    }

    let provider = Arc::new(SettingsProxyProvider::new(
        settings_path,
        settings.proxy.clone(),
    ));
    let client = HttpClient::with_provider(settings.http_settings(), provider)?;
    let fetchers = build_fetchers(&settings, &client)?;

    if command == Command::Watch {
        watch(&client, &fetchers).await
    } else {
        check(&fetchers).await;
        Ok(())
    }
}

fn build_fetchers(
    settings: &AppSettings,
    client: &HttpClient,
) -> Result<Vec<VersionFetcher>, AppError> {
    let sink: Arc<dyn NotificationSink> = Arc::new(ConsoleSink);

    settings
        .resources
        .iter()
        .map(|resource| {
            let resource_error = |source| AppError::Resource {
                name: resource.name.clone(),
                source,
            };
            let mut builder = VersionFetcher::builder(
                &resource.name,
                &resource.current_version,
                resource.source.build().map_err(resource_error)?,
            )
            .cache_window(settings.cache_window())
            .poll_interval(settings.poll_interval())
            .client(client.clone())
            .sink(Arc::clone(&sink));
            if let Some(resource_url) = &resource.resource_url {
                builder = builder.resource_url(resource_url.clone());
            }
            builder.build().map_err(resource_error)
        })
        .collect()
}

async fn check(fetchers: &[VersionFetcher]) {
    join_all(fetchers.iter().map(|fetcher| fetcher.has_update())).await;

    let sink = ConsoleSink;
    for fetcher in fetchers {
        match fetcher.last_error() {
            Some(failure) if fetcher.latest_version().is_none() => {
                eprintln!(
                    "[{}] Update check failed: {}",
                    fetcher.plugin_name(),
                    failure.message
                );
            }
            _ => fetcher.notify(&sink),
        }
    }
}

async fn watch(client: &HttpClient, fetchers: &[VersionFetcher]) -> Result<(), AppError> {
    for fetcher in fetchers {
        fetcher.start()?;
    }
    info!("Watching {} resource(s)", fetchers.len());

    let mut proxy_refresh = tokio::time::interval(PROXY_REFRESH_INTERVAL);
    proxy_refresh.tick().await;

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => break signal.map_err(AppError::Signal),
            _ = proxy_refresh.tick() => {
                if let Err(error) = client.refresh_proxy() {
                    warn!("Proxy refresh failed: {error}");
                }
            }
        }
    };

    info!("Stopping update pollers");
    tokio::task::block_in_place(|| fetchers.iter().for_each(VersionFetcher::close));
    result
}
