//! Background polling, one dedicated thread per fetcher.
//!
//! The thread drives a single-threaded runtime. Both the sleep and the fetch
//! race against the shutdown token, so closing the poller drops an in-flight
//! request instead of waiting for it.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::fetcher::FetcherInner;

#[derive(Default)]
pub(crate) struct Poller {
    running: Option<RunningPoller>,
}

struct RunningPoller {
    shutdown: CancellationToken,
    join_handle: std::thread::JoinHandle<()>,
}

impl Poller {
    pub(crate) fn start(&mut self, inner: Arc<FetcherInner>) -> Result<(), EngineError> {
        self.close();

        let shutdown = CancellationToken::new();
        let worker_shutdown = shutdown.clone();
        let join_handle = std::thread::Builder::new()
            .name(format!("verwatch-poll-{}", inner.plugin_name))
            .spawn(move || run(&inner, &worker_shutdown))
            .map_err(|error| EngineError::runtime("failed to spawn update poller", error))?;

        self.running = Some(RunningPoller {
            shutdown,
            join_handle,
        });
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.shutdown.cancel();

        if running.join_handle.thread().id() == std::thread::current().id() {
            return;
        }
        if running.join_handle.join().is_err() {
            warn!("Update poller thread panicked");
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.join_handle.is_finished())
    }
}

fn run(inner: &FetcherInner, shutdown: &CancellationToken) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            warn!(
                "Update poller for {} could not start its runtime: {error}",
                inner.plugin_name
            );
            return;
        }
    };

    inner.active_pollers.fetch_add(1, Ordering::SeqCst);
    runtime.block_on(poll_loop(inner, shutdown));
    inner.active_pollers.fetch_sub(1, Ordering::SeqCst);
    debug!("Update poller for {} stopped", inner.plugin_name);
}

async fn poll_loop(inner: &FetcherInner, shutdown: &CancellationToken) {
    info!(
        "Update poller for {} started (every {:?})",
        inner.plugin_name, inner.poll_interval
    );
    let mut announced: Option<String> = None;

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => return,
            has_update = inner.has_update_at(Utc::now()) => {
                if has_update {
                    announce(inner, &mut announced);
                }
            }
        }

        tokio::select! {
            biased;
            () = shutdown.cancelled() => return,
            () = tokio::time::sleep(inner.poll_interval) => {}
        }
    }
}

fn announce(inner: &FetcherInner, announced: &mut Option<String>) {
    let Some(sink) = inner.sink.as_ref() else {
        return;
    };
    let latest = inner.snapshot().latest_version.clone();
    if latest.is_none() || *announced == latest {
        return;
    }
    sink.notify_update(&inner.update_message());
    *announced = latest;
}
