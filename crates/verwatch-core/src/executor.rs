//! Shared executor for one-off async work.
//!
//! Pollers never run here; each poller owns its own thread. This executor
//! only carries ad hoc requests such as [`crate::HttpClient::get_async`] or a
//! blocking update check triggered from synchronous code.
//!
//! The executor always owns its runtime. The caller's runtime only decides
//! which flavor gets built, so the executor outlives whatever runtime first
//! asked for it.

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use log::debug;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::task::JoinHandle;

use crate::error::EngineError;

const POOL_MAX_WORKERS: usize = 4;
const POOL_KEEP_ALIVE: Duration = Duration::from_secs(15);

static SHARED: OnceLock<SharedExecutor> = OnceLock::new();

/// How the shared executor runs its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionModel {
    /// The host already runs a multi-threaded tokio runtime, so cheap tasks
    /// are available; the executor gets an unbounded multi-threaded runtime
    /// of its own.
    LightweightThreads,
    /// No such runtime was found; a small bounded worker pool is used.
    PooledThreads,
}

impl ExecutionModel {
    /// Look at the calling thread for a multi-threaded async runtime.
    #[must_use]
    pub fn detect() -> Self {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                Self::LightweightThreads
            }
            _ => Self::PooledThreads,
        }
    }

    fn build_runtime(self) -> Result<Runtime, EngineError> {
        let mut builder = Builder::new_multi_thread();
        match self {
            Self::LightweightThreads => {
                builder.thread_name("verwatch-task");
            }
            Self::PooledThreads => {
                builder
                    .worker_threads(POOL_MAX_WORKERS)
                    .max_blocking_threads(POOL_MAX_WORKERS)
                    .thread_keep_alive(POOL_KEEP_ALIVE)
                    .thread_name("verwatch-worker");
            }
        }
        builder
            .enable_all()
            .build()
            .map_err(|error| EngineError::runtime("failed to start shared executor", error))
    }
}

pub struct SharedExecutor {
    model: ExecutionModel,
    runtime: Runtime,
}

impl SharedExecutor {
    /// The process-wide executor, created on first use.
    ///
    /// The execution model is detected once, on the thread that first asks
    /// for the executor, and kept for the lifetime of the process.
    ///
    /// # Errors
    /// Returns an error when the executor's runtime cannot be started.
    pub fn global() -> Result<&'static Self, EngineError> {
        if let Some(executor) = SHARED.get() {
            return Ok(executor);
        }

        let executor = Self::new(ExecutionModel::detect())?;
        if let Err(lost) = SHARED.set(executor) {
            lost.shutdown();
        }
        SHARED
            .get()
            .ok_or_else(|| {
                EngineError::runtime("shared executor", std::io::Error::other("not initialized"))
            })
    }

    fn new(model: ExecutionModel) -> Result<Self, EngineError> {
        let runtime = model.build_runtime()?;
        debug!("Shared executor started ({model:?})");
        Ok(Self { model, runtime })
    }

    #[must_use]
    pub fn model(&self) -> ExecutionModel {
        self.model
    }

    /// Submit a future to the executor.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Run a future to completion from synchronous code.
    ///
    /// # Panics
    /// Panics when called from within an async runtime; use `.await` there.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    // Only reached when two threads race to initialize, or from tests. A
    // plain drop panics inside an async context, a background shutdown does not.
    fn shutdown(self) {
        self.runtime.shutdown_background();
    }
}
