//! Per-platform locations for verwatch settings, logs, and scratch files.

mod paths;

pub use paths::{AppPaths, AppPathsError};
