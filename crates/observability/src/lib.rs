//! Process-wide tracing/logging setup.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide logging from the environment (`RUST_LOG`, `LOG_FORMAT`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}
