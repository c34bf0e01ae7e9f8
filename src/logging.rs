//! Tracing subscriber setup.
//!
//! The filter comes from `RUST_LOG` and defaults to `info`.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Another global subscriber is already installed.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing_subscriber::util::TryInitError),
}

/// Install a formatted stdout subscriber.
///
/// Subsequent calls are no-ops. Failures are returned so callers can degrade
/// gracefully without aborting startup.
///
/// # Errors
///
/// Returns [`LoggingError::SetGlobal`] if a different subscriber was
/// installed by someone else first
pub fn init() -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    tracing_subscriber::registry()
        .with(build_env_filter())
        .with(fmt::layer().with_target(true))
        .try_init()?;
    let _ = INSTALLED.set(());
    Ok(())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        // A test harness may already own the global subscriber; either way a
        // second call must not fail once the first succeeded.
        if init().is_ok() {
            assert!(init().is_ok());
        }
    }
}
