//! `tracing` subscriber installation.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{HugeError, Result};

/// Directive used when neither the caller nor `RUST_LOG` picks one.
pub const DEFAULT_DIRECTIVE: &str = "huge_collections=info";

/// Installs a global `tracing` subscriber filtered by `level`.
///
/// `level` accepts any `EnvFilter` directive, e.g. `"huge_collections=debug"`.
pub fn init_logging(level: &str) -> Result<()> {
    install(parse_filter(level)?)
}

/// Installs a global subscriber filtered by `RUST_LOG`, or by
/// [`DEFAULT_DIRECTIVE`] when the variable is unset or empty.
pub fn init_default_logging() -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => parse_filter(&directives)?,
        _ => parse_filter(DEFAULT_DIRECTIVE)?,
    };
    install(filter)
}

fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| HugeError::InvalidArgument(format!("invalid log directive {directives:?}: {e}")))
}

fn install(filter: EnvFilter) -> Result<()> {
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|_| HugeError::InvalidArgument("logging already initialized".into()))
}
