//! Structured logging setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Error, Result};

/// Install a global `fmt` subscriber writing to stderr.
///
/// `filter` is an `EnvFilter` directive such as `"gridlab=debug"`. Without one
/// `RUST_LOG` is honoured, then `info`.
///
/// # Errors
///
/// Returns [`Error::Config`] if the directive is malformed or a global
/// subscriber is already installed.
pub fn init_tracing(filter: Option<&str>) -> Result<()> {
    let filter = match filter {
        Some(directive) => EnvFilter::try_new(directive)
            .map_err(|e| Error::Config(format!("invalid log filter {directive:?}: {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
