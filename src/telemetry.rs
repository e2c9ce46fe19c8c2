//! Log output for the `qrport` binary.
//!
//! Events go to stderr through `tracing_subscriber::fmt`, leaving stdout for command output.
//! `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builds the filter: `RUST_LOG` when set and valid, else `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}
