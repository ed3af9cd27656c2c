//! # Trellis End-to-End
//!
//! Runner for TOML test suites plus the scenarios exercising the whole
//! stack: endpoints, correlation, the action tree and the JDBC controller.

pub mod framework;

pub use framework::{discover_suites, TestFramework};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the fmt subscriber; `RUST_LOG` overrides the default level
pub fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "e2e_tests={level},actions={level},endpoint={level},jdbc_server={level},framework_config={level}"
        ))
    })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}
