//! # Trellis Centralized Configuration
//!
//! Settings and defaults shared by every Trellis crate, so that endpoint
//! timeouts, polling intervals and runner behaviour are defined in one place.
//!
//! ## Features
//!
//! - **Defaults**: receive timeouts, polling intervals, async completion bounds
//! - **Framework settings**: TOML file + `TRELLIS_` environment overrides
//! - **Endpoint definitions**: declarative direct / direct-sync endpoints
//!
//! ## Usage
//!
//! ```rust,no_run
//! use framework_config::{defaults, FrameworkSettings};
//!
//! let settings = FrameworkSettings::load(None).unwrap();
//! assert!(settings.defaults.polling_interval_ms <= defaults::endpoint::TIMEOUT_MS);
//! ```

pub mod defaults;
pub mod settings;

// Re-export commonly used types
pub use settings::{
    load_settings, CorrelatorSettings, DefaultSettings, EndpointKind, EndpointSettings,
    FrameworkSettings, JdbcSettings, SuiteSettings, AUTO_HANDLE_QUERY_ENV,
};
