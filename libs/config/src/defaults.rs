//! Framework defaults
//!
//! Default values used when neither a settings file nor an explicit
//! endpoint/action property provides one.

/// Endpoint defaults
pub mod endpoint {
    /// Receive timeout (milliseconds)
    pub const TIMEOUT_MS: u64 = 5_000;

    /// Interval between two reply store lookups (milliseconds)
    pub const POLLING_INTERVAL_MS: u64 = 500;

    /// Maximum age of an unclaimed reply before it is purged (milliseconds)
    pub const REPLY_MAX_AGE_MS: u64 = 60_000;
}

/// Test action defaults
pub mod actions {
    /// Timeout used by `receive-timeout` actions (milliseconds)
    pub const RECEIVE_TIMEOUT_EXPECTATION_MS: u64 = 1_000;

    /// Time a test case waits for async and forked work at teardown (milliseconds)
    pub const ASYNC_COMPLETION_TIMEOUT_MS: u64 = 10_000;

    /// Default iteration index variable
    pub const INDEX_NAME: &str = "i";
}

/// Runner defaults
pub mod runner {
    /// Number of test cases executed concurrently by a suite
    pub const SUITE_CONCURRENCY: usize = 1;
}

/// Embedded database server defaults
pub mod jdbc {
    /// Maximum concurrently open connections
    pub const MAX_CONNECTIONS: usize = 20;

    /// Validation queries answered without reaching the test
    pub const AUTO_HANDLE_QUERIES: &[&str] = &[
        "SELECT 1",
        "SELECT 1 FROM DUAL",
        "SELECT 1 FROM INFORMATION_SCHEMA.SYSTEM_USERS",
    ];
}
