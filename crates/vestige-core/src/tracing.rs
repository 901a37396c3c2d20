//! Tracing subscriber setup.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "VESTIGE_LOG";

static INIT: OnceLock<bool> = OnceLock::new();

/// Install a fmt subscriber filtered by `VESTIGE_LOG` (default `warn`).
///
/// Safe to call more than once; returns `true` only for the call that
/// actually installed the subscriber.
pub fn init_tracing() -> bool {
    let mut installed = false;
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
        installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok();
        installed
    });
    installed
}
