//! Tracing subscriber bootstrap

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber
///
/// `filter` is an env-filter directive (e.g. `"info,gapless_providers=debug"`),
/// overridable through `RUST_LOG`. Safe to call more than once; subsequent
/// installs are ignored.
pub fn init_tracing(filter: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    let result = if json {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    };
    // A previously installed subscriber keeps priority
    let _ = result;
}
