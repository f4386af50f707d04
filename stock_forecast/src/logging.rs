//! Tracing setup

use std::env;

/// Default log level when neither `RUST_LOG` nor a CLI flag is given
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate targets log at `level`.
/// Output goes to stderr so that command output on stdout stays clean.
/// Calling this again after a subscriber is installed does nothing.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("stock_forecast={level},stockcast={level}");
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}
