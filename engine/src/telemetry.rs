//! Telemetry
//!
//! Sets up `tracing-subscriber`. The level comes from `RUST_LOG` when set,
//! otherwise from the `--log` flag or `core.log_level`. Debug builds print
//! pretty terminal output; release builds emit JSON lines with spans.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crate target that always follows the requested level
const ENGINE_TARGET: &str = "panel_engine";

/// Filter directive for a plain level such as `debug`
fn default_directive(log_level: &str) -> String {
    format!("{},{}={}", log_level, ENGINE_TARGET, log_level)
}

/// Initialize the tracing subscriber with the given level.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }
}
