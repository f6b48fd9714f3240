//! Log subscriber for the CLI and the HTTP adapter

use tracing_subscriber::{fmt, EnvFilter};

/// Set to `1` for JSON log lines.
pub const LOG_JSON_VAR: &str = "COPE_LOG_JSON";

/// Install the global subscriber. `RUST_LOG` filters (default `info`); output
/// goes to stderr so stdout stays clean for command output. Calling twice is
/// harmless.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::Subscriber::builder().with_env_filter(env_filter).with_writer(std::io::stderr);

    if json_requested() {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.pretty().try_init();
    }
}

fn json_requested() -> bool {
    std::env::var(LOG_JSON_VAR).is_ok_and(|value| value == "1")
}
