//! Tracing initialisation for the binaries.
//!
//! `RUST_LOG` drives the filter (default `info`); `SKYTRACK_LOG_FORMAT=json`
//! switches from the compact human format to newline-delimited JSON.

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber once.  Safe to call again (e.g. from
/// tests); later calls are ignored.
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SKYTRACK_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let initialised = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .try_init()
            .is_ok()
    };

    if initialised {
        info!(service, "tracing initialised");
    }
}
