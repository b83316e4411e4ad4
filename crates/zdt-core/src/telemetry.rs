//! Tracing setup for the `zdt` binary.
//!
//! `RUST_LOG` wins when set. Otherwise the harness crates log at the requested
//! level while HTTP and runtime dependencies stay at `warn`, so `--verbose`
//! shows harness decisions without connection-pool chatter.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const HARNESS_TARGETS: [&str; 3] = ["zdt", "zdt_core", "zdt_runtime"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        HARNESS_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level.as_str().to_lowercase())),
    );
    directives.join(",")
}

/// Install the global subscriber. `json` switches to one JSON object per line.
///
/// Later calls are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(filter);

    // An already-installed subscriber (tests, embedding) is kept.
    if json {
        registry
            .with(fmt::layer().with_target(false).json().flatten_event(true))
            .try_init()
            .ok();
    } else {
        registry.with(fmt::layer().with_target(false)).try_init().ok();
    }
}
