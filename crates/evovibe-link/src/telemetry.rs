//! Tracing setup shared by the `evovibe` and `evovibe-worker` binaries.
//!
//! Without `RUST_LOG`, the evovibe crates log at the requested level and
//! everything else (tokio, dependencies) only at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log targets of the workspace, libraries and binaries alike.
const TARGETS: [&str; 7] = [
    "evovibe",
    "evovibe_cli",
    "evovibe_core",
    "evovibe_link",
    "evovibe_media",
    "evovibe_state",
    "evovibe_worker",
];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.join(",")
}

/// Install the global subscriber; a second call in the same process is a no-op.
///
/// JSON lines keep the target so worker and master logs can be merged.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).try_init().ok();
    } else {
        registry.with(fmt::layer().with_target(false)).try_init().ok();
    }
}
