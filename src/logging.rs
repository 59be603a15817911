//! Tracing subscriber setup for the binaries.
//!
//! Filtering follows `RUST_LOG` (default `info`); `json = true` switches to
//! machine-readable output. Sparsity warnings are emitted on the
//! `data_sparsity` target, so `RUST_LOG=info,data_sparsity=debug` shows the
//! per-entity detail.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Target of every data-sparsity event.
pub const SPARSITY_TARGET: &str = "data_sparsity";

/// Installs the global subscriber. A second call is a no-op.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// `FEATURES_LOG_JSON=1|true` selects JSON output.
pub fn json_from_env() -> bool {
    std::env::var("FEATURES_LOG_JSON")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
