//! Development-time tracing for debugging the gate.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Not persisted, not part of the hook protocol.
//!
//! - **Audit events (`io/events`)**: Product records in
//!   `sessions/sessions-events.jsonl`. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset, so hook stderr
/// only carries warnings and block messages.
///
/// # Example
/// ```bash
/// echo '{"tool_name":"Bash","tool_input":{"command":"ls"}}' \
///     | RUST_LOG=gate=debug gate pre-tool-use
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
