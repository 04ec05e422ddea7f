//! Development-time tracing for debugging the agent.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG` or `--verbose`,
//!   output to stderr. Not persisted.
//!
//! - **Progress and reports**: The CLI prints loop events on stdout and writes the
//!   run report under the reports directory. Both are unaffected by tracing.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
fn default_directive(verbose: bool) -> &'static str {
    if verbose { "warn,agent=debug" } else { "warn" }
}

/// Initialize tracing subscriber for development logging.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks between `warn` and
/// crate-level `debug`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=agent::validate=debug cargo run -- run --target icici
/// ```
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
