//! Tracing subscriber setup for the CLI

use tracing_subscriber::EnvFilter;

/// Install a console subscriber. `RUST_LOG` takes precedence; otherwise the
/// crate logs at info, or debug when `verbose` is set.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "rfmforge=debug" } else { "rfmforge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // a second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
