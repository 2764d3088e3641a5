use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a compact stderr subscriber. `RUST_LOG` takes precedence over
/// `default_filter`.
///
/// Returns `false` if a global subscriber was already set, which is the
/// normal case when several tests initialise logging.
pub fn init_logging(default_filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false).compact())
        .try_init()
        .is_ok()
}
