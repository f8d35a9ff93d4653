//! Tracing setup shared by the teleop nodes.
//!
//! The subscriber is installed thread-locally so it never fights with the
//! global subscriber the dora runtime may already have registered.

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with a thread-local subscriber.
///
/// Honors `RUST_LOG` (defaults to `info`) and prints compact lines without
/// target, file or line metadata.
///
/// The returned guard keeps the subscriber active; hold it for the lifetime
/// of the node.
///
/// # Example
/// ```no_run
/// use cobot_lib::init_tracing;
///
/// fn main() {
///     let _guard = init_tracing();
///     // node code here
/// }
/// ```
pub fn init_tracing() -> DefaultGuard {
    init_tracing_with_default("info")
}

/// Same as [`init_tracing`], with a caller-chosen fallback filter for when
/// `RUST_LOG` is unset or unparsable.
pub fn init_tracing_with_default(default_filter: &str) -> DefaultGuard {
    use tracing_subscriber::layer::SubscriberExt;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(fmt_layer);

    tracing::subscriber::set_default(subscriber)
}
