//! Process logging on top of `tracing`.
//!
//! Console lines are human-readable and carry the thread name, so the
//! `md-shm` consumer is easy to tell apart from the tokio workers. With a log
//! directory, every event is also written as one JSON object per line to a
//! daily file named after the module.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. Returns `false` if a
/// subscriber was already installed (for example by an earlier test in the
/// same binary); the existing one is kept.
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console = fmt::layer().with_target(false).with_thread_names(true);
    let file = log_dir.map(|dir| {
        fmt::layer()
            .json()
            .with_writer(tracing_appender::rolling::daily(dir, format!("{module_name}.log")))
            .with_current_span(false)
            .with_thread_names(true)
    });

    tracing_subscriber::registry().with(env_filter).with(console).with(file).try_init().is_ok()
}
