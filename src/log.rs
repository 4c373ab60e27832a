//! Logging to the environment's stderr.

use tracing::level_filters::LevelFilter;

use crate::env::Env;

/// Run `op` with a log subscriber writing to the stderr of `env`.
///
/// Progress messages are only shown when `verbose` is set; warnings and
/// errors always are. The subscriber is scoped to the current thread, so
/// work moved to another thread has to carry the dispatcher along.
pub fn with_logging<T>(env: &impl Env, verbose: bool, op: impl FnOnce() -> T) -> T {
    let stderr = env.stderr();
    let ansi = stderr.is_terminal();
    let level = if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(stderr)
        .with_max_level(level)
        .with_ansi(ansi)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::with_default(subscriber, op)
}
