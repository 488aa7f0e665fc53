use tracing::Level;
use tracing_subscriber::fmt;

/// Installs the stderr log subscriber. INFO by default, DEBUG with
/// `verbose`. Safe to call more than once.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
}
