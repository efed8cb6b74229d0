use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. `--verbose` turns on debug output for this
/// crate; `RUST_LOG` still applies on top. Otherwise only warnings and errors
/// reach stderr, so skipped symbols stay visible.
pub fn init_logging(verbose: bool) {
    let (crate_level, default_directive) = if verbose {
        (LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::WARN, "warn")
    };
    let app_filter = Targets::new().with_target("fundhist", crate_level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .with(app_filter)
        .with(env_filter)
        .init();
}
