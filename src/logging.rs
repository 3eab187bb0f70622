use std::io;
use tracing_subscriber::EnvFilter;

/// Filter directives for a `-v` count
fn filter_for(verbose_level: u8) -> &'static str {
    match verbose_level {
        0 => "warn",
        1 => "info,kull=debug,llm=debug",
        _ => "debug,kull=trace,llm=trace",
    }
}

/// Install the global subscriber.
///
/// Logs always go to stderr: stdout carries the pass-through input and the
/// AI section only.
pub fn setup_logging(verbose_level: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        // Use RUST_LOG if set
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(filter_for(verbose_level))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(verbose_level > 1)
        .with_line_number(verbose_level > 1)
        .with_level(true)
        .with_writer(io::stderr)
        .try_init();
}
