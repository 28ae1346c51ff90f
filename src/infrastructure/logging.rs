// Tracing subscriber setup
use tracing_subscriber::EnvFilter;

/// Human-readable output at debug level, JSON lines otherwise. `RUST_LOG`
/// takes precedence over the configured level.
pub fn init_logging(level: &str, to_stderr: bool) {
    let level = level.to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match (level == "debug", to_stderr) {
        (true, true) => builder.with_writer(std::io::stderr).try_init(),
        (true, false) => builder.try_init(),
        (false, true) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, false) => builder.json().try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
