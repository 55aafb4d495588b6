use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the stderr logger. `RUST_LOG` controls the filter and defaults
/// to `info`. Command output stays on stdout.
pub fn init() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let _ = fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .compact()
    .try_init();
}
