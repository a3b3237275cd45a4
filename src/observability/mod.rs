use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber for the embedding application.
/// Safe to call once at startup; later calls are ignored.
pub fn init_tracing(log_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_target(false)
        .compact()
        .try_init();
}
