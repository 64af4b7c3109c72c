use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over `filter`; calling this
/// again after a subscriber is set is a no-op.
pub fn init(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .try_init();
}
