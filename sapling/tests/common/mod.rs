use tracing_subscriber::EnvFilter;

/// Route library logs to the test writer. `RUST_LOG` picks the level; build
/// with `--features tracing` to see anything.
pub fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
