pub mod builders;
pub mod fake_builder;
pub mod fake_process;
pub mod fake_registry;
pub mod recorder;

pub use builders::{ConfigBuilder, write_file};
pub use fake_builder::FakeBuilder;
pub use fake_process::{Behaviour, FakeLauncher, FakeProcess};
pub use fake_registry::RecordingRegistry;
pub use recorder::{Log, Recorder};

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - Reads `DEVLOOP_LOG` (falling back to `RUST_LOG`, then `info`).
///
/// Enable levels with e.g.:
/// `DEVLOOP_LOG=devloop=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("DEVLOOP_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}
