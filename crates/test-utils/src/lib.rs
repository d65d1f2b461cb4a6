pub mod builders;
pub mod fake_backend;

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for any single awaited step in integration tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a per-test tracing subscriber.
///
/// Output is captured by the test harness and shown for failing tests only.
/// Filter with `RUST_LOG`, e.g. `RUST_LOG=journey::workspace=debug`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("journey=info"));
    // Another test in this binary may already have installed it.
    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// Await `f`, panicking after [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test step timed out after {TEST_TIMEOUT:?}"))
}

/// Receive everything left in `rx` until all senders are gone.
pub async fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Some(item) = with_timeout(rx.recv()).await {
        out.push(item);
    }
    out
}
