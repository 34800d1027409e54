//! Shared helpers for permwatch's integration tests.

pub mod builders;
pub mod fake_backend;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound for anything a test waits on.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness, once per binary.
///
/// Output shows up only for failing tests (or with `--nocapture`). The
/// default is permwatch's own events at debug level; `RUST_LOG` overrides it.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,permwatch=debug"));

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_DEADLINE`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_DEADLINE, f).await {
        Ok(value) => value,
        Err(_) => panic!("test did not finish within {TEST_DEADLINE:?}"),
    }
}

/// Poll `condition` until it holds.
///
/// The watcher loop runs on its own thread, so tests observe its effects
/// from the outside instead of stepping it.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    with_timeout(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}
