//! tests/common/harness.rs
use pacekeeper::timer::LocalScheduler;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use tokio::task::LocalSet;
use tokio::time::Instant;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "pacekeeper=debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A test harness owning a `LocalSet`, a scheduler on top of it, and the
/// instant the test started at.
pub struct TestHarness {
    pub scheduler: LocalScheduler,
    pub started: Instant,
    local: LocalSet,
}

impl TestHarness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            scheduler: LocalScheduler::new(),
            started: Instant::now(),
            local: LocalSet::new(),
        }
    }

    /// Runs `test` to completion inside the harness' `LocalSet`.
    pub async fn run<F: std::future::Future>(&self, test: F) -> F::Output {
        self.local.run_until(test).await
    }
}

/// Shared log of values seen by a callback, stamped with milliseconds since
/// the harness started.
#[derive(Clone)]
pub struct CallLog<T> {
    started: Instant,
    calls: Rc<RefCell<Vec<(u128, T)>>>,
}

impl<T: Clone + 'static> CallLog<T> {
    pub fn new(harness: &TestHarness) -> Self {
        Self {
            started: harness.started,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sink(&self) -> impl Fn(T) + use<T> {
        let log = self.clone();
        move |value| {
            let at = log.started.elapsed().as_millis();
            log.calls.borrow_mut().push((at, value));
        }
    }

    pub fn values(&self) -> Vec<T> {
        self.calls.borrow().iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn calls(&self) -> Vec<(u128, T)> {
        self.calls.borrow().clone()
    }
}
