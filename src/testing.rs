//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use crate::timer::ManualScheduler;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;

/// Initializes tracing for unit tests, ensuring it's only done once.
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

/// Records every invocation of a callback together with the virtual time it
/// happened at.
#[derive(Clone)]
pub struct Recorder<T> {
    clock: ManualScheduler,
    calls: Rc<RefCell<Vec<(Duration, T)>>>,
}

impl<T: Clone + 'static> Recorder<T> {
    pub fn new(clock: &ManualScheduler) -> Self {
        Self {
            clock: clock.clone(),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A callback that appends to this recorder.
    pub fn callback(&self) -> impl Fn(T) + use<T> {
        let recorder = self.clone();
        move |value| recorder.record(value)
    }

    pub fn record(&self, value: T) {
        self.calls.borrow_mut().push((self.clock.elapsed(), value));
    }

    pub fn calls(&self) -> Vec<(Duration, T)> {
        self.calls.borrow().clone()
    }

    pub fn values(&self) -> Vec<T> {
        self.calls.borrow().iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }
}

/// Milliseconds as a `Duration`.
pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
