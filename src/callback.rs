//! 回调单元
//! Callback cell
//!
//! 持有调用者最新提供的回调。定时器只在触发时读取它，因此替换回调既不会重置
//! 待执行的定时器，也不会让定时器调用过时的闭包。
//!
//! Holds the most recent callback supplied by the caller. Timers read it only
//! when they fire, so replacing the callback neither resets a pending timer nor
//! lets the timer run a stale closure.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// 共享的可替换回调
/// Shared, replaceable callback
pub struct CallbackCell<F: ?Sized> {
    slot: Rc<RefCell<Rc<F>>>,
}

impl<F: ?Sized> CallbackCell<F> {
    pub fn new(callback: Rc<F>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(callback)),
        }
    }

    /// 替换回调，返回之前的回调
    /// Replace the callback, returning the previous one
    pub fn replace(&self, callback: Rc<F>) -> Rc<F> {
        self.slot.replace(callback)
    }

    /// 当前回调的快照。
    /// Snapshot of the current callback.
    ///
    /// The borrow is released before returning, so the callback may call
    /// `replace` on this same cell while it runs.
    pub fn current(&self) -> Rc<F> {
        self.slot.borrow().clone()
    }
}

impl<F: ?Sized> Clone for CallbackCell<F> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for CallbackCell<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackCell")
            .field("callback", &"<callback>")
            .finish()
    }
}
