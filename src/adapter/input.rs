//! 输入控件适配器
//! Input control adapter
//!
//! 非受控字段立即更新显示值，并对变更处理器防抖。受控字段的值由调用者拥有，
//! 因此每次变更都同步传播，只有单独接入的副作用才会被防抖。
//!
//! Uncontrolled fields update the displayed value immediately and debounce the
//! change handler. A controlled field's value is owned by the caller, so every
//! change propagates synchronously and only a separately wired side effect is
//! debounced.

use crate::callback::CallbackCell;
use crate::config::{DebounceConfig, InputConfig};
use crate::debounce::Debouncer;
use crate::timer::Scheduler;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;

/// 带防抖的输入控件
/// Debounced input control
pub struct InputAdapter<V: Clone + 'static> {
    controlled: bool,
    value: Rc<RefCell<V>>,
    on_change: CallbackCell<dyn Fn(V)>,
    side_effect: CallbackCell<dyn Fn(V)>,
    has_side_effect: Rc<Cell<bool>>,
    debouncer: Debouncer<V>,
}

impl<V: Clone + 'static> InputAdapter<V> {
    pub fn new<S, F>(scheduler: S, config: InputConfig, initial: V, on_change: F) -> Self
    where
        S: Scheduler + 'static,
        F: Fn(V) + 'static,
    {
        let on_change: Rc<dyn Fn(V)> = Rc::new(on_change);
        let on_change = CallbackCell::new(on_change);
        let noop: Rc<dyn Fn(V)> = Rc::new(|_| {});
        let side_effect = CallbackCell::new(noop);
        let has_side_effect = Rc::new(Cell::new(false));

        let controlled = config.controlled;
        let debouncer = {
            let on_change = on_change.clone();
            let side_effect = side_effect.clone();
            let has_side_effect = has_side_effect.clone();
            Debouncer::new(
                scheduler,
                DebounceConfig {
                    delay: config.delay,
                },
                move |value: V| {
                    if !controlled {
                        (on_change.current())(value.clone());
                    }
                    if has_side_effect.get() {
                        (side_effect.current())(value);
                    }
                },
            )
        };

        Self {
            controlled,
            value: Rc::new(RefCell::new(initial)),
            on_change,
            side_effect,
            has_side_effect,
            debouncer,
        }
    }

    /// 接入一个被防抖的副作用（例如搜索请求）
    /// Wire a debounced side effect (a search request, say)
    pub fn with_side_effect<F: Fn(V) + 'static>(self, side_effect: F) -> Self {
        self.set_side_effect(side_effect);
        self
    }

    pub fn set_side_effect<F: Fn(V) + 'static>(&self, side_effect: F) {
        self.side_effect.replace(Rc::new(side_effect));
        self.has_side_effect.set(true);
    }

    pub fn set_on_change<F: Fn(V) + 'static>(&self, on_change: F) {
        self.on_change.replace(Rc::new(on_change));
    }

    /// 处理一次用户输入
    /// Handle one user edit
    pub fn on_input(&self, value: V) {
        *self.value.borrow_mut() = value.clone();

        if self.controlled {
            trace!("Controlled input propagated synchronously");
            (self.on_change.current())(value.clone());
            if self.has_side_effect.get() {
                self.debouncer.schedule(value);
            }
        } else {
            self.debouncer.schedule(value);
        }
    }

    /// 由值的拥有者推送当前值（受控字段）
    /// The owner pushes its current value (controlled fields)
    pub fn sync_value(&self, value: V) {
        *self.value.borrow_mut() = value;
    }

    /// 当前显示的值
    /// Currently displayed value
    pub fn value(&self) -> V {
        self.value.borrow().clone()
    }

    pub fn is_controlled(&self) -> bool {
        self.controlled
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// 立即提交待处理的变更（例如失去焦点时）
    /// Commit the pending change now (on blur, say)
    pub fn flush(&self) -> bool {
        self.debouncer.flush()
    }

    pub fn cancel(&self) -> bool {
        self.debouncer.cancel()
    }
}
