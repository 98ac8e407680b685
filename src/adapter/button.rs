//! 按钮控件适配器
//! Button control adapter
//!
//! Clicks on plain, enabled buttons go through a throttler. Submit buttons are
//! never throttled so a submit is never silently dropped, and disabled buttons
//! pass clicks straight to the handler without keeping any throttle state.

use crate::callback::CallbackCell;
use crate::config::ButtonConfig;
use crate::error::Result;
use crate::throttle::{Invocation, Throttler};
use crate::timer::Scheduler;
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// 按钮类型
/// Button kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonKind {
    #[default]
    Button,
    /// 表单提交按钮
    /// Form submission trigger
    Submit,
}

/// 一次点击的去向
/// Where a click went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDisposition {
    /// 未经节流直接交给处理器
    /// Handed to the handler without throttling
    PassedThrough,
    /// 经过节流器
    /// Went through the throttler
    Throttled(Invocation),
}

/// 带节流的按钮
/// Throttled button
pub struct ButtonAdapter<E: 'static> {
    kind: Cell<ButtonKind>,
    disabled: Cell<bool>,
    handler: CallbackCell<dyn Fn(E)>,
    throttler: Throttler<E>,
}

impl<E: 'static> ButtonAdapter<E> {
    pub fn new<S, F>(scheduler: S, config: ButtonConfig, handler: F) -> Result<Self>
    where
        S: Scheduler + 'static,
        F: Fn(E) + 'static,
    {
        let handler: Rc<dyn Fn(E)> = Rc::new(handler);
        let handler = CallbackCell::new(handler);

        let throttled = handler.clone();
        let throttler = Throttler::new(scheduler, config.throttle, move |event: E| {
            (throttled.current())(event)
        })?;

        Ok(Self {
            kind: Cell::new(config.kind),
            disabled: Cell::new(config.disabled),
            handler,
            throttler,
        })
    }

    pub fn click(&self, event: E) -> ClickDisposition {
        if self.disabled.get() || self.kind.get() == ButtonKind::Submit {
            (self.handler.current())(event);
            return ClickDisposition::PassedThrough;
        }
        ClickDisposition::Throttled(self.throttler.invoke(event))
    }

    /// 禁用时丢弃待执行的节流点击
    /// Disabling drops any pending throttled click
    pub fn set_disabled(&self, disabled: bool) {
        if disabled && !self.disabled.get() {
            self.throttler.reset();
            debug!("Button disabled, throttle state cleared");
        }
        self.disabled.set(disabled);
    }

    pub fn set_kind(&self, kind: ButtonKind) {
        if kind == ButtonKind::Submit {
            self.throttler.reset();
        }
        self.kind.set(kind);
    }

    pub fn set_handler<F: Fn(E) + 'static>(&self, handler: F) {
        self.handler.replace(Rc::new(handler));
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.get()
    }

    pub fn kind(&self) -> ButtonKind {
        self.kind.get()
    }

    pub fn is_pending(&self) -> bool {
        self.throttler.is_pending()
    }
}
