//! 控件适配器
//! Control adapters
//!
//! 位于原始 UI 事件与防抖/节流原语之间。
//! Sit between raw UI events and a debounce or throttle primitive.

pub mod button;
pub mod input;

pub use button::{ButtonAdapter, ButtonKind, ClickDisposition};
pub use input::InputAdapter;
