//! 事件补全钩子与出站上下文装饰器。
//!
//! 补全钩子按注册顺序作用于出站事件（以及接收循环中的入站事件），只填补缺失的字段。

use std::sync::Arc;

use chrono::Utc;
use spark_event::{CallContext, Event};
use uuid::Uuid;

/// 事件补全钩子：可以改写事件，但不能失败。
pub type EventDefaulter = Arc<dyn Fn(&CallContext, Event) -> Event + Send + Sync>;

/// 出站上下文装饰器：纯函数，按注册顺序应用。
pub type ContextDecorator = Arc<dyn Fn(&CallContext) -> CallContext + Send + Sync>;

/// `id` 为空时填入随机 UUIDv4。
pub fn default_id_to_uuid_if_not_set(_ctx: &CallContext, mut event: Event) -> Event {
    if event.id().trim().is_empty() {
        event.set_id(Uuid::new_v4().to_string());
    }
    event
}

/// `time` 未设置时填入当前时间。
pub fn default_time_to_now_if_not_set(_ctx: &CallContext, mut event: Event) -> Event {
    if event.time().is_none() {
        event.set_time(Some(Utc::now()));
    }
    event
}
