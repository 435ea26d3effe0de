//! 绑定层：传输无关的消息抽象与转码引擎。
//!
//! # 模块地图
//! - [`message`]：封闭的消息链 {传输消息, 已解码事件, 带追踪的消息} 与读写能力 trait；
//! - [`to_event`]：消息 → 事件（沿包装链寻找已解码事件，否则按结构化/二进制表示解码）；
//! - [`direct`]：事件 → 写入器，以及“任意消息 → 目标编码”的通用写入流程；
//! - [`transformer`]：转码完成后的事件级/结构化负载级钩子链；
//! - [`buffered`]：以头部表 + 负载承载消息的参考实现，遵循 `ce-` 前缀的二进制线上约定；
//! - [`selection`]：出站编码选择策略与带版本的线上编码标签。

pub mod buffered;
pub mod direct;
pub mod message;
pub mod selection;
pub mod to_event;
pub mod transformer;

use std::fmt;

/// 消息当前的表示形态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// 整个事件是一段带内容类型的不透明负载。
    Structured,
    /// 属性分散在传输元数据中，负载原样携带。
    Binary,
    /// 消息内部已经持有解码完成的事件。
    Event,
    /// 批量结构化负载；本库只识别，不解码。
    Batched,
    /// 无法识别的表示。
    Unknown,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Structured => "structured",
            Encoding::Binary => "binary",
            Encoding::Event => "event",
            Encoding::Batched => "batched",
            Encoding::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
