//! spark-event：多版本事件信封模型与传输无关的绑定层。
//!
//! # 设计背景（Why）
//! - 事件需要跨越 HTTP、消息总线、日志流等异构传输，且语义不能发生变化；
//! - 真正的难点在绑定层：一条“可能是事件、也可能不是”的传输消息，如何在规范事件、结构化编码与
//!   二进制编码之间无损往返，同时兼容属性集合与命名各不相同的多个规范版本。
//!
//! # 模块地图（What）
//! - [`version`] / [`context`]：版本矩阵，逐级转换与结构校验；
//! - [`attribute`]：按版本索引的属性规格表，驱动二进制编解码；
//! - [`event`] / [`format`]：规范事件与结构化 JSON 格式；
//! - [`binding`]：消息抽象、转码引擎、转换钩子与编码选择；
//! - [`contract`]：请求级调用上下文（取消、截止、传输元数据、编码偏好、日志句柄）；
//! - [`protocol`]：传输能力契约。

pub mod attribute;
pub mod binding;
pub mod context;
pub mod contract;
pub mod error;
pub mod event;
pub mod format;
pub mod protocol;
pub mod types;
pub mod version;

pub use attribute::{Attribute, AttributeKind, VersionSpec};
pub use binding::Encoding;
pub use binding::message::{EventMessage, Message, TracedMessage, TransportMessage};
pub use binding::selection::{EncodingSelector, SelectionStrategy, StrategyMode, WireEncoding};
pub use binding::to_event::to_event;
pub use binding::transformer::{Transformer, Transformers};
pub use context::EventContext;
pub use contract::{
    CallContext, CallContextBuilder, Cancellation, Deadline, EncodingPreference, TransportContext,
};
pub use error::{EventError, ValidationError, Violation};
pub use event::Event;
pub use format::{Format, JSON, JsonFormat};
pub use protocol::{Outcome, Protocol, TransportError};
pub use types::{ExtensionValue, UriRef};
pub use version::SpecVersion;
