//! spark-event-client：接收回调调度内核与客户端编排层。
//!
//! # 设计背景（Why）
//! - 用户以普通异步函数注册接收回调，回调形态只在注册时校验一次，之后每条消息只做参数装配；
//! - 客户端在传输能力集合与转码引擎之间居中协调，负责出站补全与校验、入站解码与确认。
//!
//! # 模块地图（What）
//! - [`signature`]：回调形态描述与一次性校验，产出调度描述符；
//! - [`handler`]：类型化参数提取与 0–5 参数的回调适配；
//! - [`invoker`]：接收循环的逐消息流水线（解码、补全、校验、调用、回应）；
//! - [`client`]：`send` / `request` / `start_receiver` 编排；
//! - [`defaulters`] / [`config`] / [`observability`]：补全钩子、TOML 配置与日志安装。

pub mod client;
pub mod config;
pub mod defaulters;
pub mod error;
pub mod handler;
pub mod invoker;
pub mod observability;
pub mod signature;

pub use client::{Client, ClientBuilder, DEFAULT_POLL_INTERVAL, RequestReply};
pub use config::ClientConfig;
pub use defaulters::{
    ContextDecorator, EventDefaulter, default_id_to_uuid_if_not_set,
    default_time_to_now_if_not_set,
};
pub use error::{BoxError, ClientError, SignatureError};
pub use handler::{Data, InvokeError, ReceiverFn, ReceiverHandler, ResponseSlot};
pub use invoker::{Converter, ReceiveInvoker};
pub use observability::{InstallError, install_tracing};
pub use signature::{Descriptor, ParamKind, ParamType, ReturnType, Signature};
