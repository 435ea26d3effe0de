//! 传输能力契约：Sender / Requester / Receiver / Responder / Opener。
//!
//! # 设计背景（Why）
//! - 具体传输（HTTP、消息总线、日志流、托管发布订阅）只需要实现自己具备的能力子集；
//! - 客户端编排层通过 [`Protocol`] 的能力查询决定可用操作，并在注册接收回调时交叉校验能力是否匹配。
//!
//! # 契约说明（What）
//! - 所有方法接收 [`CallContext`]，实现方应在阻塞等待时观察其取消位与截止时间；
//! - [`Receiver::receive`] / [`Responder::respond`] 返回 `Ok(None)` 表示流已正常结束；
//! - [`ResponseWriter`] 以 `Box<Self>` 消耗自身，每条入站消息只能回应一次。

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use async_trait::async_trait;

use crate::binding::message::{FinishCause, Message};
use crate::contract::CallContext;

/// 传输错误码。
pub mod codes {
    pub const SEND: &str = "transport.send";
    pub const REQUEST: &str = "transport.request";
    pub const RECEIVE: &str = "transport.receive";
    pub const RESPOND: &str = "transport.respond";
    pub const OPEN: &str = "transport.open";
    pub const FINISH: &str = "transport.finish";
    pub const CLOSED: &str = "transport.closed";
}

/// 传输层的终态失败。
///
/// # 教案式说明
/// - **意图 (Why)**：编排层只转述传输错误，不重新解释其语义，因此错误必须自带稳定错误码；
/// - **契约 (What)**：`code` 遵循 `<域>.<语义>` 约定；`cause` 保留底层错误，经 `source()` 暴露；
/// - **风险 (Trade-offs)**：`cause` 为 trait 对象，错误不可克隆，需要共享时由调用方自行包装。
#[derive(Debug)]
pub struct TransportError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Box<FinishCause>>,
}

impl TransportError {
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn Error + 'static))
    }
}

/// 发送结果：对端确认或拒绝。传输失败通过 `Err(TransportError)` 表达。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    Nack { reason: String },
}

impl Outcome {
    pub fn is_ack(&self) -> bool {
        matches!(self, Outcome::Ack)
    }
}

#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, ctx: &CallContext, message: Message) -> Result<Outcome, TransportError>;
}

#[async_trait]
pub trait Requester: Send + Sync {
    /// 发送并等待响应消息；响应归调用方独占，调用方负责 `finish`。
    async fn request(&self, ctx: &CallContext, message: Message) -> Result<Message, TransportError>;
}

#[async_trait]
pub trait Receiver: Send + Sync {
    async fn receive(&self, ctx: &CallContext) -> Result<Option<Message>, TransportError>;
}

/// 对单条入站消息的回应通道。
#[async_trait]
pub trait ResponseWriter: Send {
    /// 回应入站消息：`response` 为可选的响应消息，`error` 非空时表示处理失败（拒绝）。
    async fn respond(
        self: Box<Self>,
        ctx: &CallContext,
        response: Option<Message>,
        error: Option<&FinishCause>,
    ) -> Result<(), TransportError>;
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(
        &self,
        ctx: &CallContext,
    ) -> Result<Option<(Message, Box<dyn ResponseWriter>)>, TransportError>;
}

/// 需要单独“开启入站连接”步骤的传输实现该能力，例如先启动监听再开始轮询。
#[async_trait]
pub trait Opener: Send + Sync {
    async fn open_inbound(&self, ctx: &CallContext) -> Result<(), TransportError>;
}

/// 传输的能力集合，未实现的能力返回 `None`。
pub trait Protocol: Send + Sync {
    fn sender(&self) -> Option<&dyn Sender> {
        None
    }

    fn requester(&self) -> Option<&dyn Requester> {
        None
    }

    fn receiver(&self) -> Option<&dyn Receiver> {
        None
    }

    fn responder(&self) -> Option<&dyn Responder> {
        None
    }

    fn opener(&self) -> Option<&dyn Opener> {
        None
    }
}
