//! 消息抽象：传输无关的信封与包装链。
//!
//! # 设计背景（Why）
//! - 传输层需要在不重新编码的前提下给消息附加自身的上下文（例如请求头、追踪 span），
//!   因此消息可以包装另一条消息；
//! - 消费方沿包装链寻找自己需要的能力（例如已解码的事件），而不是对具体类型做向下转型。
//!
//! # 契约说明（What）
//! - [`Message`] 是封闭枚举：[`Message::Transport`]（传输层原始消息）、[`Message::Event`]（已解码事件）、
//!   [`Message::Traced`]（附带追踪 span 的包装）；
//! - 包装者独占被包装的消息，[`Message::wrapped`] 每次只解开一层；
//! - [`Message::finish`] 消耗消息本身，天然保证每条消息只被确认一次。

use std::error::Error;
use std::fmt;

use bytes::Bytes;

use super::Encoding;
use super::direct::{write_binary, write_structured};
use crate::attribute::Attribute;
use crate::contract::TransportContext;
use crate::error::EventError;
use crate::event::Event;
use crate::format::{Format, JSON};
use crate::protocol::TransportError;
use crate::types::ExtensionValue;

/// `finish` 携带的失败原因。
pub type FinishCause = dyn Error + Send + Sync + 'static;

/// 结构化表示的写入端。
pub trait StructuredWriter {
    /// 写入整段结构化负载。
    fn set_structured_event(
        &mut self,
        format: &'static dyn Format,
        body: Bytes,
    ) -> Result<(), EventError>;
}

/// 二进制表示的写入端。
///
/// # 契约说明（What）
/// - 读取方必须先写入版本属性，再写入其他属性：版本属性可能把目标上下文切换到另一个版本的结构；
/// - 其余属性、扩展与负载的写入顺序不做要求。
pub trait BinaryWriter {
    fn start(&mut self) -> Result<(), EventError> {
        Ok(())
    }

    /// 写入标准属性；`None` 表示清除。
    fn set_attribute(
        &mut self,
        attribute: &'static Attribute,
        value: Option<&str>,
    ) -> Result<(), EventError>;

    fn set_extension(&mut self, name: &str, value: &ExtensionValue) -> Result<(), EventError>;

    fn set_data(&mut self, data: Bytes) -> Result<(), EventError>;

    fn end(&mut self) -> Result<(), EventError> {
        Ok(())
    }
}

/// 消息的读取能力：报告自身表示，并把内容写入对应的写入端。
pub trait MessageReader: Send + Sync {
    fn encoding(&self) -> Encoding;

    fn read_structured(&self, writer: &mut dyn StructuredWriter) -> Result<(), EventError>;

    fn read_binary(&self, writer: &mut dyn BinaryWriter) -> Result<(), EventError>;
}

/// 传输层消息需要实现的能力集合。
///
/// - `wrapped`：若传输消息包装了另一条消息，返回内层消息；
/// - `transport_context`：入站消息的传输层上下文；
/// - `finish`：执行传输层确认（`error` 为 `None` 时确认成功，否则拒绝）。
pub trait TransportMessage: MessageReader + fmt::Debug {
    fn wrapped(&self) -> Option<&Message> {
        None
    }

    fn transport_context(&self) -> Option<TransportContext> {
        None
    }

    fn finish(self: Box<Self>, error: Option<&FinishCause>) -> Result<(), TransportError>;
}

/// 已解码事件形态的消息，可选地包装产生它的原始消息。
#[derive(Debug)]
pub struct EventMessage {
    event: Event,
    inner: Option<Box<Message>>,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self { event, inner: None }
    }

    /// 包装原始消息：`finish` 会继续转交给被包装者。
    pub fn wrapping(event: Event, inner: Message) -> Self {
        Self {
            event,
            inner: Some(Box::new(inner)),
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }
}

/// 附带追踪 span 的包装消息；`finish` 的结果记录在该 span 下。
#[derive(Debug)]
pub struct TracedMessage {
    span: tracing::Span,
    inner: Box<Message>,
}

impl TracedMessage {
    pub fn new(span: tracing::Span, inner: Message) -> Self {
        Self {
            span,
            inner: Box::new(inner),
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// 传输无关的消息。
#[derive(Debug)]
pub enum Message {
    Event(EventMessage),
    Transport(Box<dyn TransportMessage>),
    Traced(TracedMessage),
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(EventMessage::new(event))
    }
}

impl Message {
    pub fn from_transport(message: impl TransportMessage + 'static) -> Self {
        Message::Transport(Box::new(message))
    }

    /// 以追踪 span 包装当前消息。
    pub fn traced(self, span: tracing::Span) -> Self {
        Message::Traced(TracedMessage::new(span, self))
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Message::Event(_) => Encoding::Event,
            Message::Transport(inner) => inner.encoding(),
            Message::Traced(traced) => traced.inner.encoding(),
        }
    }

    /// 把结构化表示写入 `writer`；事件形态的消息以 JSON 格式直接编码。
    pub fn read_structured(&self, writer: &mut dyn StructuredWriter) -> Result<(), EventError> {
        match self {
            Message::Event(message) => write_structured(&message.event, &JSON, writer),
            Message::Transport(inner) => inner.read_structured(writer),
            Message::Traced(traced) => traced.inner.read_structured(writer),
        }
    }

    /// 把二进制表示写入 `writer`；事件形态的消息按属性表逐项写出。
    pub fn read_binary(&self, writer: &mut dyn BinaryWriter) -> Result<(), EventError> {
        match self {
            Message::Event(message) => write_binary(&message.event, writer),
            Message::Transport(inner) => inner.read_binary(writer),
            Message::Traced(traced) => traced.inner.read_binary(writer),
        }
    }

    /// 解开一层包装。
    pub fn wrapped(&self) -> Option<&Message> {
        match self {
            Message::Event(message) => message.inner.as_deref(),
            Message::Transport(inner) => inner.wrapped(),
            Message::Traced(traced) => Some(&*traced.inner),
        }
    }

    /// 沿包装链寻找已解码的事件，步数不超过链长。
    pub fn find_event(&self) -> Option<&Event> {
        let mut current = Some(self);
        while let Some(message) = current {
            if let Message::Event(inner) = message {
                return Some(&inner.event);
            }
            current = message.wrapped();
        }
        None
    }

    /// 沿包装链寻找传输层上下文。
    pub fn transport_context(&self) -> Option<TransportContext> {
        let mut current = Some(self);
        while let Some(message) = current {
            if let Message::Transport(inner) = message {
                if let Some(transport) = inner.transport_context() {
                    return Some(transport);
                }
            }
            current = message.wrapped();
        }
        None
    }

    /// 执行传输层确认并释放消息。
    pub fn finish(self, error: Option<&FinishCause>) -> Result<(), TransportError> {
        match self {
            Message::Event(message) => match message.inner {
                Some(inner) => (*inner).finish(error),
                None => Ok(()),
            },
            Message::Transport(inner) => inner.finish(error),
            Message::Traced(traced) => {
                let _entered = traced.span.enter();
                let result = (*traced.inner).finish(error);
                match (&result, error) {
                    (Err(err), _) => tracing::warn!(code = err.code(), error = %err, "finish failed"),
                    (Ok(()), Some(cause)) => tracing::debug!(error = %cause, "message nacked"),
                    (Ok(()), None) => tracing::debug!("message acked"),
                }
                result
            }
        }
    }
}
