//! 接收循环的逐消息流水线。
//!
//! # 设计背景（Why）
//! - 每条入站消息都要经历“解码 → 补全 → 校验 → 调用回调 → 回应/确认”，且无论走哪条分支，
//!   消息都必须被 `finish` 恰好一次；
//! - 能否继续循环取决于失败的性质：消息本身的问题（无法解码、校验失败、数据解码失败）只拒绝这条消息，
//!   回调声明的失败则终止循环。
//!
//! # 逻辑解析（How）
//! 1. 以追踪 span 包装消息，`finish` 的结果由 [`spark_event::TracedMessage`] 统一记录；
//! 2. `to_event` 失败时先交给可选的 [`Converter`]，仍失败则拒绝消息；
//! 3. 按注册顺序执行补全钩子，再做版本校验；
//! 4. 调用回调；响应型回调把响应槽中的事件交给传输层的回应通道。

use std::sync::Arc;

use spark_event::binding::message::FinishCause;
use spark_event::protocol::{ResponseWriter, TransportError};
use spark_event::{CallContext, Event, EventError, Message, Transformers, to_event};
use tracing::Instrument;

use crate::defaulters::EventDefaulter;
use crate::error::ClientError;
use crate::handler::{InvokeError, ReceiverFn, ResponseSlot};

/// 为 `to_event` 无法识别的消息提供兜底转换。
pub trait Converter: Send + Sync {
    /// 是否愿意处理该消息。
    fn accepts(&self, ctx: &CallContext, message: &Message) -> bool;

    /// 把消息转换为事件；`cause` 为 `to_event` 报告的原始错误。
    fn convert(
        &self,
        ctx: &CallContext,
        message: &Message,
        cause: &EventError,
    ) -> Result<Event, EventError>;
}

/// 单个回调的逐消息调度器。
#[derive(Clone)]
pub struct ReceiveInvoker {
    receiver: ReceiverFn,
    defaulters: Vec<EventDefaulter>,
    converter: Option<Arc<dyn Converter>>,
    transformers: Transformers,
}

impl ReceiveInvoker {
    pub fn new(receiver: ReceiverFn, defaulters: Vec<EventDefaulter>) -> Self {
        Self {
            receiver,
            defaulters,
            converter: None,
            transformers: Transformers::new(),
        }
    }

    pub fn with_converter(mut self, converter: Option<Arc<dyn Converter>>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_transformers(mut self, transformers: Transformers) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn receiver(&self) -> &ReceiverFn {
        &self.receiver
    }

    pub fn is_responder(&self) -> bool {
        self.receiver.descriptor().is_responder()
    }

    pub fn is_receiver(&self) -> bool {
        self.receiver.descriptor().is_receiver()
    }

    /// 处理一条入站消息。
    ///
    /// 返回 `Err` 仅当回调声明失败，此时消息已被拒绝；其余失败只拒绝该消息并返回 `Ok(())`。
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        message: Message,
        writer: Option<Box<dyn ResponseWriter>>,
    ) -> Result<(), ClientError> {
        let span = tracing::debug_span!("spark_event.invoke", encoding = %message.encoding());
        let message = message.traced(span.clone());
        self.invoke_traced(ctx, message, writer).instrument(span).await
    }

    async fn invoke_traced(
        &self,
        ctx: &CallContext,
        message: Message,
        writer: Option<Box<dyn ResponseWriter>>,
    ) -> Result<(), ClientError> {
        let event = match self.decode(ctx, &message) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(code = err.code(), error = %err, "dropping undecodable message");
                settle(ctx, message, writer, None, Some(&err)).await;
                return Ok(());
            }
        };

        let event = self
            .defaulters
            .iter()
            .fold(event, |event, defaulter| defaulter(ctx, event));

        if let Err(err) = event.validate() {
            tracing::warn!(event.id = event.id(), error = %err, "received invalid event");
            settle(ctx, message, writer, None, Some(&err)).await;
            return Ok(());
        }

        let slot = ResponseSlot::new();
        match self.receiver.invoke(ctx, &event, &slot).await {
            Ok(()) => {
                settle(ctx, message, writer, slot.take(), None).await;
                Ok(())
            }
            Err(InvokeError::Data(err)) => {
                tracing::warn!(event.id = event.id(), error = %err, "failed to decode event data");
                settle(ctx, message, writer, None, Some(&err)).await;
                Ok(())
            }
            Err(InvokeError::Callback(err)) => {
                settle(ctx, message, writer, None, Some(&*err)).await;
                Err(ClientError::Invocation(err))
            }
        }
    }

    fn decode(&self, ctx: &CallContext, message: &Message) -> Result<Event, EventError> {
        match to_event(message, &self.transformers) {
            Ok((event, _)) => Ok(event),
            Err(err) => match &self.converter {
                Some(converter) if converter.accepts(ctx, message) => {
                    converter.convert(ctx, message, &err)
                }
                _ => Err(err),
            },
        }
    }
}

impl std::fmt::Debug for ReceiveInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveInvoker")
            .field("receiver", &self.receiver)
            .field("defaulters", &self.defaulters.len())
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

/// 回应并确认消息；传输层失败只记录日志。
async fn settle(
    ctx: &CallContext,
    message: Message,
    writer: Option<Box<dyn ResponseWriter>>,
    response: Option<Event>,
    error: Option<&FinishCause>,
) {
    if let Some(writer) = writer {
        let response = response.map(Message::from);
        if let Err(err) = writer.respond(ctx, response, error).await {
            log_transport_failure("respond", &err);
        }
    }
    if let Err(err) = message.finish(error) {
        log_transport_failure("finish", &err);
    }
}

fn log_transport_failure(step: &'static str, err: &TransportError) {
    tracing::warn!(step, code = err.code(), error = %err, "failed to settle inbound message");
}
