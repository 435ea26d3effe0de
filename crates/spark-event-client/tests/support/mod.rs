//! 客户端集成测试共享的模拟传输。
//!
//! - 能力集合可按需裁剪，每次能力调用都会记录在 `calls` 中；
//! - 入站消息经无界通道投递，发送端全部释放即视为流结束；
//! - [`SettlementMessage`] 记录自身被确认/拒绝的情况，用于断言“每条消息恰好 finish 一次”。

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use spark_event::binding::buffered::BufferedMessage;
use spark_event::binding::message::{
    BinaryWriter, FinishCause, MessageReader, StructuredWriter,
};
use spark_event::protocol::{
    Opener, Outcome, Protocol, Receiver, Requester, Responder, ResponseWriter, Sender,
    TransportError,
};
use spark_event::{
    CallContext, Encoding, EncodingPreference, Event, EventError, Message, SpecVersion,
    TransportMessage, Transformers, WireEncoding, to_event,
};
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, Default)]
pub struct Capabilities {
    pub sender: bool,
    pub requester: bool,
    pub receiver: bool,
    pub responder: bool,
    pub opener: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            sender: true,
            requester: true,
            receiver: true,
            responder: true,
            opener: true,
        }
    }

    pub fn receiver_only() -> Self {
        Self {
            receiver: true,
            ..Self::default()
        }
    }
}

/// 一条入站消息的最终处置。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    Acked,
    Nacked(String),
}

/// 记录 finish 结果的传输消息。
#[derive(Debug)]
pub struct SettlementMessage {
    inner: BufferedMessage,
    settlements: Arc<Mutex<Vec<Settlement>>>,
}

impl MessageReader for SettlementMessage {
    fn encoding(&self) -> Encoding {
        self.inner.encoding()
    }

    fn read_structured(&self, writer: &mut dyn StructuredWriter) -> Result<(), EventError> {
        self.inner.read_structured(writer)
    }

    fn read_binary(&self, writer: &mut dyn BinaryWriter) -> Result<(), EventError> {
        self.inner.read_binary(writer)
    }
}

impl TransportMessage for SettlementMessage {
    fn finish(self: Box<Self>, error: Option<&FinishCause>) -> Result<(), TransportError> {
        self.settlements.lock().push(match error {
            Some(cause) => Settlement::Nacked(cause.to_string()),
            None => Settlement::Acked,
        });
        Ok(())
    }
}

/// 回应通道收到的内容：响应事件类型 + 拒绝原因。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub response_type: Option<String>,
    pub error: Option<String>,
}

struct MockWriter {
    replies: Arc<Mutex<Vec<Reply>>>,
}

#[async_trait]
impl ResponseWriter for MockWriter {
    async fn respond(
        self: Box<Self>,
        _ctx: &CallContext,
        response: Option<Message>,
        error: Option<&FinishCause>,
    ) -> Result<(), TransportError> {
        let response_type = response
            .as_ref()
            .and_then(Message::find_event)
            .map(|event| event.event_type().to_owned());
        self.replies.lock().push(Reply {
            response_type,
            error: error.map(ToString::to_string),
        });
        Ok(())
    }
}

pub struct MockTransport {
    caps: Capabilities,
    calls: Mutex<Vec<&'static str>>,
    sent: Mutex<Vec<(Option<WireEncoding>, EncodingPreference, Event)>>,
    settlements: Arc<Mutex<Vec<Settlement>>>,
    replies: Arc<Mutex<Vec<Reply>>>,
    request_reply: Mutex<Option<BufferedMessage>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<BufferedMessage>>,
}

impl MockTransport {
    pub fn new(caps: Capabilities) -> (Arc<Self>, mpsc::UnboundedSender<BufferedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            caps,
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            settlements: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(Vec::new())),
            request_reply: Mutex::new(None),
            inbound: tokio::sync::Mutex::new(rx),
        });
        (transport, tx)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn sent(&self) -> Vec<(Option<WireEncoding>, EncodingPreference, Event)> {
        self.sent.lock().clone()
    }

    pub fn settlements(&self) -> Vec<Settlement> {
        self.settlements.lock().clone()
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().clone()
    }

    pub fn set_request_reply(&self, reply: BufferedMessage) {
        *self.request_reply.lock() = Some(reply);
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    fn settling(&self, inner: BufferedMessage) -> Message {
        Message::from_transport(SettlementMessage {
            inner,
            settlements: Arc::clone(&self.settlements),
        })
    }

    async fn next(&self) -> Option<Message> {
        let next = self.inbound.lock().await.recv().await;
        next.map(|inner| self.settling(inner))
    }
}

/// 以二进制编码构造入站消息。
pub fn binary(event: &Event) -> BufferedMessage {
    BufferedMessage::encode(
        &Message::from(event.clone()),
        EncodingPreference::Binary,
        &Transformers::new(),
    )
    .expect("二进制编码")
}

pub fn valid_event(id: &str) -> Event {
    let mut event = Event::new(SpecVersion::V10);
    event.set_id(id);
    event.set_type("com.example.test");
    event.set_source("/tests");
    event
}

impl Protocol for MockTransport {
    fn sender(&self) -> Option<&dyn Sender> {
        self.caps.sender.then_some(self as &dyn Sender)
    }

    fn requester(&self) -> Option<&dyn Requester> {
        self.caps.requester.then_some(self as &dyn Requester)
    }

    fn receiver(&self) -> Option<&dyn Receiver> {
        self.caps.receiver.then_some(self as &dyn Receiver)
    }

    fn responder(&self) -> Option<&dyn Responder> {
        self.caps.responder.then_some(self as &dyn Responder)
    }

    fn opener(&self) -> Option<&dyn Opener> {
        self.caps.opener.then_some(self as &dyn Opener)
    }
}

#[async_trait]
impl Sender for MockTransport {
    async fn send(&self, ctx: &CallContext, message: Message) -> Result<Outcome, TransportError> {
        self.record("send");
        let (event, _) = to_event(&message, &Transformers::new())
            .map_err(|err| TransportError::new("transport.send", err.to_string()))?;
        self.sent
            .lock()
            .push((ctx.pinned_encoding(), ctx.encoding_preference(), event));
        Ok(Outcome::Ack)
    }
}

#[async_trait]
impl Requester for MockTransport {
    async fn request(&self, _ctx: &CallContext, _message: Message) -> Result<Message, TransportError> {
        self.record("request");
        let reply = self
            .request_reply
            .lock()
            .take()
            .ok_or_else(|| TransportError::new("transport.request", "no reply configured"))?;
        Ok(self.settling(reply))
    }
}

#[async_trait]
impl Receiver for MockTransport {
    async fn receive(&self, _ctx: &CallContext) -> Result<Option<Message>, TransportError> {
        self.record("receive");
        Ok(self.next().await)
    }
}

#[async_trait]
impl Responder for MockTransport {
    async fn respond(
        &self,
        _ctx: &CallContext,
    ) -> Result<Option<(Message, Box<dyn ResponseWriter>)>, TransportError> {
        self.record("respond");
        Ok(self.next().await.map(|message| {
            let writer: Box<dyn ResponseWriter> = Box::new(MockWriter {
                replies: Arc::clone(&self.replies),
            });
            (message, writer)
        }))
    }
}

#[async_trait]
impl Opener for MockTransport {
    async fn open_inbound(&self, _ctx: &CallContext) -> Result<(), TransportError> {
        self.record("open");
        std::future::pending::<()>().await;
        Ok(())
    }
}
