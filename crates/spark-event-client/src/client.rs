//! 客户端编排层：在传输能力集合与转码引擎、回调调度内核之间居中协调。
//!
//! # 设计背景（Why）
//! - 传输层只实现自己具备的能力子集（Sender / Requester / Receiver / Responder / Opener），
//!   客户端负责把“发送一个事件”“注册一个回调”翻译成对这些能力的调用；
//! - 出站路径必须先补全、再校验，非法事件永远不会到达传输层；
//! - 每个客户端实例最多运行一个接收循环。
//!
//! # 逻辑解析（How）
//! - `send`/`request`：默认编码偏好 → 上下文装饰器 → 补全钩子 → 校验 → 编码选择（调用方未钉住编码时）→ 传输；
//! - `start_receiver`：在互斥锁内完成“检查槽位 + 校验回调 + 能力交叉检查 + 占用槽位”，随后释放锁进入循环；
//!   槽位由守卫在任何退出路径上清空；
//! - 接收循环以 `tokio::select!` 同时等待下一条消息与取消/截止信号，取消位按固定间隔轮询。
//!
//! # 契约说明（What）
//! - `start_receiver` 阻塞直到流结束（`Ok(())`）、取消（`Ok(())`）、截止到期（`DeadlineExceeded`）、
//!   传输失败（`Transport`）或回调声明失败（`Invocation`）；
//! - 存在 Opener 时，入站连接的开启在独立任务中与循环并发运行，需要在 Tokio 运行时内调用。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use spark_event::protocol::{Outcome, Protocol, ResponseWriter};
use spark_event::{
    CallContext, EncodingPreference, EncodingSelector, Event, EventError, Message,
    SelectionStrategy, StrategyMode, Transformers, to_event,
};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::ClientConfig;
use crate::defaulters::{
    ContextDecorator, EventDefaulter, default_id_to_uuid_if_not_set,
    default_time_to_now_if_not_set,
};
use crate::error::ClientError;
use crate::handler::{ReceiverFn, ReceiverHandler};
use crate::invoker::{Converter, ReceiveInvoker};

/// 接收循环轮询取消位的默认间隔。
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

type Inbound = (Message, Option<Box<dyn ResponseWriter>>);

/// 出站 span：携带事件标识与选定的线上编码。
macro_rules! outbound_span {
    ($name:literal, $ctx:expr, $event:expr) => {{
        let encoding = $ctx
            .pinned_encoding()
            .map(|encoding| encoding.codec())
            .unwrap_or_default();
        tracing::info_span!(
            $name,
            event_id = $event.id(),
            event_type = $event.event_type(),
            spec_version = $event.spec_version().as_str(),
            encoding = encoding.as_str(),
        )
    }};
}

/// `request` 的结果：传输成功时返回，响应能否解析为事件只作为附加信息。
#[derive(Debug, Default)]
pub struct RequestReply {
    /// 解析成功的响应事件。
    pub event: Option<Event>,
    /// 响应无法解析为事件时的原因；请求本身仍视为成功。
    pub response_error: Option<EventError>,
}

/// 客户端构建器，选项按声明顺序生效。
pub struct ClientBuilder {
    protocol: Arc<dyn Protocol>,
    decorators: Vec<ContextDecorator>,
    defaulters: Vec<EventDefaulter>,
    selector: Arc<dyn EncodingSelector>,
    preference: EncodingPreference,
    converter: Option<Arc<dyn Converter>>,
    inbound_transformers: Transformers,
    poll_interval: Duration,
}

impl ClientBuilder {
    pub fn new(protocol: impl Protocol + 'static) -> Self {
        Self::from_shared(Arc::new(protocol))
    }

    pub fn from_shared(protocol: Arc<dyn Protocol>) -> Self {
        Self {
            protocol,
            decorators: Vec::new(),
            defaulters: Vec::new(),
            selector: Arc::new(SelectionStrategy::default()),
            preference: EncodingPreference::Unspecified,
            converter: None,
            inbound_transformers: Transformers::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// 应用配置：默认编码偏好、带版本编码的版本集合与补全钩子。
    pub fn with_config(mut self, config: &ClientConfig) -> Result<Self, ClientError> {
        self.preference = config.encoding_preference()?;
        self.selector = Arc::new(
            SelectionStrategy::new(StrategyMode::ContextBased)
                .with_versions(config.spec_versions()?),
        );
        if config.defaults.id {
            self = self.with_uuids();
        }
        if config.defaults.time {
            self = self.with_time_now();
        }
        Ok(self)
    }

    pub fn with_context_decorator(
        mut self,
        decorator: impl Fn(&CallContext) -> CallContext + Send + Sync + 'static,
    ) -> Self {
        self.decorators.push(Arc::new(decorator));
        self
    }

    pub fn with_event_defaulter(
        mut self,
        defaulter: impl Fn(&CallContext, Event) -> Event + Send + Sync + 'static,
    ) -> Self {
        self.defaulters.push(Arc::new(defaulter));
        self
    }

    /// 为 `id` 为空的事件填入 UUID。
    pub fn with_uuids(self) -> Self {
        self.with_event_defaulter(default_id_to_uuid_if_not_set)
    }

    /// 为未设置 `time` 的事件填入当前时间。
    pub fn with_time_now(self) -> Self {
        self.with_event_defaulter(default_time_to_now_if_not_set)
    }

    pub fn with_encoding_selector(mut self, selector: impl EncodingSelector + 'static) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    /// 调用方上下文未指定偏好时使用的默认编码偏好。
    pub fn with_encoding_preference(mut self, preference: EncodingPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// 入站消息解码后执行的转换钩子。
    pub fn with_inbound_transformers(mut self, transformers: Transformers) -> Self {
        self.inbound_transformers = transformers;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> Client {
        Client {
            protocol: self.protocol,
            decorators: self.decorators,
            defaulters: self.defaulters,
            selector: self.selector,
            preference: self.preference,
            converter: self.converter,
            inbound_transformers: self.inbound_transformers,
            poll_interval: self.poll_interval,
            receiver: Mutex::new(None),
        }
    }
}

/// 事件客户端。
pub struct Client {
    protocol: Arc<dyn Protocol>,
    decorators: Vec<ContextDecorator>,
    defaulters: Vec<EventDefaulter>,
    selector: Arc<dyn EncodingSelector>,
    preference: EncodingPreference,
    converter: Option<Arc<dyn Converter>>,
    inbound_transformers: Transformers,
    poll_interval: Duration,
    receiver: Mutex<Option<Arc<ReceiveInvoker>>>,
}

impl Client {
    pub fn builder(protocol: impl Protocol + 'static) -> ClientBuilder {
        ClientBuilder::new(protocol)
    }

    /// 当前是否有接收循环在运行。
    pub fn is_receiving(&self) -> bool {
        self.receiver.lock().is_some()
    }

    /// 发送事件。事件未通过校验时传输层不会被调用。
    pub async fn send(&self, ctx: &CallContext, event: Event) -> Result<Outcome, ClientError> {
        let sender = self
            .protocol
            .sender()
            .ok_or(ClientError::MissingCapability {
                capability: "sender",
            })?;
        let (ctx, event) = self.prepare(ctx, event)?;
        let span = outbound_span!("spark_event.send", ctx, event);
        let ctx = ctx.with_span(span.clone());

        let result = sender.send(&ctx, Message::from(event)).instrument(span.clone()).await;
        let _entered = span.enter();
        match result {
            Ok(outcome) => {
                tracing::debug!(ack = outcome.is_ack(), "event sent");
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "send failed");
                Err(err.into())
            }
        }
    }

    /// 发送事件并等待响应。
    ///
    /// 响应消息在任何路径上都只 `finish` 一次；响应无法解析为事件不视为失败，
    /// 原因记录在 [`RequestReply::response_error`]。
    pub async fn request(
        &self,
        ctx: &CallContext,
        event: Event,
    ) -> Result<RequestReply, ClientError> {
        let requester = self
            .protocol
            .requester()
            .ok_or(ClientError::MissingCapability {
                capability: "requester",
            })?;
        let (ctx, event) = self.prepare(ctx, event)?;
        let span = outbound_span!("spark_event.request", ctx, event);
        let ctx = ctx.with_span(span.clone());

        let response = requester
            .request(&ctx, Message::from(event))
            .instrument(span.clone())
            .await;
        let _entered = span.enter();
        let response = response.inspect_err(|err| {
            tracing::warn!(code = err.code(), error = %err, "request failed");
        })?;

        let decoded = to_event(&response, &self.inbound_transformers);
        if let Err(err) = response.finish(None) {
            tracing::warn!(code = err.code(), error = %err, "failed to finish response");
        }
        Ok(match decoded {
            Ok((event, _)) => RequestReply {
                event: Some(event),
                response_error: None,
            },
            Err(err) => {
                tracing::debug!(code = err.code(), error = %err, "response is not an event");
                RequestReply {
                    event: None,
                    response_error: Some(err),
                }
            }
        })
    }

    /// 注册回调并运行接收循环，直到流结束、取消或出错。
    pub async fn start_receiver<H, Args>(
        &self,
        ctx: &CallContext,
        handler: H,
    ) -> Result<(), ClientError>
    where
        H: ReceiverHandler<Args>,
        Args: 'static,
    {
        let invoker = self.register(handler)?;
        let _registration = Registration {
            slot: &self.receiver,
        };

        let span = tracing::info_span!(
            "spark_event.receive",
            responder = invoker.is_responder(),
            arity = invoker.receiver().descriptor().arity(),
        );
        let ctx = ctx.with_span(span.clone());
        let _opener = self.spawn_opener(&ctx, &span);

        let result = self.poll(&ctx, &invoker).instrument(span.clone()).await;
        let _entered = span.enter();
        match &result {
            Ok(()) => tracing::info!("receiver stopped"),
            Err(err) => tracing::warn!(code = err.code(), error = %err, "receiver terminated"),
        }
        result
    }

    fn register<H, Args>(&self, handler: H) -> Result<Arc<ReceiveInvoker>, ClientError>
    where
        H: ReceiverHandler<Args>,
        Args: 'static,
    {
        let mut slot = self.receiver.lock();
        if slot.is_some() {
            return Err(ClientError::AlreadyReceiving);
        }
        let receiver = ReceiverFn::new(handler)?;
        let invoker = ReceiveInvoker::new(receiver, self.defaulters.clone())
            .with_converter(self.converter.clone())
            .with_transformers(self.inbound_transformers.clone());
        if invoker.is_responder() && self.protocol.responder().is_none() {
            return Err(ClientError::CapabilityMismatch {
                required: "responder",
            });
        }
        if invoker.is_receiver() && self.protocol.receiver().is_none() {
            return Err(ClientError::CapabilityMismatch {
                required: "receiver",
            });
        }
        let invoker = Arc::new(invoker);
        *slot = Some(Arc::clone(&invoker));
        Ok(invoker)
    }

    fn spawn_opener(&self, ctx: &CallContext, span: &tracing::Span) -> Option<AbortOnDrop> {
        self.protocol.opener()?;
        let protocol = Arc::clone(&self.protocol);
        let ctx = ctx.clone();
        let task = async move {
            if let Some(opener) = protocol.opener()
                && let Err(err) = opener.open_inbound(&ctx).await
            {
                tracing::error!(code = err.code(), error = %err, "inbound bring-up failed");
            }
        };
        Some(AbortOnDrop(tokio::spawn(task.instrument(span.clone()))))
    }

    async fn poll(&self, ctx: &CallContext, invoker: &ReceiveInvoker) -> Result<(), ClientError> {
        loop {
            let next = tokio::select! {
                biased;
                stop = self.wait_for_stop(ctx) => return stop,
                next = self.next_inbound(ctx, invoker.is_responder()) => next?,
            };
            let Some((message, writer)) = next else {
                tracing::debug!("inbound stream closed");
                return Ok(());
            };
            invoker.invoke(ctx, message, writer).await?;
        }
    }

    async fn next_inbound(
        &self,
        ctx: &CallContext,
        responder: bool,
    ) -> Result<Option<Inbound>, ClientError> {
        if responder {
            let responder = self
                .protocol
                .responder()
                .ok_or(ClientError::MissingCapability {
                    capability: "responder",
                })?;
            Ok(responder
                .respond(ctx)
                .await?
                .map(|(message, writer)| (message, Some(writer))))
        } else {
            let receiver = self
                .protocol
                .receiver()
                .ok_or(ClientError::MissingCapability {
                    capability: "receiver",
                })?;
            Ok(receiver.receive(ctx).await?.map(|message| (message, None)))
        }
    }

    async fn wait_for_stop(&self, ctx: &CallContext) -> Result<(), ClientError> {
        loop {
            if ctx.cancellation().is_cancelled() {
                tracing::debug!("receiver cancelled");
                return Ok(());
            }
            let deadline = ctx.deadline();
            if deadline.is_expired() {
                return Err(ClientError::DeadlineExceeded);
            }
            let pause = deadline
                .remaining()
                .map_or(self.poll_interval, |left| left.min(self.poll_interval));
            tokio::time::sleep(pause).await;
        }
    }

    fn prepare(&self, ctx: &CallContext, event: Event) -> Result<(CallContext, Event), ClientError> {
        let mut ctx = if ctx.encoding_preference() == EncodingPreference::Unspecified
            && self.preference != EncodingPreference::Unspecified
        {
            ctx.with_encoding_preference(self.preference)
        } else {
            ctx.clone()
        };
        for decorator in &self.decorators {
            ctx = decorator(&ctx);
        }

        let event = self
            .defaulters
            .iter()
            .fold(event, |event, defaulter| defaulter(&ctx, event));
        event.validate()?;

        if ctx.pinned_encoding().is_none() {
            let encoding = self.selector.select(&ctx, &event);
            ctx = ctx.with_pinned_encoding(encoding);
        }
        Ok((ctx, event))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("decorators", &self.decorators.len())
            .field("defaulters", &self.defaulters.len())
            .field("preference", &self.preference)
            .field("receiving", &self.is_receiving())
            .finish_non_exhaustive()
    }
}

/// 接收槽位守卫：任何退出路径上都清空已注册的回调。
struct Registration<'a> {
    slot: &'a Mutex<Option<Arc<ReceiveInvoker>>>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// 循环退出时中止 Opener 任务。
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
