//! 调用上下文契约：取消、截止时间与请求级元数据。
//!
//! # 设计背景（Why）
//! - 发送、请求与接收循环都是可能长时间阻塞的操作，必须能被外部打断；
//! - 传输层元数据、编码偏好与日志句柄需要沿调用链传递。若放在“按不透明键取值”的环境容器里，
//!   键冲突与类型断言失败都只能在运行期发现。这里改为显式的请求级结构体，每个字段都有确定类型。
//!
//! # 契约说明（What）
//! - [`CallContext`] 内部以 `Arc` 共享，克隆成本为一次引用计数；
//! - `with_*` 系列方法返回修改后的新上下文，原上下文保持不变，可作为纯函数式的“上下文装饰器”；
//! - [`Cancellation`] 的子令牌与父令牌共享同一原子位，任一处取消全局可见。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::binding::selection::WireEncoding;

/// 取消原语，统一表达跨模块的可中断性契约。
///
/// # 逻辑解析（How）
/// - 内部使用 [`AtomicBool`] 表达取消状态，并通过 [`Arc`] 支持多方共享；
/// - `cancel` 在首次成功设置取消位时返回 `true`，重复调用返回 `false`；
/// - `child` 生成共享同一原子位的派生实例，便于在接收循环、开启任务之间传播取消信号。
///
/// # 设计取舍与风险（Trade-offs）
/// - 未提供回调注册接口，等待方以轮询方式观察取消位（见客户端接收循环的轮询间隔）。
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// 创建处于“未取消”状态的取消令牌。
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询当前是否已被标记取消。
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 将当前令牌标记为取消；返回 `true` 表示本次调用首次触发取消。
    pub fn cancel(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 派生共享同一原子位的子令牌。
    pub fn child(&self) -> Self {
        self.clone()
    }
}

/// 截止原语，描述操作的最迟完成时间（单调时钟）。
///
/// - 未设置时代表调用方未施加硬超时；
/// - 截止时间不会自动驱动取消，等待方需自行比较并决定返回何种错误。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline {
    instant: Option<Instant>,
}

impl Deadline {
    pub const fn none() -> Self {
        Self { instant: None }
    }

    pub fn at(instant: Instant) -> Self {
        Self {
            instant: Some(instant),
        }
    }

    /// 基于当前时间点加持续时间生成截止时间。
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn instant(&self) -> Option<Instant> {
        self.instant
    }

    /// 距离截止还剩多久；未设置时返回 `None`，已过期时返回零。
    pub fn remaining(&self) -> Option<Duration> {
        self.instant
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.instant.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// 出站编码偏好。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EncodingPreference {
    /// 未指定，编码选择策略按二进制处理。
    #[default]
    Unspecified,
    Binary,
    Structured,
}

impl EncodingPreference {
    /// 解析配置字符串（大小写不敏感）；未知取值返回 `None`。
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "unspecified" => Some(EncodingPreference::Unspecified),
            "binary" => Some(EncodingPreference::Binary),
            "structured" => Some(EncodingPreference::Structured),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EncodingPreference::Unspecified => "unspecified",
            EncodingPreference::Binary => "binary",
            EncodingPreference::Structured => "structured",
        }
    }
}

/// 请求/响应在传输层的上下文（例如 HTTP 的 URI、Host、Method 与头部）。
///
/// # 契约说明（What）
/// - 头部键统一存为小写，同名头部的多个取值按到达顺序保存；
/// - [`TransportContext::attend_to_headers`] 跳过以忽略前缀开头的头部，默认忽略
///   `accept-encoding`、`user-agent`、`connection`、`content-type`。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportContext {
    pub uri: String,
    pub host: String,
    pub method: String,
    headers: BTreeMap<String, Vec<String>>,
    ignore_header_prefixes: Vec<String>,
}

const DEFAULT_IGNORED_PREFIXES: [&str; 4] =
    ["accept-encoding", "user-agent", "connection", "content-type"];

impl Default for TransportContext {
    fn default() -> Self {
        Self {
            uri: String::new(),
            host: String::new(),
            method: String::new(),
            headers: BTreeMap::new(),
            ignore_header_prefixes: DEFAULT_IGNORED_PREFIXES
                .iter()
                .map(|prefix| (*prefix).to_owned())
                .collect(),
        }
    }
}

impl TransportContext {
    pub fn new(uri: impl Into<String>, host: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            host: host.into(),
            method: method.into(),
            ..Self::default()
        }
    }

    /// 追加一个头部取值。
    pub fn add_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// 读取头部的首个取值。
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// 追加忽略前缀。
    pub fn add_ignore_header_prefix<I, S>(&mut self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_header_prefixes
            .extend(prefixes.into_iter().map(|prefix| prefix.into().to_ascii_lowercase()));
    }

    /// 返回未被忽略前缀命中的头部名（按字典序）。
    pub fn attend_to_headers(&self) -> Vec<&str> {
        self.headers
            .keys()
            .filter(|key| !self.should_ignore(key))
            .map(String::as_str)
            .collect()
    }

    fn should_ignore(&self, key: &str) -> bool {
        self.ignore_header_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    }
}

impl fmt::Display for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Transport Context,")?;
        writeln!(f, "  URI: {}", self.uri)?;
        writeln!(f, "  Host: {}", self.host)?;
        writeln!(f, "  Method: {}", self.method)?;
        let attended = self.attend_to_headers();
        if !attended.is_empty() {
            writeln!(f, "  Header:")?;
            for key in attended {
                writeln!(f, "    {key}: {}", self.header(key).unwrap_or_default())?;
            }
        }
        Ok(())
    }
}

/// 单次调用的执行上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：把取消、截止、传输元数据、编码偏好与日志句柄收拢到一个显式结构体中，
///   调用点的依赖一目了然；
/// - **契约 (What)**：所有字段只读；修改通过 `with_*` 返回新上下文完成，原上下文不受影响；
/// - **执行 (How)**：内部以 `Arc<CallContextInner>` 共享，`with_*` 仅在需要时克隆内部结构。
#[derive(Clone, Debug)]
pub struct CallContext {
    inner: Arc<CallContextInner>,
}

#[derive(Clone, Debug)]
struct CallContextInner {
    cancellation: Cancellation,
    deadline: Deadline,
    transport: Option<TransportContext>,
    encoding: EncodingPreference,
    pinned_encoding: Option<WireEncoding>,
    span: tracing::Span,
}

impl Default for CallContext {
    fn default() -> Self {
        CallContext::builder().build()
    }
}

impl CallContext {
    /// 创建上下文构建器。
    pub fn builder() -> CallContextBuilder {
        CallContextBuilder::default()
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.inner.cancellation
    }

    pub fn deadline(&self) -> Deadline {
        self.inner.deadline
    }

    /// 传输层上下文（仅入站消息或传输显式填充时存在）。
    pub fn transport(&self) -> Option<&TransportContext> {
        self.inner.transport.as_ref()
    }

    pub fn encoding_preference(&self) -> EncodingPreference {
        self.inner.encoding
    }

    /// 调用方显式钉住的线上编码；存在时跳过编码选择策略。
    pub fn pinned_encoding(&self) -> Option<WireEncoding> {
        self.inner.pinned_encoding
    }

    /// 日志句柄：调用链上的事件都记录在该 span 之下。
    pub fn span(&self) -> &tracing::Span {
        &self.inner.span
    }

    pub fn with_transport(&self, transport: TransportContext) -> Self {
        self.modify(|inner| inner.transport = Some(transport))
    }

    pub fn with_encoding_preference(&self, encoding: EncodingPreference) -> Self {
        self.modify(|inner| inner.encoding = encoding)
    }

    pub fn with_pinned_encoding(&self, encoding: WireEncoding) -> Self {
        self.modify(|inner| inner.pinned_encoding = Some(encoding))
    }

    pub fn with_span(&self, span: tracing::Span) -> Self {
        self.modify(|inner| inner.span = span)
    }

    pub fn with_deadline(&self, deadline: Deadline) -> Self {
        self.modify(|inner| inner.deadline = deadline)
    }

    fn modify(&self, apply: impl FnOnce(&mut CallContextInner)) -> Self {
        let mut inner = (*self.inner).clone();
        apply(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }
}

/// [`CallContext`] 构建器。
#[derive(Debug)]
pub struct CallContextBuilder {
    cancellation: Cancellation,
    deadline: Deadline,
    transport: Option<TransportContext>,
    encoding: EncodingPreference,
    pinned_encoding: Option<WireEncoding>,
    span: tracing::Span,
}

impl Default for CallContextBuilder {
    fn default() -> Self {
        Self {
            cancellation: Cancellation::new(),
            deadline: Deadline::none(),
            transport: None,
            encoding: EncodingPreference::Unspecified,
            pinned_encoding: None,
            span: tracing::Span::none(),
        }
    }
}

impl CallContextBuilder {
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_transport(mut self, transport: TransportContext) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_encoding_preference(mut self, encoding: EncodingPreference) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_pinned_encoding(mut self, encoding: WireEncoding) -> Self {
        self.pinned_encoding = Some(encoding);
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn build(self) -> CallContext {
        CallContext {
            inner: Arc::new(CallContextInner {
                cancellation: self.cancellation,
                deadline: self.deadline,
                transport: self.transport,
                encoding: self.encoding,
                pinned_encoding: self.pinned_encoding,
                span: self.span,
            }),
        }
    }
}
