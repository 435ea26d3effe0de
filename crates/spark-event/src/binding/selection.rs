//! 出站编码选择策略。
//!
//! # 设计背景（Why）
//! - 调用方没有钉住编码时，需要根据“偏好模式 + 事件自身版本”决定线上编码；
//! - 选择函数处于发送热路径，必须是总函数：任何输入都返回一个标签，既不 panic 也不报错。
//!
//! # 契约说明（What）
//! - [`WireEncoding`] 为带版本的线上编码标签，提供 `name`/`version`/`codec` 三种展示形式；
//! - [`SelectionStrategy`] 只为配置中列出的版本（默认 v0.3 与 v1.0）产出带版本的标签，其余版本返回 [`WireEncoding::Default`]；
//! - 基于上下文的策略：偏好未指定或为二进制时走二进制，偏好为结构化时走结构化。

use std::fmt;

use crate::contract::{CallContext, EncodingPreference};
use crate::event::Event;
use crate::version::SpecVersion;

/// 带版本的线上编码标签。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireEncoding {
    /// 版本无法识别时的哨兵值，由调用方或传输层决定回退方式。
    Default,
    Binary(SpecVersion),
    Structured(SpecVersion),
    Batched(SpecVersion),
    Unknown,
}

impl WireEncoding {
    /// 编码族名称；`Default` 与 `Unknown` 按二进制处理。
    pub fn name(self) -> &'static str {
        match self {
            WireEncoding::Structured(_) => "structured",
            WireEncoding::Batched(_) => "batched",
            WireEncoding::Default | WireEncoding::Binary(_) | WireEncoding::Unknown => "binary",
        }
    }

    /// 版本展示，例如 `v1.0`。
    pub fn version(self) -> String {
        match self {
            WireEncoding::Default => "Default".to_owned(),
            WireEncoding::Binary(version)
            | WireEncoding::Structured(version)
            | WireEncoding::Batched(version) => format!("v{version}"),
            WireEncoding::Unknown => "Unknown".to_owned(),
        }
    }

    /// 编解码器标识，例如 `binary/v1.0`。
    pub fn codec(self) -> String {
        match self {
            WireEncoding::Default => "default".to_owned(),
            WireEncoding::Unknown => "unknown".to_owned(),
            other => format!("{}/{}", other.name(), other.version()),
        }
    }

    /// 标签对应的编码偏好。
    pub fn preference(self) -> EncodingPreference {
        match self {
            WireEncoding::Structured(_) | WireEncoding::Batched(_) => EncodingPreference::Structured,
            WireEncoding::Binary(_) => EncodingPreference::Binary,
            WireEncoding::Default | WireEncoding::Unknown => EncodingPreference::Unspecified,
        }
    }
}

impl fmt::Display for WireEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireEncoding::Default => write!(f, "Default Encoding {}", self.version()),
            WireEncoding::Binary(_) => write!(f, "Binary Encoding {}", self.version()),
            WireEncoding::Structured(_) => write!(f, "Structured Encoding {}", self.version()),
            WireEncoding::Batched(_) => write!(f, "Batched Encoding {}", self.version()),
            WireEncoding::Unknown => f.write_str("Unknown Encoding"),
        }
    }
}

/// 编码选择器：`(上下文, 事件) → 编码标签` 的总函数。
pub trait EncodingSelector: Send + Sync {
    fn select(&self, ctx: &CallContext, event: &Event) -> WireEncoding;
}

impl<F> EncodingSelector for F
where
    F: Fn(&CallContext, &Event) -> WireEncoding + Send + Sync,
{
    fn select(&self, ctx: &CallContext, event: &Event) -> WireEncoding {
        self(ctx, event)
    }
}

/// 内置策略的模式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StrategyMode {
    /// 读取上下文中的偏好。
    #[default]
    ContextBased,
    DefaultBinary,
    DefaultStructured,
}

/// 内置的编码选择策略。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionStrategy {
    mode: StrategyMode,
    versions: Vec<SpecVersion>,
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self::new(StrategyMode::ContextBased)
    }
}

impl SelectionStrategy {
    /// 默认支持 v0.3 与 v1.0 的带版本编码。
    pub fn new(mode: StrategyMode) -> Self {
        Self {
            mode,
            versions: vec![SpecVersion::V03, SpecVersion::V10],
        }
    }

    /// 替换拥有带版本编码的版本集合。
    pub fn with_versions(mut self, versions: impl IntoIterator<Item = SpecVersion>) -> Self {
        self.versions = versions.into_iter().collect();
        self
    }

    pub fn mode(&self) -> StrategyMode {
        self.mode
    }

    pub fn versions(&self) -> &[SpecVersion] {
        &self.versions
    }

    fn supported(&self, event: &Event) -> Option<SpecVersion> {
        let version = event.spec_version();
        self.versions.contains(&version).then_some(version)
    }

    pub fn default_binary(&self, event: &Event) -> WireEncoding {
        self.supported(event)
            .map_or(WireEncoding::Default, WireEncoding::Binary)
    }

    pub fn default_structured(&self, event: &Event) -> WireEncoding {
        self.supported(event)
            .map_or(WireEncoding::Default, WireEncoding::Structured)
    }

    pub fn context_based(&self, ctx: &CallContext, event: &Event) -> WireEncoding {
        match ctx.encoding_preference() {
            EncodingPreference::Unspecified | EncodingPreference::Binary => {
                self.default_binary(event)
            }
            EncodingPreference::Structured => self.default_structured(event),
        }
    }
}

impl EncodingSelector for SelectionStrategy {
    fn select(&self, ctx: &CallContext, event: &Event) -> WireEncoding {
        match self.mode {
            StrategyMode::ContextBased => self.context_based(ctx, event),
            StrategyMode::DefaultBinary => self.default_binary(event),
            StrategyMode::DefaultStructured => self.default_structured(event),
        }
    }
}
