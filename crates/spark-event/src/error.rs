//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义事件模型与绑定层的错误语义：校验失败、扩展读取失败、转码失败；
//! - 每个变体都映射到稳定错误码（见 [`codes`]），便于日志与指标按 `<域>.<语义>` 聚合。
//!
//! ## 设计要求（What）
//! - 校验错误永远携带**全部**违规项，而不是首个违规项；
//! - 转码错误只影响当前消息，调用方据此决定是否继续处理后续消息。

use core::fmt;

use thiserror::Error;

use crate::version::SpecVersion;

/// 稳定错误码集合。
pub mod codes {
    pub const VALIDATION: &str = "event.validation";
    pub const EXTENSION_NOT_FOUND: &str = "event.extension.not_found";
    pub const EXTENSION_TYPE: &str = "event.extension.type_mismatch";
    pub const CANNOT_CONVERT: &str = "binding.cannot_convert";
    pub const UNKNOWN_VERSION: &str = "event.spec_version.unknown";
    pub const ATTRIBUTE_TYPE: &str = "event.attribute.type_mismatch";
    pub const UNSUPPORTED_ATTRIBUTE: &str = "event.attribute.unsupported";
    pub const FORMAT: &str = "binding.format";
    pub const DATA: &str = "event.data";
    pub const TRANSFORM: &str = "binding.transform";
}

/// 单条违规记录：违反规则的属性名 + 规则描述。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    attribute: &'static str,
    rule: &'static str,
}

impl Violation {
    pub const fn new(attribute: &'static str, rule: &'static str) -> Self {
        Self { attribute, rule }
    }

    pub fn attribute(&self) -> &'static str {
        self.attribute
    }

    pub fn rule(&self) -> &'static str {
        self.rule
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attribute, self.rule)
    }
}

/// 上下文校验失败，携带完整的违规列表。
///
/// # 契约说明（What）
/// - `violations` 至少包含一项，顺序与版本校验规则的声明顺序一致；
/// - `Display` 以换行拼接全部违规项，可直接用于日志。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// 由违规列表构造；列表为空时返回 `None`，表示校验通过。
    pub fn from_violations(violations: Vec<Violation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// 是否包含针对 `attribute` 的违规项。
    pub fn mentions(&self, attribute: &str) -> bool {
        self.violations.iter().any(|v| v.attribute == attribute)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// 事件模型与绑定层的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把“事件不合法”“消息无法转码”“扩展类型不符”等故障统一成一个可 `?` 传播的类型；
/// - **契约 (What)**：所有变体 `Send + Sync + 'static`，[`EventError::code`] 返回稳定错误码；
/// - **风险 (Trade-offs)**：`Format`/`Data` 以字符串保存底层细节，牺牲少量结构化信息换取跨格式的一致表示。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventError {
    /// 上下文或事件未通过版本规则校验。
    #[error("event failed validation:\n{0}")]
    Validation(#[from] ValidationError),

    /// 读取的扩展属性不存在。
    #[error("extension `{name}` does not exist")]
    ExtensionNotFound { name: String },

    /// 扩展属性存在，但无法转换成请求的形状。
    #[error("invalid type for extension `{name}`: {detail}")]
    ExtensionTypeMismatch { name: String, detail: String },

    /// 消息既不是可识别的结构化表示，也不是二进制表示。
    #[error("cannot convert message to event")]
    CannotConvert,

    /// 遇到转换链之外的版本字符串。
    #[error("unknown spec version `{0}`")]
    UnknownSpecVersion(String),

    /// 属性值无法解析为该属性声明的类型。
    #[error("attribute `{attribute}` expects {expected}, got `{value}`")]
    AttributeType {
        attribute: &'static str,
        expected: &'static str,
        value: String,
    },

    /// 属性不属于当前版本。
    #[error("attribute `{attribute}` is not defined by spec version {version}")]
    UnsupportedAttribute {
        attribute: String,
        version: SpecVersion,
    },

    /// 结构化格式编解码失败。
    #[error("format `{media_type}` failed: {detail}")]
    Format {
        media_type: &'static str,
        detail: String,
    },

    /// 负载编解码失败。
    #[error("event data error: {detail}")]
    Data { detail: String },

    /// 转换钩子拒绝继续处理。
    #[error("transformer failed: {detail}")]
    Transform { detail: String },
}

impl EventError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            EventError::Validation(_) => codes::VALIDATION,
            EventError::ExtensionNotFound { .. } => codes::EXTENSION_NOT_FOUND,
            EventError::ExtensionTypeMismatch { .. } => codes::EXTENSION_TYPE,
            EventError::CannotConvert => codes::CANNOT_CONVERT,
            EventError::UnknownSpecVersion(_) => codes::UNKNOWN_VERSION,
            EventError::AttributeType { .. } => codes::ATTRIBUTE_TYPE,
            EventError::UnsupportedAttribute { .. } => codes::UNSUPPORTED_ATTRIBUTE,
            EventError::Format { .. } => codes::FORMAT,
            EventError::Data { .. } => codes::DATA,
            EventError::Transform { .. } => codes::TRANSFORM,
        }
    }

    pub(crate) fn data(detail: impl fmt::Display) -> Self {
        EventError::Data {
            detail: detail.to_string(),
        }
    }

    pub(crate) fn format(media_type: &'static str, detail: impl fmt::Display) -> Self {
        EventError::Format {
            media_type,
            detail: detail.to_string(),
        }
    }
}
