//! 客户端编排层的错误域。
//!
//! # 设计背景（Why）
//! - 注册期错误（回调形态非法、能力不匹配、重复注册）必须在调用点同步暴露，绝不延迟到接收循环中途；
//! - 运行期错误区分“传输终态失败”“回调声明的失败”“截止时间到期”，编排层只转述传输错误而不重新解释。
//!
//! # 契约说明（What）
//! - [`SignatureError`] 枚举全部回调形态违规，携带出错的位置与原因；
//! - [`ClientError`] 汇总编排层全部失败路径；两者均提供稳定错误码 `code()`。

use std::error::Error;

use spark_event::protocol::TransportError;
use spark_event::ValidationError;
use thiserror::Error;

use crate::signature::{ParamKind, ParamType, ReturnType};

/// 回调返回的错误对象。
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// 稳定错误码集合。
pub mod codes {
    pub const SIGNATURE_WRONG_TYPE: &str = "receiver.signature.wrong_type";
    pub const SIGNATURE_DUPLICATE: &str = "receiver.signature.duplicate";
    pub const SIGNATURE_OUT_OF_ORDER: &str = "receiver.signature.out_of_order";
    pub const SIGNATURE_TOO_MANY_PARAMETERS: &str = "receiver.signature.too_many_parameters";
    pub const SIGNATURE_TOO_MANY_RETURNS: &str = "receiver.signature.too_many_returns";
    pub const SIGNATURE_INVALID_RETURN: &str = "receiver.signature.invalid_return";

    pub const MISSING_CAPABILITY: &str = "client.capability.missing";
    pub const CAPABILITY_MISMATCH: &str = "client.capability.mismatch";
    pub const VALIDATION: &str = "client.validation";
    pub const ALREADY_RECEIVING: &str = "client.receiver.already_registered";
    pub const INVOCATION: &str = "client.receiver.invocation";
    pub const DEADLINE_EXCEEDED: &str = "client.deadline_exceeded";
    pub const CONFIG: &str = "client.config";
}

/// 回调形态校验失败。
///
/// # 教案式说明
/// - **意图 (Why)**：把“哪个位置的参数/返回值不合法、为什么不合法”变成可枚举的结构，而不是一段自由文本；
/// - **契约 (What)**：`position` 从 0 开始计数；`Display` 文本附带合法形态的用法提示。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignatureError {
    #[error("{usage}; cannot use parameter {position} of type {found}", usage = USAGE_IN)]
    WrongType { position: usize, found: ParamType },

    #[error("{usage}; duplicate parameter {position} of kind {kind}", usage = USAGE_IN)]
    Duplicate { position: usize, kind: ParamKind },

    #[error("{usage}; out of order parameter {position} of kind {kind}", usage = USAGE_IN)]
    OutOfOrder { position: usize, kind: ParamKind },

    #[error("{usage}; function has too many parameters ({count})", usage = USAGE_IN)]
    TooManyParameters { count: usize },

    #[error("{usage}; function has too many return values ({count})", usage = USAGE_OUT)]
    TooManyReturns { count: usize },

    #[error("{usage}; cannot convert return value of type {found} to an error", usage = USAGE_OUT)]
    InvalidReturn { found: ReturnType },
}

const USAGE_IN: &str = "expected a function taking no parameters, or an ordered subset of \
                        (context, event, data, response slot)";
const USAGE_OUT: &str = "expected a function returning nothing or an error";

impl SignatureError {
    pub fn code(&self) -> &'static str {
        match self {
            SignatureError::WrongType { .. } => codes::SIGNATURE_WRONG_TYPE,
            SignatureError::Duplicate { .. } => codes::SIGNATURE_DUPLICATE,
            SignatureError::OutOfOrder { .. } => codes::SIGNATURE_OUT_OF_ORDER,
            SignatureError::TooManyParameters { .. } => codes::SIGNATURE_TOO_MANY_PARAMETERS,
            SignatureError::TooManyReturns { .. } => codes::SIGNATURE_TOO_MANY_RETURNS,
            SignatureError::InvalidReturn { .. } => codes::SIGNATURE_INVALID_RETURN,
        }
    }
}

/// 客户端编排层的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：`Send`/`Request`/`StartReceiver` 共用一个可 `?` 传播的错误类型；
/// - **契约 (What)**：
///   - `Validation`：事件未通过校验，传输层从未被调用；
///   - `Transport`：传输层终态失败，原样转述；
///   - `Invocation`：回调返回的错误，接收循环因此终止，错误对象原样保留；
/// - **风险 (Trade-offs)**：`Invocation` 持有 trait 对象，整个枚举不可克隆。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("transport does not implement `{capability}`")]
    MissingCapability { capability: &'static str },

    #[error("event failed validation:\n{0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("client already has a receiver")]
    AlreadyReceiving,

    #[error("mismatched receiver callback: requires `{required}`, which the transport does not support")]
    CapabilityMismatch { required: &'static str },

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("receiver callback failed: {0}")]
    Invocation(#[source] BoxError),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid client configuration: {detail}")]
    Config { detail: String },
}

impl ClientError {
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::MissingCapability { .. } => codes::MISSING_CAPABILITY,
            ClientError::Validation(_) => codes::VALIDATION,
            ClientError::Transport(err) => err.code(),
            ClientError::AlreadyReceiving => codes::ALREADY_RECEIVING,
            ClientError::CapabilityMismatch { .. } => codes::CAPABILITY_MISMATCH,
            ClientError::Signature(err) => err.code(),
            ClientError::Invocation(_) => codes::INVOCATION,
            ClientError::DeadlineExceeded => codes::DEADLINE_EXCEEDED,
            ClientError::Config { .. } => codes::CONFIG,
        }
    }

    pub(crate) fn config(detail: impl Into<String>) -> Self {
        ClientError::Config {
            detail: detail.into(),
        }
    }
}
