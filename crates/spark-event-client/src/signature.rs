//! 接收回调的形态描述与一次性校验。
//!
//! # 设计背景（Why）
//! - 回调形态多样：0–4 个参数按固定顺序取自 {上下文, 事件, 类型化数据, 响应槽}，可选返回一个错误；
//! - 形态检查只在注册时做一次，产出固定大小的 [`Descriptor`]（参数位图 + 数据类型标识 + 是否返回错误），
//!   之后每条入站消息只按描述符装配参数，不再做任何类型检查。
//!
//! # 逻辑解析（How）
//! - [`Signature`] 是形态的显式描述，既可由类型化回调自动生成，也可手工构造用于诊断；
//! - 校验按位置逐个检查：先判断类型是否可用，再判断是否重复，最后判断是否违反顺序；
//! - 返回值至多一个，且必须可转换为错误。
//!
//! # 契约说明（What）
//! - 校验永不 panic，全部违规通过 [`SignatureError`] 报告，并指明出错位置；
//! - 合法形态恰为 16 种参数子集，每种可带或不带错误返回。

use std::fmt;

use crate::error::SignatureError;

/// 参数最多个数。
pub const MAX_PARAMETERS: usize = 4;

/// 参数“槽位”，按合法顺序声明。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKind {
    Context,
    Event,
    Data,
    Response,
}

impl ParamKind {
    pub const ALL: [ParamKind; 4] = [
        ParamKind::Context,
        ParamKind::Event,
        ParamKind::Data,
        ParamKind::Response,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Context => "context",
            ParamKind::Event => "event",
            ParamKind::Data => "data",
            ParamKind::Response => "response",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个参数的类型描述。
///
/// `EventHandle` 与 `ResponseValue` 是传递方式错误的两种形态：事件必须按值传入，
/// 响应槽必须以句柄传入，否则回调对响应的写入无法被调用方观察到。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    Context,
    Event,
    /// 类型化数据，携带声明类型的名称。
    Data(&'static str),
    Response,
    EventHandle,
    ResponseValue,
    Other(&'static str),
}

impl ParamType {
    /// 可用作参数时对应的槽位。
    pub fn kind(&self) -> Option<ParamKind> {
        match self {
            ParamType::Context => Some(ParamKind::Context),
            ParamType::Event => Some(ParamKind::Event),
            ParamType::Data(_) => Some(ParamKind::Data),
            ParamType::Response => Some(ParamKind::Response),
            ParamType::EventHandle | ParamType::ResponseValue | ParamType::Other(_) => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Context => f.write_str("CallContext"),
            ParamType::Event => f.write_str("Event"),
            ParamType::Data(name) => write!(f, "Data<{name}>"),
            ParamType::Response => f.write_str("ResponseSlot"),
            ParamType::EventHandle => f.write_str("&Event"),
            ParamType::ResponseValue => f.write_str("Option<Event>"),
            ParamType::Other(name) => f.write_str(name),
        }
    }
}

/// 返回值的类型描述。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnType {
    Error,
    Other(&'static str),
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Error => f.write_str("Result<(), E>"),
            ReturnType::Other(name) => f.write_str(name),
        }
    }
}

/// 回调形态：参数列表 + 返回列表。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<ParamType>,
    returns: Vec<ReturnType>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(params: Vec<ParamType>, returns: Vec<ReturnType>) -> Self {
        Self { params, returns }
    }

    pub fn param(mut self, param: ParamType) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ret: ReturnType) -> Self {
        self.returns.push(ret);
        self
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    pub fn return_types(&self) -> &[ReturnType] {
        &self.returns
    }

    /// 校验形态并生成调度描述符。
    pub fn validate(&self) -> Result<Descriptor, SignatureError> {
        if self.params.len() > MAX_PARAMETERS {
            return Err(SignatureError::TooManyParameters {
                count: self.params.len(),
            });
        }

        let mut descriptor = Descriptor::default();
        let mut last: Option<ParamKind> = None;
        for (position, param) in self.params.iter().enumerate() {
            let Some(kind) = param.kind() else {
                return Err(SignatureError::WrongType {
                    position,
                    found: param.clone(),
                });
            };
            if descriptor.has(kind) {
                return Err(SignatureError::Duplicate { position, kind });
            }
            if last.is_some_and(|previous| previous > kind) {
                return Err(SignatureError::OutOfOrder { position, kind });
            }
            descriptor.slots |= kind.bit();
            if let ParamType::Data(name) = param {
                descriptor.data_type = Some(name);
            }
            last = Some(kind);
        }

        match self.returns.as_slice() {
            [] => {}
            [ReturnType::Error] => descriptor.error_return = true,
            [other] => {
                return Err(SignatureError::InvalidReturn {
                    found: other.clone(),
                });
            }
            many => {
                return Err(SignatureError::TooManyReturns { count: many.len() });
            }
        }
        Ok(descriptor)
    }
}

/// 注册期产出的调度描述符。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Descriptor {
    slots: u8,
    data_type: Option<&'static str>,
    error_return: bool,
}

impl Descriptor {
    pub fn has(&self, kind: ParamKind) -> bool {
        self.slots & kind.bit() != 0
    }

    pub fn arity(&self) -> usize {
        self.slots.count_ones() as usize
    }

    pub fn data_type(&self) -> Option<&'static str> {
        self.data_type
    }

    pub fn has_error_return(&self) -> bool {
        self.error_return
    }

    /// 声明了响应槽的回调需要传输层的 Responder 能力。
    pub fn is_responder(&self) -> bool {
        self.has(ParamKind::Response)
    }

    pub fn is_receiver(&self) -> bool {
        !self.is_responder()
    }
}
