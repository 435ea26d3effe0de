//! 属性值类型：URI 引用、时间戳与扩展值。
//!
//! 各版本上下文共享同一组值类型，转换时只做字段搬运，不做值的重新解析。

use core::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;

/// URI 引用（可以是相对引用）。
///
/// 不做语法校验：空字符串是合法的“缺省值”，由上下文校验负责报告 `source: REQUIRED`。
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UriRef(String);

impl UriRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 去除首尾空白后是否为空。
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// 是否为绝对 URI（含 scheme）。
    pub fn is_absolute(&self) -> bool {
        url::Url::parse(self.0.trim()).is_ok()
    }
}

impl fmt::Display for UriRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UriRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UriRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 以 RFC 3339 解析时间戳。
pub fn parse_timestamp(attribute: &'static str, value: &str) -> Result<DateTime<Utc>, EventError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| EventError::AttributeType {
            attribute,
            expected: "an RFC 3339 timestamp",
            value: value.to_owned(),
        })
}

/// 以 RFC 3339（UTC，`Z` 后缀，按需保留小数秒）格式化时间戳。
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// 扩展属性值。
///
/// # 设计背景（Why）
/// - 扩展属性的类型系统随版本演进（v1.0 定义了布尔、整数、字符串、二进制、URI、URI 引用、时间戳）；
/// - 结构化格式中可能出现任意 JSON 值，`Json` 分支保留原始形状，读取时再按调用方期望的类型解码。
///
/// # 契约说明（What）
/// - [`ExtensionValue::to_wire_string`] 给出二进制模式下的元数据槽取值；
/// - [`ExtensionValue::to_json`] 给出结构化模式下的 JSON 取值。
/// - 相等性按线上形态判断：时间戳、URI、URI 引用、二进制在线上都是字符串，
///   与携带相同规范字符串的 `String` 值视为相等，结构化往返后比较不会因类型标签丢失而失败。
#[derive(Clone, Debug)]
pub enum ExtensionValue {
    Bool(bool),
    Integer(i64),
    String(String),
    Binary(Vec<u8>),
    Uri(String),
    UriRef(String),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl ExtensionValue {
    /// 二进制模式下的字符串表示。
    pub fn to_wire_string(&self) -> String {
        match self {
            ExtensionValue::Bool(value) => value.to_string(),
            ExtensionValue::Integer(value) => value.to_string(),
            ExtensionValue::String(value)
            | ExtensionValue::Uri(value)
            | ExtensionValue::UriRef(value) => value.clone(),
            ExtensionValue::Binary(value) => STANDARD.encode(value),
            ExtensionValue::Timestamp(value) => format_timestamp(value),
            ExtensionValue::Json(Value::String(value)) => value.clone(),
            ExtensionValue::Json(value) => value.to_string(),
        }
    }

    /// 结构化模式下的 JSON 表示。
    pub fn to_json(&self) -> Value {
        match self {
            ExtensionValue::Bool(value) => Value::Bool(*value),
            ExtensionValue::Integer(value) => Value::from(*value),
            ExtensionValue::Json(value) => value.clone(),
            other => Value::String(other.to_wire_string()),
        }
    }

    /// 从结构化负载中的 JSON 值还原。
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Bool(value) => ExtensionValue::Bool(value),
            Value::String(value) => ExtensionValue::String(value),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => ExtensionValue::Integer(integer),
                None => ExtensionValue::Json(Value::Number(number)),
            },
            other => ExtensionValue::Json(other),
        }
    }

    /// 若值本身是字符串形态则借出。
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtensionValue::String(value)
            | ExtensionValue::Uri(value)
            | ExtensionValue::UriRef(value) => Some(value),
            ExtensionValue::Json(Value::String(value)) => Some(value),
            _ => None,
        }
    }
}

impl ExtensionValue {
    /// 线上以字符串承载的取值，返回其规范字符串；布尔与整数返回 `None`。
    fn string_carried(&self) -> Option<String> {
        match self {
            ExtensionValue::Bool(_) | ExtensionValue::Integer(_) => None,
            ExtensionValue::Json(Value::String(value)) => Some(value.clone()),
            ExtensionValue::Json(_) => None,
            other => Some(other.to_wire_string()),
        }
    }
}

impl PartialEq for ExtensionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExtensionValue::Bool(a), ExtensionValue::Bool(b)) => a == b,
            (ExtensionValue::Integer(a), ExtensionValue::Integer(b)) => a == b,
            (ExtensionValue::Json(a), ExtensionValue::Json(b)) => a == b,
            (ExtensionValue::Json(Value::Bool(a)), ExtensionValue::Bool(b))
            | (ExtensionValue::Bool(b), ExtensionValue::Json(Value::Bool(a))) => a == b,
            (ExtensionValue::Json(Value::Number(a)), ExtensionValue::Integer(b))
            | (ExtensionValue::Integer(b), ExtensionValue::Json(Value::Number(a))) => {
                a.as_i64() == Some(*b)
            }
            _ => match (self.string_carried(), other.string_carried()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for ExtensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        ExtensionValue::String(value.to_owned())
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        ExtensionValue::String(value)
    }
}

impl From<bool> for ExtensionValue {
    fn from(value: bool) -> Self {
        ExtensionValue::Bool(value)
    }
}

impl From<i64> for ExtensionValue {
    fn from(value: i64) -> Self {
        ExtensionValue::Integer(value)
    }
}

impl From<i32> for ExtensionValue {
    fn from(value: i32) -> Self {
        ExtensionValue::Integer(i64::from(value))
    }
}

impl From<Vec<u8>> for ExtensionValue {
    fn from(value: Vec<u8>) -> Self {
        ExtensionValue::Binary(value)
    }
}

impl From<DateTime<Utc>> for ExtensionValue {
    fn from(value: DateTime<Utc>) -> Self {
        ExtensionValue::Timestamp(value)
    }
}

impl From<Value> for ExtensionValue {
    fn from(value: Value) -> Self {
        ExtensionValue::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_through_rfc3339() {
        let parsed = parse_timestamp("time", "2019-06-17T09:08:07.123Z").expect("合法时间戳");
        assert_eq!(format_timestamp(&parsed), "2019-06-17T09:08:07.123Z");
        assert!(parse_timestamp("time", "yesterday").is_err());
    }

    #[test]
    fn typed_values_equal_their_wire_string() {
        let at = parse_timestamp("time", "2020-01-02T03:04:05Z").expect("合法时间戳");
        let typed = [
            ExtensionValue::Timestamp(at),
            ExtensionValue::Uri("https://a.example/x".to_owned()),
            ExtensionValue::UriRef("/x#y".to_owned()),
            ExtensionValue::Binary(vec![0xff, 0x00]),
        ];
        for value in typed {
            let decoded = ExtensionValue::from_json(value.to_json());
            assert!(matches!(decoded, ExtensionValue::String(_)));
            assert_eq!(decoded, value);
            assert_eq!(value, decoded);
        }
        assert_ne!(ExtensionValue::Integer(1), ExtensionValue::String("1".to_owned()));
        assert_ne!(ExtensionValue::Bool(true), ExtensionValue::String("true".to_owned()));
        assert_ne!(
            ExtensionValue::Uri("a".to_owned()),
            ExtensionValue::String("b".to_owned())
        );
    }

    #[test]
    fn json_numbers_become_integers_when_they_fit() {
        assert_eq!(
            ExtensionValue::from_json(serde_json::json!(42)),
            ExtensionValue::Integer(42)
        );
        assert!(matches!(
            ExtensionValue::from_json(serde_json::json!(1.5)),
            ExtensionValue::Json(_)
        ));
    }
}
