//! 内存中的规范事件：版本化上下文 + 可选负载。
//!
//! 负载统一以字节保存，写入时按 `datacontenttype` 选择序列化方式，读取时按
//! “先 JSON 解码、再字符串赋值”的顺序强制转换为调用方期望的类型。

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{BASE64, EventContext, EventContextV03, EventContextV04};
use crate::error::{EventError, ValidationError};
use crate::types::{ExtensionValue, UriRef};
use crate::version::SpecVersion;

/// JSON 负载的默认内容类型。
pub const APPLICATION_JSON: &str = "application/json";

/// 判断媒体类型是否按 JSON 处理；未声明内容类型时视同 JSON。
pub fn is_json_media_type(media_type: Option<&str>) -> bool {
    match media_type {
        None => true,
        Some(media_type) => {
            let media_type = media_type.trim().to_ascii_lowercase();
            media_type == APPLICATION_JSON
                || media_type == "text/json"
                || media_type.ends_with("+json")
        }
    }
}

/// 规范事件。
///
/// # 契约说明（What）
/// - `context` 决定事件的规范版本；
/// - `data` 为 `None` 表示事件不携带负载，与“空字节负载”语义不同。
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    context: EventContext,
    data: Option<Bytes>,
}

impl Default for Event {
    fn default() -> Self {
        Event::new(SpecVersion::V10)
    }
}

impl Event {
    /// 构造指定版本的空事件。
    pub fn new(version: SpecVersion) -> Self {
        Self {
            context: EventContext::new(version),
            data: None,
        }
    }

    pub fn from_context(context: EventContext) -> Self {
        Self {
            context,
            data: None,
        }
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EventContext {
        &mut self.context
    }

    pub fn into_parts(self) -> (EventContext, Option<Bytes>) {
        (self.context, self.data)
    }

    pub fn spec_version(&self) -> SpecVersion {
        self.context.spec_version()
    }

    /// 把上下文迁移到目标版本。
    pub fn set_spec_version(&mut self, version: SpecVersion) {
        if self.context.spec_version() != version {
            self.context = self.context.convert(version);
            self.mark_binary_payload();
        }
    }

    pub fn id(&self) -> &str {
        self.context.id()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.context.set_id(id);
    }

    pub fn event_type(&self) -> &str {
        self.context.event_type()
    }

    pub fn set_type(&mut self, event_type: impl Into<String>) {
        self.context.set_event_type(event_type);
    }

    pub fn source(&self) -> &UriRef {
        self.context.source()
    }

    pub fn set_source(&mut self, source: impl Into<UriRef>) {
        self.context.set_source(source);
    }

    pub fn time(&self) -> Option<&DateTime<Utc>> {
        self.context.time()
    }

    pub fn set_time(&mut self, time: Option<DateTime<Utc>>) {
        self.context.set_time(time);
    }

    pub fn subject(&self) -> Option<&str> {
        self.context.subject()
    }

    pub fn set_subject(&mut self, subject: Option<String>) {
        self.context.set_subject(subject);
    }

    pub fn data_content_type(&self) -> Option<&str> {
        self.context.data_content_type()
    }

    pub fn set_data_content_type(&mut self, content_type: Option<String>) {
        self.context.set_data_content_type(content_type);
    }

    pub fn extension(&self, name: &str) -> Option<&ExtensionValue> {
        self.context.extension(name)
    }

    pub fn set_extension(&mut self, name: &str, value: impl Into<ExtensionValue>) {
        self.context.set_extension(name, Some(value.into()));
    }

    pub fn remove_extension(&mut self, name: &str) {
        self.context.set_extension(name, None);
    }

    pub fn extension_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, EventError> {
        self.context.extension_as(name)
    }

    /// 原始负载字节。
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// 直接写入原始负载，并设置内容类型（`None` 时保留现有内容类型）。
    pub fn set_data_bytes(&mut self, content_type: Option<&str>, data: impl Into<Bytes>) {
        if let Some(content_type) = content_type {
            self.context.set_data_content_type(Some(content_type.to_owned()));
        }
        self.data = Some(data.into());
        self.mark_binary_payload();
    }

    /// v0.3/v0.4 的非文本负载只能以 base64 承载，在上下文中显式记下 `datacontentencoding`，
    /// 使结构化与二进制两种编码的往返结果一致。
    fn mark_binary_payload(&mut self) {
        let binary = self
            .data
            .as_ref()
            .is_some_and(|data| std::str::from_utf8(data).is_err());
        if !binary {
            return;
        }
        if let EventContext::V03(EventContextV03 { data_content_encoding, .. })
        | EventContext::V04(EventContextV04 { data_content_encoding, .. }) = &mut self.context
        {
            data_content_encoding.get_or_insert_with(|| BASE64.to_owned());
        }
    }

    pub fn clear_data(&mut self) {
        self.data = None;
    }

    /// 按内容类型序列化 `value` 作为负载。
    ///
    /// # 执行逻辑（How）
    /// 1. 以 JSON 序列化 `value`；
    /// 2. 内容类型不是 JSON 且序列化结果为 JSON 字符串时，写入去掉引号的原文（例如 `text/plain`）；
    /// 3. 其余情况写入 JSON 文本。
    pub fn set_data<T: Serialize + ?Sized>(
        &mut self,
        content_type: &str,
        value: &T,
    ) -> Result<(), EventError> {
        let encoded = serde_json::to_vec(value).map_err(EventError::data)?;
        self.context.set_data_content_type(Some(content_type.to_owned()));
        let bytes = if !is_json_media_type(self.context.data_media_type()) && encoded.first() == Some(&b'"')
        {
            let text: String = serde_json::from_slice(&encoded).map_err(EventError::data)?;
            text.into_bytes()
        } else {
            encoded
        };
        self.data = Some(Bytes::from(bytes));
        Ok(())
    }

    /// 按期望类型读取负载。
    ///
    /// - 无负载时尝试把 JSON `null` 解释为 `T`（适用于 `Option<_>`、`()`），否则返回数据错误；
    /// - 有负载时先按 JSON 解码，失败后把 UTF-8 文本作为字符串赋值。
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        let Some(data) = &self.data else {
            return serde_json::from_value(Value::Null)
                .map_err(|_| EventError::data("event carries no data"));
        };
        match serde_json::from_slice::<T>(data) {
            Ok(decoded) => Ok(decoded),
            Err(json_err) => {
                let text = std::str::from_utf8(data).map_err(|_| EventError::data(&json_err))?;
                serde_json::from_value(Value::String(text.to_owned()))
                    .map_err(|_| EventError::data(json_err))
            }
        }
    }

    /// 校验上下文。
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.context.validate()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.validate() {
            Ok(()) => writeln!(f, "Validation: valid")?,
            Err(err) => writeln!(f, "Validation: invalid\n{err}")?,
        }
        write!(f, "{}", self.context)?;
        if let Some(data) = &self.data {
            writeln!(f, "Data,")?;
            match std::str::from_utf8(data) {
                Ok(text) => writeln!(f, "  {text}")?,
                Err(_) => writeln!(f, "  <{} bytes>", data.len())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    struct Order {
        id: u32,
        item: String,
    }

    #[test]
    fn json_data_round_trips_through_typed_access() {
        let mut event = Event::new(SpecVersion::V10);
        let order = Order {
            id: 7,
            item: "tea".into(),
        };
        event.set_data(APPLICATION_JSON, &order).expect("JSON 序列化");
        assert_eq!(event.data_as::<Order>().expect("JSON 解码"), order);
    }

    #[test]
    fn text_data_is_stored_without_quotes() {
        let mut event = Event::new(SpecVersion::V03);
        event.set_data("text/plain", "hello").expect("文本负载");
        assert_eq!(event.data().map(|b| b.as_ref()), Some(&b"hello"[..]));
        assert_eq!(event.data_as::<String>().expect("字符串赋值"), "hello");
    }

    #[test]
    fn missing_data_only_fits_nullable_targets() {
        let event = Event::new(SpecVersion::V10);
        assert_eq!(event.data_as::<Option<Order>>().expect("null"), None);
        assert!(matches!(event.data_as::<Order>(), Err(EventError::Data { .. })));
    }

    #[test]
    fn display_reports_validation_and_data() {
        let mut event = Event::new(SpecVersion::V10);
        event.set_id("1");
        event.set_type("example.type");
        event.set_source("/src");
        event.set_data_bytes(Some("text/plain"), "hi");
        let text = event.to_string();
        assert!(text.starts_with("Validation: valid"));
        assert!(text.contains("Data,\n  hi"));
    }
}
