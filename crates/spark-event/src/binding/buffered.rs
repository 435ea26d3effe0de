//! 以“头部表 + 负载”承载消息的参考实现。
//!
//! # 契约说明（What）
//! - 二进制模式：标准属性与扩展写入 `ce-<小写属性名>` 头部，`datacontenttype` 写入 `content-type`，负载原样保存；
//! - 结构化模式：`content-type` 为格式的媒体类型，负载为整段编码结果；
//! - 表示识别：`content-type` 命中结构化格式 → 结构化；命中批量格式 → 批量；存在可识别的版本头部 → 二进制；否则未知。
//! - 二进制模式无法区分“无负载”与“空负载”，读取时空负载视为无负载。

use std::collections::BTreeMap;

use bytes::Bytes;

use super::Encoding;
use super::direct::write;
use super::message::{
    BinaryWriter, FinishCause, Message, MessageReader, StructuredWriter, TransportMessage,
};
use super::transformer::Transformers;
use crate::attribute::{Attribute, AttributeKind, VersionSpec, binary_key, strip_binary_prefix};
use crate::contract::EncodingPreference;
use crate::error::EventError;
use crate::format::{self, Format};
use crate::protocol::TransportError;
use crate::types::ExtensionValue;

/// `content-type` 头部名。
pub const CONTENT_TYPE: &str = "content-type";

/// 头部表 + 负载形式的消息。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferedMessage {
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl BufferedMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把任意消息按偏好编码为头部表形式。
    pub fn encode(
        message: &Message,
        preference: EncodingPreference,
        transformers: &Transformers,
    ) -> Result<Self, EventError> {
        let mut buffered = Self::new();
        write(message, &mut buffered, preference, transformers)?;
        Ok(buffered)
    }

    /// 设置头部（键不区分大小写）。
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert_header(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn insert_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    fn structured_format(&self) -> Option<&'static dyn Format> {
        self.content_type().and_then(format::lookup)
    }

    fn declared_spec(&self) -> Option<&'static VersionSpec> {
        VersionSpec::detect(|name| self.header(&binary_key(name)))
    }
}

impl StructuredWriter for BufferedMessage {
    fn set_structured_event(
        &mut self,
        format: &'static dyn Format,
        body: Bytes,
    ) -> Result<(), EventError> {
        self.insert_header(CONTENT_TYPE, format.media_type());
        self.body = body;
        Ok(())
    }
}

impl BinaryWriter for BufferedMessage {
    fn set_attribute(
        &mut self,
        attribute: &'static Attribute,
        value: Option<&str>,
    ) -> Result<(), EventError> {
        let key = if attribute.kind() == AttributeKind::DataContentType {
            CONTENT_TYPE.to_owned()
        } else {
            attribute.binary_key()
        };
        match value {
            Some(value) => {
                self.headers.insert(key, value.to_owned());
            }
            None => {
                self.headers.remove(&key);
            }
        }
        Ok(())
    }

    fn set_extension(&mut self, name: &str, value: &ExtensionValue) -> Result<(), EventError> {
        self.headers.insert(binary_key(name), value.to_wire_string());
        Ok(())
    }

    fn set_data(&mut self, data: Bytes) -> Result<(), EventError> {
        self.body = data;
        Ok(())
    }
}

impl MessageReader for BufferedMessage {
    fn encoding(&self) -> Encoding {
        if self.structured_format().is_some() {
            Encoding::Structured
        } else if self.content_type().is_some_and(format::is_batch) {
            Encoding::Batched
        } else if self.declared_spec().is_some() {
            Encoding::Binary
        } else {
            Encoding::Unknown
        }
    }

    fn read_structured(&self, writer: &mut dyn StructuredWriter) -> Result<(), EventError> {
        let format = self.structured_format().ok_or(EventError::CannotConvert)?;
        writer.set_structured_event(format, self.body.clone())
    }

    fn read_binary(&self, writer: &mut dyn BinaryWriter) -> Result<(), EventError> {
        let spec = self.declared_spec().ok_or(EventError::CannotConvert)?;
        let version_attribute = spec.version_attribute();
        writer.start()?;
        writer.set_attribute(version_attribute, Some(spec.version().as_str()))?;

        for (key, value) in &self.headers {
            if key == CONTENT_TYPE {
                if let Some(attribute) = spec.attribute_of(AttributeKind::DataContentType) {
                    writer.set_attribute(attribute, Some(value))?;
                }
                continue;
            }
            let Some(name) = strip_binary_prefix(key) else {
                continue;
            };
            match spec.attribute(name) {
                Some(attribute) if attribute.kind() == AttributeKind::SpecVersion => {}
                Some(attribute) => writer.set_attribute(attribute, Some(value))?,
                None => writer.set_extension(name, &ExtensionValue::String(value.clone()))?,
            }
        }

        if !self.body.is_empty() {
            writer.set_data(self.body.clone())?;
        }
        writer.end()
    }
}

impl TransportMessage for BufferedMessage {
    fn finish(self: Box<Self>, error: Option<&FinishCause>) -> Result<(), TransportError> {
        match error {
            Some(cause) => tracing::trace!(error = %cause, "buffered message nacked"),
            None => tracing::trace!("buffered message acked"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::to_event::to_event;
    use crate::event::Event;
    use crate::version::SpecVersion;

    fn sample(version: SpecVersion) -> Event {
        let mut event = Event::new(version);
        event.set_id("42");
        event.set_type("com.example.sample");
        event.set_source("https://example.com/source");
        event.set_extension("traceparent", "00-abc");
        event.set_data_bytes(Some("text/plain"), "payload");
        event
    }

    #[test]
    fn binary_encoding_uses_prefixed_headers() {
        let message = Message::from(sample(SpecVersion::V10));
        let buffered =
            BufferedMessage::encode(&message, EncodingPreference::Binary, &Transformers::new())
                .expect("二进制编码");
        assert_eq!(buffered.header("ce-specversion"), Some("1.0"));
        assert_eq!(buffered.header("ce-id"), Some("42"));
        assert_eq!(buffered.header("ce-traceparent"), Some("00-abc"));
        assert_eq!(buffered.header("Content-Type"), Some("text/plain"));
        assert_eq!(buffered.body().as_ref(), b"payload");
        assert_eq!(buffered.encoding(), Encoding::Binary);
    }

    #[test]
    fn v01_binary_headers_round_trip() {
        let original = sample(SpecVersion::V01);
        let buffered = BufferedMessage::encode(
            &Message::from(original.clone()),
            EncodingPreference::Binary,
            &Transformers::new(),
        )
        .expect("二进制编码");
        assert_eq!(buffered.header("ce-cloudeventsversion"), Some("0.1"));
        assert_eq!(buffered.header("ce-eventid"), Some("42"));

        let (decoded, encoding) =
            to_event(&Message::from_transport(buffered), &Transformers::new()).expect("解码");
        assert_eq!(encoding, Encoding::Binary);
        assert_eq!(decoded, original);
    }

    #[test]
    fn unknown_headers_cannot_convert() {
        let message = Message::from_transport(
            BufferedMessage::new()
                .with_header("content-type", "application/json")
                .with_body("{}"),
        );
        assert_eq!(message.encoding(), Encoding::Unknown);
        assert!(matches!(
            to_event(&message, &Transformers::new()),
            Err(EventError::CannotConvert)
        ));
    }

    #[test]
    fn batch_content_type_is_recognised_but_not_decoded() {
        let message = Message::from_transport(
            BufferedMessage::new()
                .with_header("content-type", "application/cloudevents-batch+json")
                .with_body("[]"),
        );
        assert_eq!(message.encoding(), Encoding::Batched);
        assert!(to_event(&message, &Transformers::new()).is_err());
    }
}
