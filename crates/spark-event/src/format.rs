//! 结构化格式：把“上下文 + 负载”整体序列化为一个带内容类型的不透明负载。
//!
//! # 设计背景（Why）
//! - 结构化模式下传输层只搬运一段字节与一个内容类型，事件语义完全由格式决定；
//! - 目前只有 JSON 一种格式，但仍以 [`Format`] trait 抽象，传输层通过 [`lookup`] 按内容类型查找实现。
//!
//! # 契约说明（What）
//! - 负载编码规则：
//!   1. 内容类型为 JSON（或未声明）且负载本身是合法 JSON 时，原样内嵌到 `data`；
//!   2. 否则若负载是 UTF-8 文本，以 JSON 字符串写入 `data`；
//!   3. 否则按版本处理二进制：v1.0 写入 `data_base64`；v0.3/v0.4 写入 base64 文本并设置
//!      `datacontentencoding: base64`；v0.1/v0.2 无法表达二进制负载，返回格式错误。
//! - `datacontentencoding` 是 v0.3/v0.4 的普通上下文属性：编码时照常写出，解码时照常保留；
//!   非文本负载在 [`Event`] 写入时已显式标记为 base64，因此两种编码模式的往返结果一致。
//! - v0.1 的扩展属性嵌套在 `extensions` 对象中，其余版本与标准属性平级。
//!
//! # 风险提示（Trade-offs）
//! - 内嵌 JSON 负载借助 `RawValue` 保留原始文本，避免解析为 `Value` 后键顺序与数字格式发生变化；
//!   代价是负载首尾空白在往返后会被去除。

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::attribute::{AttributeKind, VersionSpec};
use crate::context::BASE64;
use crate::error::EventError;
use crate::event::{Event, is_json_media_type};
use crate::types::ExtensionValue;
use crate::version::SpecVersion;

/// JSON 结构化格式的媒体类型。
pub const JSON_MEDIA_TYPE: &str = "application/cloudevents+json";

/// 批量 JSON 格式的媒体类型；本库只识别，不解码。
pub const BATCH_JSON_MEDIA_TYPE: &str = "application/cloudevents-batch+json";

/// 结构化格式。
pub trait Format: Send + Sync + fmt::Debug {
    /// 结构化负载的内容类型。
    fn media_type(&self) -> &'static str;

    /// 把事件整体编码为一段负载。
    fn marshal(&self, event: &Event) -> Result<Bytes, EventError>;

    /// 从负载还原事件。
    fn unmarshal(&self, body: &[u8]) -> Result<Event, EventError>;
}

/// `application/cloudevents+json` 的实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonFormat;

/// 进程内共享的 JSON 格式实例。
pub static JSON: JsonFormat = JsonFormat;

/// 按内容类型查找格式（忽略参数与大小写）。
pub fn lookup(content_type: &str) -> Option<&'static dyn Format> {
    let media_type = strip_parameters(content_type);
    media_type
        .eq_ignore_ascii_case(JSON_MEDIA_TYPE)
        .then_some(&JSON as &'static dyn Format)
}

/// 内容类型是否声明了批量格式。
pub fn is_batch(content_type: &str) -> bool {
    strip_parameters(content_type).eq_ignore_ascii_case(BATCH_JSON_MEDIA_TYPE)
}

fn strip_parameters(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    attributes: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a RawValue>,
}

enum EncodedData {
    Inline(Box<RawValue>),
    Text(String),
    Base64(String),
}

fn encode_data(event: &Event, data: &[u8]) -> EncodedData {
    let ctx = event.context();
    let forced_base64 = ctx
        .data_content_encoding()
        .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case(BASE64));
    if !forced_base64 {
        if let Ok(text) = std::str::from_utf8(data) {
            if is_json_media_type(ctx.data_media_type()) {
                if let Ok(raw) = RawValue::from_string(text.to_owned()) {
                    return EncodedData::Inline(raw);
                }
            }
            return EncodedData::Text(text.to_owned());
        }
    }
    EncodedData::Base64(STANDARD.encode(data))
}

fn format_err(detail: impl fmt::Display) -> EventError {
    EventError::format(JSON_MEDIA_TYPE, detail)
}

impl Format for JsonFormat {
    fn media_type(&self) -> &'static str {
        JSON_MEDIA_TYPE
    }

    fn marshal(&self, event: &Event) -> Result<Bytes, EventError> {
        let ctx = event.context();
        let version = ctx.spec_version();
        let spec = VersionSpec::of(version);

        let mut attributes = Map::new();
        for attribute in spec.attributes() {
            if let Some(value) = attribute.get(ctx) {
                attributes.insert(attribute.name().to_owned(), Value::String(value));
            }
        }

        let extensions = ctx.extensions();
        if version == SpecVersion::V01 {
            if !extensions.is_empty() {
                let nested = extensions
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect();
                attributes.insert("extensions".to_owned(), Value::Object(nested));
            }
        } else {
            for (name, value) in extensions {
                attributes
                    .entry(name.clone())
                    .or_insert_with(|| value.to_json());
            }
        }

        let mut inline = None;
        if let Some(data) = event.data() {
            match encode_data(event, data) {
                EncodedData::Inline(raw) => inline = Some(raw),
                EncodedData::Text(text) => {
                    attributes.insert("data".to_owned(), Value::String(text));
                }
                EncodedData::Base64(encoded) => match version {
                    SpecVersion::V10 => {
                        attributes.insert("data_base64".to_owned(), Value::String(encoded));
                    }
                    SpecVersion::V03 | SpecVersion::V04 => {
                        attributes.insert("data".to_owned(), Value::String(encoded));
                        attributes.insert(
                            "datacontentencoding".to_owned(),
                            Value::String(BASE64.to_owned()),
                        );
                    }
                    SpecVersion::V01 | SpecVersion::V02 => {
                        return Err(format_err(format!(
                            "binary data cannot be carried by spec version {version}"
                        )));
                    }
                },
            }
        }

        let envelope = Envelope {
            attributes: &attributes,
            data: inline.as_deref(),
        };
        serde_json::to_vec(&envelope)
            .map(Bytes::from)
            .map_err(format_err)
    }

    fn unmarshal(&self, body: &[u8]) -> Result<Event, EventError> {
        let fields: BTreeMap<String, Box<RawValue>> =
            serde_json::from_slice(body).map_err(format_err)?;

        let declared = fields
            .get("specversion")
            .or_else(|| fields.get("cloudEventsVersion"))
            .ok_or_else(|| format_err("missing spec version attribute"))?;
        let declared: String = serde_json::from_str(declared.get()).map_err(format_err)?;
        let version: SpecVersion = declared.parse()?;
        let spec = VersionSpec::of(version);

        let mut event = Event::new(version);
        let mut data_field = None;
        let mut data_base64 = None;
        for (name, raw) in &fields {
            match name.as_str() {
                "data" => data_field = Some(raw),
                "data_base64" if version == SpecVersion::V10 => data_base64 = Some(raw),
                "extensions" if version == SpecVersion::V01 => {
                    let nested: Map<String, Value> =
                        serde_json::from_str(raw.get()).map_err(format_err)?;
                    for (key, value) in nested {
                        event.set_extension(&key, ExtensionValue::from_json(value));
                    }
                }
                _ => match spec.attribute(name) {
                    Some(attribute) if attribute.kind() == AttributeKind::SpecVersion => {}
                    Some(attribute) => {
                        let value: Option<String> = serde_json::from_str(raw.get()).map_err(|_| {
                            EventError::AttributeType {
                                attribute: attribute.name(),
                                expected: "a string",
                                value: raw.get().to_owned(),
                            }
                        })?;
                        attribute.set(event.context_mut(), value.as_deref())?;
                    }
                    None => {
                        let value: Value = serde_json::from_str(raw.get()).map_err(format_err)?;
                        event.set_extension(name, ExtensionValue::from_json(value));
                    }
                },
            }
        }

        if let Some(raw) = data_base64 {
            let encoded: String = serde_json::from_str(raw.get()).map_err(format_err)?;
            let decoded = STANDARD.decode(encoded.trim()).map_err(EventError::data)?;
            event.set_data_bytes(None, decoded);
        } else if let Some(raw) = data_field.filter(|raw| raw.get() != "null") {
            let base64_encoded = event
                .context()
                .data_content_encoding()
                .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case(BASE64));
            if base64_encoded {
                let encoded: String = serde_json::from_str(raw.get()).map_err(format_err)?;
                let decoded = STANDARD.decode(encoded.trim()).map_err(EventError::data)?;
                event.set_data_bytes(None, decoded);
            } else if raw.get().starts_with('"')
                && !is_json_media_type(event.context().data_media_type())
            {
                let text: String = serde_json::from_str(raw.get()).map_err(format_err)?;
                event.set_data_bytes(None, text);
            } else {
                event.set_data_bytes(None, raw.get().as_bytes().to_vec());
            }
        }
        Ok(event)
    }
}
