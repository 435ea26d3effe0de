//! 属性规格注册表：按版本索引的“规范属性名 → 读写访问器”表。
//!
//! # 设计背景（Why）
//! - 二进制编码需要把每个属性逐个写入传输层的元数据槽，解码则反向逐个读取；
//! - 若编解码器针对每个版本手写字段搬运，新增版本就要改动所有编解码器。改为查表驱动后，
//!   新版本只需在此追加一张属性表。
//!
//! # 契约说明（What）
//! - [`VersionSpec::of`] 返回指定版本的属性表，表中第一项永远是版本属性本身；
//! - [`Attribute::get`] 返回线上字符串形态；[`Attribute::set`] 按属性的值类型解析字符串后写入上下文；
//! - 写入版本属性会把上下文整体迁移到新版本（变体切换），因此解码方必须先写版本属性再写其他属性。
//!
//! # 风险提示（Trade-offs）
//! - 全部取值以字符串表示，时间戳等类型在编解码两端各解析一次，换取传输层实现的一致性。

use crate::context::EventContext;
use crate::error::EventError;
use crate::types::{UriRef, format_timestamp, parse_timestamp};
use crate::version::SpecVersion;

/// 二进制模式下元数据键的固定前缀。
pub const BINARY_PREFIX: &str = "ce-";

/// 与版本无关的属性语义。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    SpecVersion,
    Type,
    Source,
    Subject,
    Id,
    Time,
    DataSchema,
    DataContentType,
    DataContentEncoding,
    EventTypeVersion,
}

/// 属性在线上的值类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    String,
    UriRef,
    Timestamp,
}

/// 单个属性的描述：语义、线上名称与值类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribute {
    kind: AttributeKind,
    name: &'static str,
    value_type: ValueType,
}

const fn attr(kind: AttributeKind, name: &'static str, value_type: ValueType) -> Attribute {
    Attribute {
        kind,
        name,
        value_type,
    }
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// 该版本中的线上属性名（结构化格式中的 JSON 键）。
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// 二进制模式下的元数据键，例如 `ce-specversion`。
    pub fn binary_key(&self) -> String {
        binary_key(self.name)
    }

    /// 读取线上字符串；未设置或为空的必填字段返回 `None`。
    pub fn get(&self, ctx: &EventContext) -> Option<String> {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_owned());
        match self.kind {
            AttributeKind::SpecVersion => non_empty(ctx.spec_version_str()),
            AttributeKind::Type => non_empty(ctx.event_type()),
            AttributeKind::Source => non_empty(ctx.source().as_str()),
            AttributeKind::Id => non_empty(ctx.id()),
            AttributeKind::Subject => ctx.subject().map(str::to_owned),
            AttributeKind::Time => ctx.time().map(format_timestamp),
            AttributeKind::DataSchema => ctx.data_schema().map(|schema| schema.as_str().to_owned()),
            AttributeKind::DataContentType => ctx.data_content_type().map(str::to_owned),
            AttributeKind::DataContentEncoding => ctx.data_content_encoding().map(str::to_owned),
            AttributeKind::EventTypeVersion => match ctx {
                EventContext::V01(inner) => inner.event_type_version.clone(),
                _ => None,
            },
        }
    }

    /// 按值类型解析 `value` 并写入；`None` 表示清除可选属性。
    ///
    /// # 错误
    /// - 版本字符串未知：[`EventError::UnknownSpecVersion`]；
    /// - 时间戳不是 RFC 3339：[`EventError::AttributeType`]；
    /// - 属性不属于上下文当前版本：[`EventError::UnsupportedAttribute`]。
    pub fn set(&self, ctx: &mut EventContext, value: Option<&str>) -> Result<(), EventError> {
        match self.kind {
            AttributeKind::SpecVersion => {
                let raw = value.unwrap_or_default();
                let target: SpecVersion = raw.parse()?;
                if target != ctx.spec_version() {
                    *ctx = ctx.convert(target);
                }
            }
            AttributeKind::Type => ctx.set_event_type(value.unwrap_or_default()),
            AttributeKind::Source => ctx.set_source(UriRef::new(value.unwrap_or_default())),
            AttributeKind::Id => ctx.set_id(value.unwrap_or_default()),
            AttributeKind::Subject => ctx.set_subject(value.map(str::to_owned)),
            AttributeKind::Time => {
                let time = value
                    .map(|raw| parse_timestamp(self.name, raw))
                    .transpose()?;
                ctx.set_time(time);
            }
            AttributeKind::DataSchema => ctx.set_data_schema(value.map(UriRef::new)),
            AttributeKind::DataContentType => ctx.set_data_content_type(value.map(str::to_owned)),
            AttributeKind::DataContentEncoding => {
                let value = value.map(str::to_owned);
                match ctx {
                    EventContext::V03(inner) => inner.data_content_encoding = value,
                    EventContext::V04(inner) => inner.data_content_encoding = value,
                    other => return Err(self.unsupported(other.spec_version())),
                }
            }
            AttributeKind::EventTypeVersion => match ctx {
                EventContext::V01(inner) => inner.event_type_version = value.map(str::to_owned),
                other => return Err(self.unsupported(other.spec_version())),
            },
        }
        Ok(())
    }

    fn unsupported(&self, version: SpecVersion) -> EventError {
        EventError::UnsupportedAttribute {
            attribute: self.name.to_owned(),
            version,
        }
    }
}

/// 为任意属性名或扩展名生成二进制元数据键。
pub fn binary_key(name: &str) -> String {
    format!("{BINARY_PREFIX}{}", name.to_ascii_lowercase())
}

/// 去掉二进制前缀；不带前缀的键返回 `None`。
pub fn strip_binary_prefix(key: &str) -> Option<&str> {
    let prefix = key.get(..BINARY_PREFIX.len())?;
    prefix
        .eq_ignore_ascii_case(BINARY_PREFIX)
        .then(|| &key[BINARY_PREFIX.len()..])
}

use AttributeKind as K;
use ValueType as T;

const V01_ATTRIBUTES: &[Attribute] = &[
    attr(K::SpecVersion, "cloudEventsVersion", T::String),
    attr(K::Type, "eventType", T::String),
    attr(K::EventTypeVersion, "eventTypeVersion", T::String),
    attr(K::Source, "source", T::UriRef),
    attr(K::Id, "eventID", T::String),
    attr(K::Time, "eventTime", T::Timestamp),
    attr(K::DataSchema, "schemaURL", T::UriRef),
    attr(K::DataContentType, "contentType", T::String),
];

const V02_ATTRIBUTES: &[Attribute] = &[
    attr(K::SpecVersion, "specversion", T::String),
    attr(K::Type, "type", T::String),
    attr(K::Source, "source", T::UriRef),
    attr(K::Id, "id", T::String),
    attr(K::Time, "time", T::Timestamp),
    attr(K::DataSchema, "schemaurl", T::UriRef),
    attr(K::DataContentType, "contenttype", T::String),
];

const V03_ATTRIBUTES: &[Attribute] = &[
    attr(K::SpecVersion, "specversion", T::String),
    attr(K::Type, "type", T::String),
    attr(K::Source, "source", T::UriRef),
    attr(K::Subject, "subject", T::String),
    attr(K::Id, "id", T::String),
    attr(K::Time, "time", T::Timestamp),
    attr(K::DataSchema, "schemaurl", T::UriRef),
    attr(K::DataContentType, "datacontenttype", T::String),
    attr(K::DataContentEncoding, "datacontentencoding", T::String),
];

const V04_ATTRIBUTES: &[Attribute] = &[
    attr(K::SpecVersion, "specversion", T::String),
    attr(K::Type, "type", T::String),
    attr(K::Source, "source", T::UriRef),
    attr(K::Subject, "subject", T::String),
    attr(K::Id, "id", T::String),
    attr(K::Time, "time", T::Timestamp),
    attr(K::DataSchema, "dataschema", T::UriRef),
    attr(K::DataContentType, "datacontenttype", T::String),
    attr(K::DataContentEncoding, "datacontentencoding", T::String),
];

const V10_ATTRIBUTES: &[Attribute] = &[
    attr(K::SpecVersion, "specversion", T::String),
    attr(K::Type, "type", T::String),
    attr(K::Source, "source", T::UriRef),
    attr(K::Subject, "subject", T::String),
    attr(K::Id, "id", T::String),
    attr(K::Time, "time", T::Timestamp),
    attr(K::DataSchema, "dataschema", T::UriRef),
    attr(K::DataContentType, "datacontenttype", T::String),
];

/// 单个版本的属性表。
#[derive(Debug)]
pub struct VersionSpec {
    version: SpecVersion,
    attributes: &'static [Attribute],
}

static SPECS: [VersionSpec; 5] = [
    VersionSpec {
        version: SpecVersion::V01,
        attributes: V01_ATTRIBUTES,
    },
    VersionSpec {
        version: SpecVersion::V02,
        attributes: V02_ATTRIBUTES,
    },
    VersionSpec {
        version: SpecVersion::V03,
        attributes: V03_ATTRIBUTES,
    },
    VersionSpec {
        version: SpecVersion::V04,
        attributes: V04_ATTRIBUTES,
    },
    VersionSpec {
        version: SpecVersion::V10,
        attributes: V10_ATTRIBUTES,
    },
];

impl VersionSpec {
    /// 查表获取指定版本的属性规格。
    pub fn of(version: SpecVersion) -> &'static VersionSpec {
        match version {
            SpecVersion::V01 => &SPECS[0],
            SpecVersion::V02 => &SPECS[1],
            SpecVersion::V03 => &SPECS[2],
            SpecVersion::V04 => &SPECS[3],
            SpecVersion::V10 => &SPECS[4],
        }
    }

    /// 全部版本的属性规格，按转换链顺序排列。
    pub fn all() -> &'static [VersionSpec] {
        &SPECS
    }

    pub fn version(&self) -> SpecVersion {
        self.version
    }

    /// 属性表，首项为版本属性。
    pub fn attributes(&self) -> &'static [Attribute] {
        self.attributes
    }

    /// 版本属性（v0.1 为 `cloudEventsVersion`，其余为 `specversion`）。
    pub fn version_attribute(&self) -> &'static Attribute {
        &self.attributes[0]
    }

    /// 按线上名称查找属性，大小写不敏感。
    pub fn attribute(&self, name: &str) -> Option<&'static Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
    }

    /// 按语义查找属性。
    pub fn attribute_of(&self, kind: AttributeKind) -> Option<&'static Attribute> {
        self.attributes.iter().find(|attribute| attribute.kind == kind)
    }

    /// 按二进制元数据键查找属性。
    pub fn attribute_for_key(&self, key: &str) -> Option<&'static Attribute> {
        strip_binary_prefix(key).and_then(|name| self.attribute(name))
    }

    /// 构造该版本的空上下文。
    pub fn new_context(&self) -> EventContext {
        EventContext::new(self.version)
    }

    /// 借助 `lookup` 读取元数据，识别消息声明的版本。
    ///
    /// `lookup` 接收不带前缀的属性名（小写）；各版本的版本属性名依次尝试。
    pub fn detect<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Option<&'static VersionSpec> {
        SPECS.iter().rev().find_map(|spec| {
            let name = spec.version_attribute().name.to_ascii_lowercase();
            let declared = lookup(&name)?;
            (SpecVersion::parse(declared) == Some(spec.version)).then_some(spec)
        })
    }
}
