//! 版本矩阵：各规范版本的上下文记录、逐级转换与结构校验。
//!
//! # 设计背景（Why）
//! - 五个版本的属性集合与命名各不相同，但调用方需要“版本多态”地读写同一组能力：
//!   读写扩展、转换到任意版本、校验、格式化输出；
//! - 以封闭枚举 [`EventContext`] 承载五个变体，所有共享能力在枚举上实现一次，变体只负责
//!   “朝相邻版本走一步”的转换函数与本版本的校验规则。
//!
//! # 契约说明（What）
//! - [`EventContext::convert`] 永不失败：目标版本没有落脚点的字段降级为扩展属性，回到拥有该字段的版本时再还原；
//! - [`EventContext::validate`] 返回全部违规项（见 [`ValidationError`]），从不只报告第一项；
//! - [`EventContext::extension_as`] 先尝试把 JSON/原始字节形态的值按目标类型解码，再退化为字符串赋值。
//!
//! # 风险提示（Trade-offs）
//! - 字段保持 `pub`，便于测试与格式层直接构造；维护者新增字段时必须同步更新
//!   [`crate::attribute`] 中对应版本的属性表，否则二进制编解码会遗漏该字段。

mod v01;
mod v02;
mod v03;
mod v04;
mod v1;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use v01::EventContextV01;
pub use v02::EventContextV02;
pub use v03::EventContextV03;
pub use v04::EventContextV04;
pub use v1::EventContextV1;

use crate::error::{EventError, ValidationError, Violation};
use crate::types::{ExtensionValue, UriRef};
use crate::version::SpecVersion;

/// 扩展属性表：名称唯一，顺序无关。
pub type Extensions = BTreeMap<String, ExtensionValue>;

/// `datacontentencoding` 唯一允许的取值。
pub const BASE64: &str = "base64";

/// 降级为扩展属性时使用的键名，均为小写字母数字，满足 v1.0 的扩展命名规则。
pub(crate) mod carried {
    pub const EVENT_TYPE_VERSION: &str = "eventtypeversion";
    pub const SUBJECT: &str = "subject";
    pub const DATA_CONTENT_ENCODING: &str = "datacontentencoding";
}

static EMPTY_EXTENSIONS: Extensions = BTreeMap::new();

/// 取出字符串形态的扩展值；非字符串形态保留在表中，避免静默丢弃。
pub(crate) fn take_string_extension(extensions: &mut Extensions, key: &str) -> Option<String> {
    let value = extensions.get(key)?.as_str()?.to_owned();
    extensions.remove(key);
    Some(value)
}

/// 将可选字符串写入扩展表。
pub(crate) fn carry_string(extensions: &mut Extensions, key: &str, value: Option<String>) {
    if let Some(value) = value {
        extensions.insert(key.to_owned(), ExtensionValue::String(value));
    }
}

/// 版本多态的事件上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：以封闭变体取代“按结构体标签鸭子类型”的多态，编译期即可穷举全部版本；
/// - **契约 (What)**：任何变体都暴露相同的能力集合；变体标签即事件的规范版本；
/// - **执行 (How)**：跨版本转换沿固定链逐级调用各变体的 `to_*` 相邻转换函数。
#[derive(Clone, Debug, PartialEq)]
pub enum EventContext {
    V01(EventContextV01),
    V02(EventContextV02),
    V03(EventContextV03),
    V04(EventContextV04),
    V10(EventContextV1),
}

impl EventContext {
    /// 构造指定版本的空上下文（仅填充版本字符串）。
    pub fn new(version: SpecVersion) -> Self {
        match version {
            SpecVersion::V01 => EventContext::V01(EventContextV01::default()),
            SpecVersion::V02 => EventContext::V02(EventContextV02::default()),
            SpecVersion::V03 => EventContext::V03(EventContextV03::default()),
            SpecVersion::V04 => EventContext::V04(EventContextV04::default()),
            SpecVersion::V10 => EventContext::V10(EventContextV1::default()),
        }
    }

    /// 上下文所属的规范版本。
    pub fn spec_version(&self) -> SpecVersion {
        match self {
            EventContext::V01(_) => SpecVersion::V01,
            EventContext::V02(_) => SpecVersion::V02,
            EventContext::V03(_) => SpecVersion::V03,
            EventContext::V04(_) => SpecVersion::V04,
            EventContext::V10(_) => SpecVersion::V10,
        }
    }

    /// 记录在线上的版本字符串（校验会检查其非空）。
    pub fn spec_version_str(&self) -> &str {
        match self {
            EventContext::V01(ctx) => &ctx.cloud_events_version,
            EventContext::V02(ctx) => &ctx.spec_version,
            EventContext::V03(ctx) => &ctx.spec_version,
            EventContext::V04(ctx) => &ctx.spec_version,
            EventContext::V10(ctx) => &ctx.spec_version,
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            EventContext::V01(ctx) => &ctx.event_type,
            EventContext::V02(ctx) => &ctx.event_type,
            EventContext::V03(ctx) => &ctx.event_type,
            EventContext::V04(ctx) => &ctx.event_type,
            EventContext::V10(ctx) => &ctx.event_type,
        }
    }

    pub fn set_event_type(&mut self, value: impl Into<String>) {
        let value = value.into();
        match self {
            EventContext::V01(ctx) => ctx.event_type = value,
            EventContext::V02(ctx) => ctx.event_type = value,
            EventContext::V03(ctx) => ctx.event_type = value,
            EventContext::V04(ctx) => ctx.event_type = value,
            EventContext::V10(ctx) => ctx.event_type = value,
        }
    }

    pub fn source(&self) -> &UriRef {
        match self {
            EventContext::V01(ctx) => &ctx.source,
            EventContext::V02(ctx) => &ctx.source,
            EventContext::V03(ctx) => &ctx.source,
            EventContext::V04(ctx) => &ctx.source,
            EventContext::V10(ctx) => &ctx.source,
        }
    }

    pub fn set_source(&mut self, value: impl Into<UriRef>) {
        let value = value.into();
        match self {
            EventContext::V01(ctx) => ctx.source = value,
            EventContext::V02(ctx) => ctx.source = value,
            EventContext::V03(ctx) => ctx.source = value,
            EventContext::V04(ctx) => ctx.source = value,
            EventContext::V10(ctx) => ctx.source = value,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EventContext::V01(ctx) => &ctx.event_id,
            EventContext::V02(ctx) => &ctx.id,
            EventContext::V03(ctx) => &ctx.id,
            EventContext::V04(ctx) => &ctx.id,
            EventContext::V10(ctx) => &ctx.id,
        }
    }

    pub fn set_id(&mut self, value: impl Into<String>) {
        let value = value.into();
        match self {
            EventContext::V01(ctx) => ctx.event_id = value,
            EventContext::V02(ctx) => ctx.id = value,
            EventContext::V03(ctx) => ctx.id = value,
            EventContext::V04(ctx) => ctx.id = value,
            EventContext::V10(ctx) => ctx.id = value,
        }
    }

    pub fn time(&self) -> Option<&DateTime<Utc>> {
        match self {
            EventContext::V01(ctx) => ctx.event_time.as_ref(),
            EventContext::V02(ctx) => ctx.time.as_ref(),
            EventContext::V03(ctx) => ctx.time.as_ref(),
            EventContext::V04(ctx) => ctx.time.as_ref(),
            EventContext::V10(ctx) => ctx.time.as_ref(),
        }
    }

    pub fn set_time(&mut self, value: Option<DateTime<Utc>>) {
        match self {
            EventContext::V01(ctx) => ctx.event_time = value,
            EventContext::V02(ctx) => ctx.time = value,
            EventContext::V03(ctx) => ctx.time = value,
            EventContext::V04(ctx) => ctx.time = value,
            EventContext::V10(ctx) => ctx.time = value,
        }
    }

    /// 数据 schema 引用（v0.1–v0.3 为 `schemaurl`，v0.4 起为 `dataschema`）。
    pub fn data_schema(&self) -> Option<&UriRef> {
        match self {
            EventContext::V01(ctx) => ctx.schema_url.as_ref(),
            EventContext::V02(ctx) => ctx.schema_url.as_ref(),
            EventContext::V03(ctx) => ctx.schema_url.as_ref(),
            EventContext::V04(ctx) => ctx.data_schema.as_ref(),
            EventContext::V10(ctx) => ctx.data_schema.as_ref(),
        }
    }

    pub fn set_data_schema(&mut self, value: Option<UriRef>) {
        match self {
            EventContext::V01(ctx) => ctx.schema_url = value,
            EventContext::V02(ctx) => ctx.schema_url = value,
            EventContext::V03(ctx) => ctx.schema_url = value,
            EventContext::V04(ctx) => ctx.data_schema = value,
            EventContext::V10(ctx) => ctx.data_schema = value,
        }
    }

    /// 数据内容类型（v0.1/v0.2 为 `contentType`/`contenttype`）。
    pub fn data_content_type(&self) -> Option<&str> {
        match self {
            EventContext::V01(ctx) => ctx.content_type.as_deref(),
            EventContext::V02(ctx) => ctx.content_type.as_deref(),
            EventContext::V03(ctx) => ctx.data_content_type.as_deref(),
            EventContext::V04(ctx) => ctx.data_content_type.as_deref(),
            EventContext::V10(ctx) => ctx.data_content_type.as_deref(),
        }
    }

    pub fn set_data_content_type(&mut self, value: Option<String>) {
        match self {
            EventContext::V01(ctx) => ctx.content_type = value,
            EventContext::V02(ctx) => ctx.content_type = value,
            EventContext::V03(ctx) => ctx.data_content_type = value,
            EventContext::V04(ctx) => ctx.data_content_type = value,
            EventContext::V10(ctx) => ctx.data_content_type = value,
        }
    }

    /// 去掉参数后的媒体类型，例如 `text/html; charset=utf-8` → `text/html`。
    pub fn data_media_type(&self) -> Option<&str> {
        let content_type = self.data_content_type()?;
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        if media_type.is_empty() || media_type.contains('=') {
            None
        } else {
            Some(media_type)
        }
    }

    /// 事件主题；v0.3 之前没有原生字段，读取同名扩展。
    pub fn subject(&self) -> Option<&str> {
        match self {
            EventContext::V01(_) | EventContext::V02(_) => self
                .extension(carried::SUBJECT)
                .and_then(ExtensionValue::as_str),
            EventContext::V03(ctx) => ctx.subject.as_deref(),
            EventContext::V04(ctx) => ctx.subject.as_deref(),
            EventContext::V10(ctx) => ctx.subject.as_deref(),
        }
    }

    pub fn set_subject(&mut self, value: Option<String>) {
        if self.spec_version() < SpecVersion::V03 {
            self.set_extension(carried::SUBJECT, value.map(ExtensionValue::String));
            return;
        }
        match self {
            EventContext::V01(_) | EventContext::V02(_) => {}
            EventContext::V03(ctx) => ctx.subject = value,
            EventContext::V04(ctx) => ctx.subject = value,
            EventContext::V10(ctx) => ctx.subject = value,
        }
    }

    /// 数据内容编码，仅 v0.3/v0.4 原生支持。
    pub fn data_content_encoding(&self) -> Option<&str> {
        match self {
            EventContext::V03(ctx) => ctx.data_content_encoding.as_deref(),
            EventContext::V04(ctx) => ctx.data_content_encoding.as_deref(),
            _ => None,
        }
    }

    /// 全部扩展属性。
    pub fn extensions(&self) -> &Extensions {
        match self {
            EventContext::V01(ctx) => ctx.extensions.as_ref().unwrap_or(&EMPTY_EXTENSIONS),
            EventContext::V02(ctx) => &ctx.extensions,
            EventContext::V03(ctx) => &ctx.extensions,
            EventContext::V04(ctx) => &ctx.extensions,
            EventContext::V10(ctx) => &ctx.extensions,
        }
    }

    /// 按名称读取扩展。
    ///
    /// v1.0 的扩展名在写入时已转为小写，读取时同样按小写查找。
    pub fn extension(&self, name: &str) -> Option<&ExtensionValue> {
        match self {
            EventContext::V10(ctx) => ctx.extensions.get(name.to_ascii_lowercase().as_str()),
            _ => self.extensions().get(name),
        }
    }

    /// 写入或删除（`None`）扩展属性。
    ///
    /// v1.0 要求扩展名为小写，写入时统一转小写；v0.1 在扩展表清空后恢复为“未设置”状态。
    ///
    /// # 保留扩展名
    /// 版本转换时，目标版本没有原生字段的属性借用同名扩展承载：
    /// - `subject`：v0.1/v0.2 上下文；
    /// - `datacontentencoding`：v0.1/v0.2/v1.0 上下文；
    /// - `eventtypeversion`：v0.2 及以后的上下文。
    ///
    /// 在这些上下文上写入同名扩展，等同于写入对应属性：升级时它被还原为原生字段；
    /// 降级时若源上下文已有原生取值，则以原生取值为准覆盖同名扩展。
    pub fn set_extension(&mut self, name: &str, value: Option<ExtensionValue>) {
        match self {
            EventContext::V01(ctx) => {
                let extensions = ctx.extensions.get_or_insert_with(Extensions::new);
                match value {
                    Some(value) => {
                        extensions.insert(name.to_owned(), value);
                    }
                    None => {
                        extensions.remove(name);
                    }
                }
                if extensions.is_empty() {
                    ctx.extensions = None;
                }
            }
            EventContext::V02(ctx) => upsert(&mut ctx.extensions, name.to_owned(), value),
            EventContext::V03(ctx) => upsert(&mut ctx.extensions, name.to_owned(), value),
            EventContext::V04(ctx) => upsert(&mut ctx.extensions, name.to_owned(), value),
            EventContext::V10(ctx) => upsert(&mut ctx.extensions, name.to_ascii_lowercase(), value),
        }
    }

    /// 按调用方期望的类型读取扩展。
    ///
    /// # 执行逻辑（How）
    /// 1. 扩展不存在时返回 [`EventError::ExtensionNotFound`]；
    /// 2. JSON 形态或原始字节形态的值先尝试按 JSON 解码为 `T`；
    /// 3. 解码失败或值为标量时，退化为“以字符串形态赋值”；仍失败则返回 [`EventError::ExtensionTypeMismatch`]。
    pub fn extension_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, EventError> {
        let value = self
            .extension(name)
            .ok_or_else(|| EventError::ExtensionNotFound {
                name: name.to_owned(),
            })?;

        let decoded = match value {
            ExtensionValue::Json(raw) => serde_json::from_value::<T>(raw.clone()).ok(),
            ExtensionValue::Binary(raw) => serde_json::from_slice::<T>(raw).ok(),
            _ => serde_json::from_value::<T>(value.to_json()).ok(),
        };
        if let Some(decoded) = decoded {
            return Ok(decoded);
        }

        serde_json::from_value::<T>(Value::String(value.to_wire_string())).map_err(|err| {
            EventError::ExtensionTypeMismatch {
                name: name.to_owned(),
                detail: err.to_string(),
            }
        })
    }

    /// 列出全部违规项；空列表表示合法。
    pub fn violations(&self) -> Vec<Violation> {
        match self {
            EventContext::V01(ctx) => ctx.violations(),
            EventContext::V02(ctx) => ctx.violations(),
            EventContext::V03(ctx) => ctx.violations(),
            EventContext::V04(ctx) => ctx.violations(),
            EventContext::V10(ctx) => ctx.violations(),
        }
    }

    /// 按版本规则校验，失败时携带全部违规项。
    pub fn validate(&self) -> Result<(), ValidationError> {
        match ValidationError::from_violations(self.violations()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// 转换为目标版本（克隆后沿转换链逐级迁移）。
    pub fn convert(&self, target: SpecVersion) -> EventContext {
        self.clone().into_version(target)
    }

    /// 消耗自身并沿固定链逐级迁移到目标版本。
    pub fn into_version(self, target: SpecVersion) -> EventContext {
        let mut current = self;
        while let Some(next) = current.spec_version().step_toward(target) {
            current = current.step(next);
        }
        current.normalize_version_string();
        current
    }

    /// 走一步：只允许相邻版本之间的转换。
    fn step(self, next: SpecVersion) -> EventContext {
        match (self, next) {
            (EventContext::V01(ctx), SpecVersion::V02) => EventContext::V02(ctx.to_v02()),
            (EventContext::V02(ctx), SpecVersion::V01) => EventContext::V01(ctx.to_v01()),
            (EventContext::V02(ctx), SpecVersion::V03) => EventContext::V03(ctx.to_v03()),
            (EventContext::V03(ctx), SpecVersion::V02) => EventContext::V02(ctx.to_v02()),
            (EventContext::V03(ctx), SpecVersion::V04) => EventContext::V04(ctx.to_v04()),
            (EventContext::V04(ctx), SpecVersion::V03) => EventContext::V03(ctx.to_v03()),
            (EventContext::V04(ctx), SpecVersion::V10) => EventContext::V10(ctx.to_v1()),
            (EventContext::V10(ctx), SpecVersion::V04) => EventContext::V04(ctx.to_v04()),
            // `step_toward` 只会给出相邻版本，其余组合不可达；原样返回保持总函数语义。
            (other, _) => other,
        }
    }

    /// 转换后的上下文总是携带规范的版本字符串。
    fn normalize_version_string(&mut self) {
        let canonical = self.spec_version().as_str().to_owned();
        match self {
            EventContext::V01(ctx) => ctx.cloud_events_version = canonical,
            EventContext::V02(ctx) => ctx.spec_version = canonical,
            EventContext::V03(ctx) => ctx.spec_version = canonical,
            EventContext::V04(ctx) => ctx.spec_version = canonical,
            EventContext::V10(ctx) => ctx.spec_version = canonical,
        }
    }

    pub fn as_v01(&self) -> EventContextV01 {
        match self.convert(SpecVersion::V01) {
            EventContext::V01(ctx) => ctx,
            _ => EventContextV01::default(),
        }
    }

    pub fn as_v02(&self) -> EventContextV02 {
        match self.convert(SpecVersion::V02) {
            EventContext::V02(ctx) => ctx,
            _ => EventContextV02::default(),
        }
    }

    pub fn as_v03(&self) -> EventContextV03 {
        match self.convert(SpecVersion::V03) {
            EventContext::V03(ctx) => ctx,
            _ => EventContextV03::default(),
        }
    }

    pub fn as_v04(&self) -> EventContextV04 {
        match self.convert(SpecVersion::V04) {
            EventContext::V04(ctx) => ctx,
            _ => EventContextV04::default(),
        }
    }

    pub fn as_v1(&self) -> EventContextV1 {
        match self.convert(SpecVersion::V10) {
            EventContext::V10(ctx) => ctx,
            _ => EventContextV1::default(),
        }
    }
}

fn upsert(extensions: &mut Extensions, name: String, value: Option<ExtensionValue>) {
    match value {
        Some(value) => {
            extensions.insert(name, value);
        }
        None => {
            extensions.remove(&name);
        }
    }
}

/// 输出扩展区块，按键名排序。
pub(crate) fn write_extensions(f: &mut fmt::Formatter<'_>, extensions: &Extensions) -> fmt::Result {
    if extensions.is_empty() {
        return Ok(());
    }
    writeln!(f, "Extensions,")?;
    for (key, value) in extensions {
        writeln!(f, "  {key}: {value}")?;
    }
    Ok(())
}

/// 非空判定统一使用去除首尾空白后的结果。
pub(crate) fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl fmt::Display for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventContext::V01(ctx) => ctx.fmt(f),
            EventContext::V02(ctx) => ctx.fmt(f),
            EventContext::V03(ctx) => ctx.fmt(f),
            EventContext::V04(ctx) => ctx.fmt(f),
            EventContext::V10(ctx) => ctx.fmt(f),
        }
    }
}

impl From<EventContextV01> for EventContext {
    fn from(value: EventContextV01) -> Self {
        EventContext::V01(value)
    }
}

impl From<EventContextV02> for EventContext {
    fn from(value: EventContextV02) -> Self {
        EventContext::V02(value)
    }
}

impl From<EventContextV03> for EventContext {
    fn from(value: EventContextV03) -> Self {
        EventContext::V03(value)
    }
}

impl From<EventContextV04> for EventContext {
    fn from(value: EventContextV04) -> Self {
        EventContext::V04(value)
    }
}

impl From<EventContextV1> for EventContext {
    fn from(value: EventContextV1) -> Self {
        EventContext::V10(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_extension_lookup_ignores_case() {
        let mut ctx = EventContext::new(SpecVersion::V10);
        ctx.set_extension("traceParent", Some("00-abc".into()));

        assert_eq!(ctx.extension("traceparent").and_then(ExtensionValue::as_str), Some("00-abc"));
        assert_eq!(ctx.extension("traceParent").and_then(ExtensionValue::as_str), Some("00-abc"));
        assert_eq!(ctx.extension_as::<String>("TRACEPARENT").expect("按小写查找"), "00-abc");

        ctx.set_extension("TraceParent", None);
        assert!(ctx.extension("traceparent").is_none());
    }

    #[test]
    fn reserved_extension_names_act_as_carried_attributes() {
        let mut v02 = EventContext::new(SpecVersion::V02);
        v02.set_extension("subject", Some("orders/1".into()));
        let upgraded = v02.convert(SpecVersion::V03);
        assert_eq!(upgraded.subject(), Some("orders/1"));
        assert!(upgraded.extension("subject").is_none());

        let mut v03 = EventContext::new(SpecVersion::V03);
        v03.set_subject(Some("native".into()));
        v03.set_extension("subject", Some("shadow".into()));
        let downgraded = v03.convert(SpecVersion::V02);
        assert_eq!(downgraded.subject(), Some("native"));
        assert_eq!(
            downgraded.extension("subject").and_then(ExtensionValue::as_str),
            Some("native")
        );
    }

    #[test]
    fn extension_as_decodes_json_then_falls_back_to_string() {
        let mut ctx = EventContext::new(SpecVersion::V10);
        ctx.set_extension("count", Some(ExtensionValue::Json(serde_json::json!(7))));
        ctx.set_extension("label", Some("blue".into()));
        ctx.set_extension("raw", Some(ExtensionValue::Binary(b"[1,2]".to_vec())));

        assert_eq!(ctx.extension_as::<u32>("count").expect("JSON 数字"), 7);
        assert_eq!(ctx.extension_as::<String>("label").expect("字符串"), "blue");
        assert_eq!(ctx.extension_as::<Vec<u8>>("raw").expect("原始字节按 JSON 解码"), vec![1, 2]);
        assert_eq!(
            ctx.extension_as::<String>("count").expect("退化为字符串赋值"),
            "7"
        );
    }

    #[test]
    fn extension_as_reports_missing_and_mismatched_values() {
        let mut ctx = EventContext::new(SpecVersion::V03);
        ctx.set_extension("flag", Some("definitely".into()));

        assert!(matches!(
            ctx.extension_as::<String>("absent"),
            Err(EventError::ExtensionNotFound { .. })
        ));
        assert!(matches!(
            ctx.extension_as::<bool>("flag"),
            Err(EventError::ExtensionTypeMismatch { .. })
        ));
    }

    #[test]
    fn v01_extensions_return_to_unset_when_emptied() {
        let mut ctx = EventContext::new(SpecVersion::V01);
        ctx.set_extension("trace", Some("abc".into()));
        ctx.set_extension("trace", None);
        match &ctx {
            EventContext::V01(inner) => assert!(inner.extensions.is_none()),
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn media_type_strips_parameters() {
        let mut ctx = EventContext::new(SpecVersion::V01);
        assert_eq!(ctx.data_media_type(), None);
        ctx.set_data_content_type(Some("charset=utf-8".into()));
        assert_eq!(ctx.data_media_type(), None);
        ctx.set_data_content_type(Some("text/html; charset=utf-8".into()));
        assert_eq!(ctx.data_media_type(), Some("text/html"));
        ctx.set_data_content_type(Some("application/json".into()));
        assert_eq!(ctx.data_media_type(), Some("application/json"));
    }

    #[test]
    fn subject_lives_in_extensions_before_v03() {
        let mut ctx = EventContext::new(SpecVersion::V02);
        ctx.set_subject(Some("orders/42".into()));
        assert_eq!(ctx.subject(), Some("orders/42"));

        let upgraded = ctx.convert(SpecVersion::V03);
        assert_eq!(upgraded.subject(), Some("orders/42"));
        assert!(upgraded.extension(carried::SUBJECT).is_none(), "升级后应回到原生字段");
    }
}
