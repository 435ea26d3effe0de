//! 转换钩子：转码完成后对事件（或结构化负载）做最后的改写。
//!
//! # 契约说明（What）
//! - [`Transformer::transform_event`] 接收完整构建的事件，可以任意修改；
//! - [`Transformer::transform_structured`] 作用于结构化负载，默认实现为“解码 → 事件级钩子 → 重新编码”，
//!   因此一个钩子同时适用于两条路径；
//! - [`Transformers`] 按注册顺序依次执行，任一钩子失败即中止。

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::attribute::{AttributeKind, VersionSpec};
use crate::error::EventError;
use crate::event::Event;
use crate::format::Format;
use crate::types::ExtensionValue;

/// 单个转换钩子。
pub trait Transformer: Send + Sync {
    fn transform_event(&self, event: &mut Event) -> Result<(), EventError>;

    fn transform_structured(
        &self,
        format: &'static dyn Format,
        body: Bytes,
    ) -> Result<Bytes, EventError> {
        let mut event = format.unmarshal(&body)?;
        self.transform_event(&mut event)?;
        format.marshal(&event)
    }
}

/// 有序的钩子链，克隆成本为引用计数。
#[derive(Clone, Default)]
pub struct Transformers {
    chain: Vec<Arc<dyn Transformer>>,
}

impl fmt::Debug for Transformers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformers")
            .field("len", &self.chain.len())
            .finish()
    }
}

impl Transformers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transformer: impl Transformer + 'static) {
        self.chain.push(Arc::new(transformer));
    }

    pub fn with(mut self, transformer: impl Transformer + 'static) -> Self {
        self.push(transformer);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn apply_event(&self, event: &mut Event) -> Result<(), EventError> {
        for transformer in &self.chain {
            transformer.transform_event(event)?;
        }
        Ok(())
    }

    pub fn apply_structured(
        &self,
        format: &'static dyn Format,
        mut body: Bytes,
    ) -> Result<Bytes, EventError> {
        for transformer in &self.chain {
            body = transformer.transform_structured(format, body)?;
        }
        Ok(body)
    }
}

/// 写入（覆盖）扩展属性。
#[derive(Clone, Debug)]
pub struct SetExtension {
    name: String,
    value: ExtensionValue,
}

pub fn set_extension(name: impl Into<String>, value: impl Into<ExtensionValue>) -> SetExtension {
    SetExtension {
        name: name.into(),
        value: value.into(),
    }
}

impl Transformer for SetExtension {
    fn transform_event(&self, event: &mut Event) -> Result<(), EventError> {
        event.set_extension(&self.name, self.value.clone());
        Ok(())
    }
}

/// 删除扩展属性；不存在时无操作。
#[derive(Clone, Debug)]
pub struct DeleteExtension {
    name: String,
}

pub fn delete_extension(name: impl Into<String>) -> DeleteExtension {
    DeleteExtension { name: name.into() }
}

impl Transformer for DeleteExtension {
    fn transform_event(&self, event: &mut Event) -> Result<(), EventError> {
        event.remove_extension(&self.name);
        Ok(())
    }
}

/// 按语义写入标准属性，线上名称由事件当前版本的属性表决定。
#[derive(Clone, Debug)]
pub struct SetAttribute {
    kind: AttributeKind,
    value: Option<String>,
}

pub fn set_attribute(kind: AttributeKind, value: Option<String>) -> SetAttribute {
    SetAttribute { kind, value }
}

impl Transformer for SetAttribute {
    fn transform_event(&self, event: &mut Event) -> Result<(), EventError> {
        let version = event.spec_version();
        let attribute = VersionSpec::of(version)
            .attribute_of(self.kind)
            .ok_or_else(|| EventError::UnsupportedAttribute {
                attribute: format!("{:?}", self.kind),
                version,
            })?;
        attribute.set(event.context_mut(), self.value.as_deref())
    }
}

/// 以闭包实现的钩子。
pub struct FnTransformer<F> {
    apply: F,
}

pub fn from_fn<F>(apply: F) -> FnTransformer<F>
where
    F: Fn(&mut Event) -> Result<(), EventError> + Send + Sync,
{
    FnTransformer { apply }
}

impl<F> Transformer for FnTransformer<F>
where
    F: Fn(&mut Event) -> Result<(), EventError> + Send + Sync,
{
    fn transform_event(&self, event: &mut Event) -> Result<(), EventError> {
        (self.apply)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::JSON;
    use crate::version::SpecVersion;

    fn event() -> Event {
        let mut event = Event::new(SpecVersion::V10);
        event.set_id("1");
        event.set_type("t");
        event.set_source("/s");
        event.set_extension("stale", "x");
        event
    }

    #[test]
    fn chain_runs_in_registration_order() {
        let chain = Transformers::new()
            .with(set_extension("hop", "first"))
            .with(set_extension("hop", "second"))
            .with(delete_extension("stale"))
            .with(set_attribute(AttributeKind::Subject, Some("orders".into())));
        let mut event = event();
        chain.apply_event(&mut event).expect("钩子链");
        assert_eq!(event.extension("hop").and_then(ExtensionValue::as_str), Some("second"));
        assert!(event.extension("stale").is_none());
        assert_eq!(event.subject(), Some("orders"));
    }

    #[test]
    fn structured_hook_rewrites_the_payload() {
        let chain = Transformers::new().with(from_fn(|event: &mut Event| {
            event.set_type("rewritten");
            Ok(())
        }));
        let body = JSON.marshal(&event()).expect("编码");
        let rewritten = chain.apply_structured(&JSON, body).expect("结构化钩子");
        assert_eq!(JSON.unmarshal(&rewritten).expect("解码").event_type(), "rewritten");
    }

    #[test]
    fn attribute_missing_from_version_is_rejected() {
        let mut event = event();
        let err = set_attribute(AttributeKind::EventTypeVersion, Some("v2".into()))
            .transform_event(&mut event)
            .expect_err("v1.0 没有 eventTypeVersion");
        assert!(matches!(err, EventError::UnsupportedAttribute { .. }));
    }
}
