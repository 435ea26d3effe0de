//! 事件 → 写入器，以及任意消息到目标编码的通用写入流程。
//!
//! # 设计背景（Why）
//! - 出站方向的线上字节由各传输的写入器决定，本模块只定义“事件 + 目标编码 + 钩子 → 写入器调用序列”；
//! - 二进制编码完全由 [`VersionSpec`] 属性表驱动，新增版本不需要改动这里。
//!
//! # 执行逻辑（How）
//! [`write`] 的决策顺序：
//! 1. 没有钩子且源表示与目标偏好相容时直接透传（结构化 → 结构化、二进制 → 二进制），不解码；
//! 2. 结构化源表示 + 存在钩子：执行结构化负载级钩子后透传；
//! 3. 其余情况先 [`to_event`] 再按偏好直接编码。

use bytes::Bytes;

use super::Encoding;
use super::message::{BinaryWriter, Message, StructuredWriter};
use super::to_event::to_event;
use super::transformer::Transformers;
use crate::attribute::VersionSpec;
use crate::contract::EncodingPreference;
use crate::error::EventError;
use crate::event::Event;
use crate::format::{Format, JSON};

/// 以结构化格式编码事件并写入。
pub fn write_structured(
    event: &Event,
    format: &'static dyn Format,
    writer: &mut dyn StructuredWriter,
) -> Result<(), EventError> {
    let body = format.marshal(event)?;
    writer.set_structured_event(format, body)
}

/// 按事件版本的属性表逐项写出属性、扩展与负载。版本属性总是第一个写出。
pub fn write_binary(event: &Event, writer: &mut dyn BinaryWriter) -> Result<(), EventError> {
    let ctx = event.context();
    writer.start()?;
    for attribute in VersionSpec::of(ctx.spec_version()).attributes() {
        if let Some(value) = attribute.get(ctx) {
            writer.set_attribute(attribute, Some(&value))?;
        }
    }
    for (name, value) in ctx.extensions() {
        writer.set_extension(name, value)?;
    }
    if let Some(data) = event.data() {
        writer.set_data(data.clone())?;
    }
    writer.end()
}

/// 把任意消息写入同时支持两种表示的写入器，返回实际写出的表示。
pub fn write<W>(
    message: &Message,
    writer: &mut W,
    preference: EncodingPreference,
    transformers: &Transformers,
) -> Result<Encoding, EventError>
where
    W: StructuredWriter + BinaryWriter,
{
    match message.encoding() {
        Encoding::Structured if preference != EncodingPreference::Binary => {
            if transformers.is_empty() {
                message.read_structured(writer)?;
            } else {
                let mut captured = CapturedStructured::default();
                message.read_structured(&mut captured)?;
                let (format, body) = captured.take()?;
                let body = transformers.apply_structured(format, body)?;
                writer.set_structured_event(format, body)?;
            }
            return Ok(Encoding::Structured);
        }
        Encoding::Binary
            if preference != EncodingPreference::Structured && transformers.is_empty() =>
        {
            message.read_binary(writer)?;
            return Ok(Encoding::Binary);
        }
        _ => {}
    }

    let (event, _) = to_event(message, transformers)?;
    if preference == EncodingPreference::Structured {
        write_structured(&event, &JSON, writer)?;
        Ok(Encoding::Structured)
    } else {
        write_binary(&event, writer)?;
        Ok(Encoding::Binary)
    }
}

#[derive(Default)]
struct CapturedStructured {
    captured: Option<(&'static dyn Format, Bytes)>,
}

impl CapturedStructured {
    fn take(self) -> Result<(&'static dyn Format, Bytes), EventError> {
        self.captured.ok_or(EventError::CannotConvert)
    }
}

impl StructuredWriter for CapturedStructured {
    fn set_structured_event(
        &mut self,
        format: &'static dyn Format,
        body: Bytes,
    ) -> Result<(), EventError> {
        self.captured = Some((format, body));
        Ok(())
    }
}
