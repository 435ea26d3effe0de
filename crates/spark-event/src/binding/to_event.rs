//! 消息 → 事件。
//!
//! # 执行逻辑（How）
//! 1. 沿包装链寻找已解码的事件；找到则直接克隆，不重新解码；
//! 2. 否则按消息报告的表示选择结构化或二进制解码；
//! 3. 其余表示返回 [`EventError::CannotConvert`]，只影响当前消息；
//! 4. 最后依次执行事件级转换钩子。

use bytes::Bytes;

use super::Encoding;
use super::message::{BinaryWriter, Message, StructuredWriter};
use super::transformer::Transformers;
use crate::attribute::Attribute;
use crate::error::EventError;
use crate::event::Event;
use crate::format::Format;
use crate::types::ExtensionValue;

/// 把消息转换为事件，同时返回消息原本的表示。
pub fn to_event(
    message: &Message,
    transformers: &Transformers,
) -> Result<(Event, Encoding), EventError> {
    let (mut event, encoding) = match message.find_event() {
        Some(event) => (event.clone(), Encoding::Event),
        None => {
            let encoding = message.encoding();
            let mut builder = EventBuilder::default();
            match encoding {
                Encoding::Structured => message.read_structured(&mut builder)?,
                Encoding::Binary => message.read_binary(&mut builder)?,
                Encoding::Event | Encoding::Batched | Encoding::Unknown => {
                    return Err(EventError::CannotConvert);
                }
            }
            (builder.event, encoding)
        }
    };
    transformers.apply_event(&mut event)?;
    Ok((event, encoding))
}

/// 同时充当结构化与二进制写入端，把读取到的内容组装为事件。
#[derive(Debug, Default)]
struct EventBuilder {
    event: Event,
}

impl StructuredWriter for EventBuilder {
    fn set_structured_event(
        &mut self,
        format: &'static dyn Format,
        body: Bytes,
    ) -> Result<(), EventError> {
        self.event = format.unmarshal(&body)?;
        Ok(())
    }
}

impl BinaryWriter for EventBuilder {
    fn set_attribute(
        &mut self,
        attribute: &'static Attribute,
        value: Option<&str>,
    ) -> Result<(), EventError> {
        attribute.set(self.event.context_mut(), value)
    }

    fn set_extension(&mut self, name: &str, value: &ExtensionValue) -> Result<(), EventError> {
        self.event.set_extension(name, value.clone());
        Ok(())
    }

    fn set_data(&mut self, data: Bytes) -> Result<(), EventError> {
        self.event.set_data_bytes(None, data);
        Ok(())
    }
}
