use std::fmt;

use chrono::{DateTime, Utc};

use super::{Extensions, blank, carried, carry_string, take_string_extension, write_extensions};
use crate::context::v01::EventContextV01;
use crate::context::v03::EventContextV03;
use crate::error::Violation;
use crate::types::{UriRef, format_timestamp};
use crate::version::SpecVersion;

/// v0.2 上下文记录：属性名改为全小写，扩展属性与标准属性平级。
#[derive(Clone, Debug, PartialEq)]
pub struct EventContextV02 {
    pub spec_version: String,
    pub event_type: String,
    pub source: UriRef,
    pub id: String,
    pub time: Option<DateTime<Utc>>,
    pub schema_url: Option<UriRef>,
    pub content_type: Option<String>,
    pub extensions: Extensions,
}

impl Default for EventContextV02 {
    fn default() -> Self {
        Self {
            spec_version: SpecVersion::V02.as_str().to_owned(),
            event_type: String::new(),
            source: UriRef::default(),
            id: String::new(),
            time: None,
            schema_url: None,
            content_type: None,
            extensions: Extensions::new(),
        }
    }
}

impl EventContextV02 {
    pub(crate) fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if blank(&self.event_type) {
            violations.push(Violation::new("type", "MUST be a non-empty string"));
        }
        if blank(&self.spec_version) {
            violations.push(Violation::new("specversion", "MUST be a non-empty string"));
        }
        if self.source.is_blank() {
            violations.push(Violation::new("source", "REQUIRED"));
        }
        if blank(&self.id) {
            violations.push(Violation::new("id", "MUST be a non-empty string"));
        }
        if self.schema_url.as_ref().is_some_and(UriRef::is_blank) {
            violations.push(Violation::new(
                "schemaurl",
                "if present, MUST adhere to the format specified in RFC 3986",
            ));
        }
        if self.content_type.as_deref().is_some_and(blank) {
            violations.push(Violation::new(
                "contenttype",
                "if present, MUST adhere to the format specified in RFC 2046",
            ));
        }
        violations
    }

    /// 降级到 v0.1：尝试从扩展中还原 `eventTypeVersion`。
    pub(crate) fn to_v01(self) -> EventContextV01 {
        let mut extensions = self.extensions;
        let event_type_version = take_string_extension(&mut extensions, carried::EVENT_TYPE_VERSION);
        EventContextV01 {
            cloud_events_version: SpecVersion::V01.as_str().to_owned(),
            event_type: self.event_type,
            event_type_version,
            source: self.source,
            event_id: self.id,
            event_time: self.time,
            schema_url: self.schema_url,
            content_type: self.content_type,
            extensions: (!extensions.is_empty()).then_some(extensions),
        }
    }

    /// 升级到 v0.3：`subject` 与 `datacontentencoding` 若以扩展形式存在，则回到原生字段。
    pub(crate) fn to_v03(self) -> EventContextV03 {
        let mut extensions = self.extensions;
        let subject = take_string_extension(&mut extensions, carried::SUBJECT);
        let data_content_encoding =
            take_string_extension(&mut extensions, carried::DATA_CONTENT_ENCODING);
        EventContextV03 {
            spec_version: SpecVersion::V03.as_str().to_owned(),
            event_type: self.event_type,
            source: self.source,
            subject,
            id: self.id,
            time: self.time,
            schema_url: self.schema_url,
            data_content_type: self.content_type,
            data_content_encoding,
            extensions,
        }
    }
}

/// v0.3 降级时调用，把 v0.2 缺失的字段塞回扩展。
pub(crate) fn carry_into_extensions(
    extensions: &mut Extensions,
    subject: Option<String>,
    data_content_encoding: Option<String>,
) {
    carry_string(extensions, carried::SUBJECT, subject);
    carry_string(extensions, carried::DATA_CONTENT_ENCODING, data_content_encoding);
}

impl fmt::Display for EventContextV02 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Context Attributes,")?;
        writeln!(f, "  specversion: {}", self.spec_version)?;
        writeln!(f, "  type: {}", self.event_type)?;
        writeln!(f, "  source: {}", self.source)?;
        writeln!(f, "  id: {}", self.id)?;
        if let Some(time) = &self.time {
            writeln!(f, "  time: {}", format_timestamp(time))?;
        }
        if let Some(schema) = &self.schema_url {
            writeln!(f, "  schemaurl: {schema}")?;
        }
        if let Some(content_type) = &self.content_type {
            writeln!(f, "  contenttype: {content_type}")?;
        }
        write_extensions(f, &self.extensions)
    }
}
