use std::fmt;

use chrono::{DateTime, Utc};

use super::{Extensions, blank, carried, carry_string, write_extensions};
use crate::context::v02::EventContextV02;
use crate::error::Violation;
use crate::types::{UriRef, format_timestamp};
use crate::version::SpecVersion;

/// v0.1 上下文记录。
///
/// v0.1 的属性名采用驼峰式（`eventType`、`cloudEventsVersion`），扩展属性嵌套在 `extensions` 中；
/// `extensions` 为 `Some(空表)` 时视为“出现但为空”，会被校验拒绝。
#[derive(Clone, Debug, PartialEq)]
pub struct EventContextV01 {
    pub cloud_events_version: String,
    pub event_type: String,
    pub event_type_version: Option<String>,
    pub source: UriRef,
    pub event_id: String,
    pub event_time: Option<DateTime<Utc>>,
    pub schema_url: Option<UriRef>,
    pub content_type: Option<String>,
    pub extensions: Option<Extensions>,
}

impl Default for EventContextV01 {
    fn default() -> Self {
        Self {
            cloud_events_version: SpecVersion::V01.as_str().to_owned(),
            event_type: String::new(),
            event_type_version: None,
            source: UriRef::default(),
            event_id: String::new(),
            event_time: None,
            schema_url: None,
            content_type: None,
            extensions: None,
        }
    }
}

impl EventContextV01 {
    pub(crate) fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if blank(&self.event_type) {
            violations.push(Violation::new("eventType", "MUST be a non-empty string"));
        }
        if self.event_type_version.as_deref().is_some_and(blank) {
            violations.push(Violation::new(
                "eventTypeVersion",
                "if present, MUST be a non-empty string",
            ));
        }
        if blank(&self.cloud_events_version) {
            violations.push(Violation::new("cloudEventsVersion", "MUST be a non-empty string"));
        }
        if self.source.is_blank() {
            violations.push(Violation::new("source", "REQUIRED"));
        }
        if blank(&self.event_id) {
            violations.push(Violation::new("eventID", "MUST be a non-empty string"));
        }
        if self.schema_url.as_ref().is_some_and(UriRef::is_blank) {
            violations.push(Violation::new(
                "schemaURL",
                "if present, MUST adhere to the format specified in RFC 3986",
            ));
        }
        if self.content_type.as_deref().is_some_and(blank) {
            violations.push(Violation::new(
                "contentType",
                "if present, MUST adhere to the format specified in RFC 2046",
            ));
        }
        if self.extensions.as_ref().is_some_and(Extensions::is_empty) {
            violations.push(Violation::new(
                "extensions",
                "if present, MUST be a map with at least one entry",
            ));
        }
        violations
    }

    /// 升级到 v0.2：`eventTypeVersion` 没有对应字段，降级为扩展。
    pub(crate) fn to_v02(self) -> EventContextV02 {
        let mut extensions = self.extensions.unwrap_or_default();
        carry_string(&mut extensions, carried::EVENT_TYPE_VERSION, self.event_type_version);
        EventContextV02 {
            spec_version: SpecVersion::V02.as_str().to_owned(),
            event_type: self.event_type,
            source: self.source,
            id: self.event_id,
            time: self.event_time,
            schema_url: self.schema_url,
            content_type: self.content_type,
            extensions,
        }
    }
}

impl fmt::Display for EventContextV01 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Context Attributes,")?;
        writeln!(f, "  cloudEventsVersion: {}", self.cloud_events_version)?;
        writeln!(f, "  eventType: {}", self.event_type)?;
        if let Some(version) = &self.event_type_version {
            writeln!(f, "  eventTypeVersion: {version}")?;
        }
        writeln!(f, "  source: {}", self.source)?;
        writeln!(f, "  eventID: {}", self.event_id)?;
        if let Some(time) = &self.event_time {
            writeln!(f, "  eventTime: {}", format_timestamp(time))?;
        }
        if let Some(schema) = &self.schema_url {
            writeln!(f, "  schemaURL: {schema}")?;
        }
        if let Some(content_type) = &self.content_type {
            writeln!(f, "  contentType: {content_type}")?;
        }
        if let Some(extensions) = &self.extensions {
            write_extensions(f, extensions)?;
        }
        Ok(())
    }
}
