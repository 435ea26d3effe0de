use std::fmt;

use chrono::{DateTime, Utc};

use super::{Extensions, blank, write_extensions};
use crate::context::v04::{EventContextV04, restore_encoding};
use crate::error::Violation;
use crate::types::{UriRef, format_timestamp};
use crate::version::SpecVersion;

/// v1.0 上下文记录。
///
/// 相比 v0.4 去掉了 `datacontentencoding`（二进制数据改用 `data_base64` 承载），
/// 并要求扩展名只含小写字母与数字。
#[derive(Clone, Debug, PartialEq)]
pub struct EventContextV1 {
    pub spec_version: String,
    pub event_type: String,
    pub source: UriRef,
    pub subject: Option<String>,
    pub id: String,
    pub time: Option<DateTime<Utc>>,
    pub data_schema: Option<UriRef>,
    pub data_content_type: Option<String>,
    pub extensions: Extensions,
}

impl Default for EventContextV1 {
    fn default() -> Self {
        Self {
            spec_version: SpecVersion::V10.as_str().to_owned(),
            event_type: String::new(),
            source: UriRef::default(),
            subject: None,
            id: String::new(),
            time: None,
            data_schema: None,
            data_content_type: None,
            extensions: Extensions::new(),
        }
    }
}

fn valid_extension_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

impl EventContextV1 {
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
        if self.subject.as_deref().is_some_and(blank) {
            violations.push(Violation::new("subject", "if present, MUST be a non-empty string"));
        }
        if blank(&self.id) {
            violations.push(Violation::new("id", "MUST be a non-empty string"));
        }
        if self
            .data_schema
            .as_ref()
            .is_some_and(|schema| schema.is_blank() || !schema.is_absolute())
        {
            violations.push(Violation::new(
                "dataschema",
                "if present, MUST adhere to the format specified in RFC 3986, Section 4.3. Absolute URI",
            ));
        }
        if self.data_content_type.as_deref().is_some_and(blank) {
            violations.push(Violation::new(
                "datacontenttype",
                "if present, MUST adhere to the format specified in RFC 2046",
            ));
        }
        if !self.extensions.keys().all(|name| valid_extension_name(name)) {
            violations.push(Violation::new(
                "extensions",
                "names MUST consist of lower-case letters or digits",
            ));
        }
        violations
    }

    pub(crate) fn to_v04(self) -> EventContextV04 {
        let mut extensions = self.extensions;
        let data_content_encoding = restore_encoding(&mut extensions);
        EventContextV04 {
            spec_version: SpecVersion::V04.as_str().to_owned(),
            event_type: self.event_type,
            source: self.source,
            subject: self.subject,
            id: self.id,
            time: self.time,
            data_schema: self.data_schema,
            data_content_type: self.data_content_type,
            data_content_encoding,
            extensions,
        }
    }
}

impl fmt::Display for EventContextV1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Context Attributes,")?;
        writeln!(f, "  specversion: {}", self.spec_version)?;
        writeln!(f, "  type: {}", self.event_type)?;
        writeln!(f, "  source: {}", self.source)?;
        if let Some(subject) = &self.subject {
            writeln!(f, "  subject: {subject}")?;
        }
        writeln!(f, "  id: {}", self.id)?;
        if let Some(time) = &self.time {
            writeln!(f, "  time: {}", format_timestamp(time))?;
        }
        if let Some(schema) = &self.data_schema {
            writeln!(f, "  dataschema: {schema}")?;
        }
        if let Some(content_type) = &self.data_content_type {
            writeln!(f, "  datacontenttype: {content_type}")?;
        }
        write_extensions(f, &self.extensions)
    }
}
