use std::fmt;

use chrono::{DateTime, Utc};

use super::{BASE64, Extensions, blank, write_extensions};
use crate::context::v02::{EventContextV02, carry_into_extensions};
use crate::context::v04::EventContextV04;
use crate::error::Violation;
use crate::types::{UriRef, format_timestamp};
use crate::version::SpecVersion;

/// v0.3 上下文记录：新增 `subject` 与 `datacontentencoding`，`contenttype` 更名为 `datacontenttype`。
#[derive(Clone, Debug, PartialEq)]
pub struct EventContextV03 {
    pub spec_version: String,
    pub event_type: String,
    pub source: UriRef,
    pub subject: Option<String>,
    pub id: String,
    pub time: Option<DateTime<Utc>>,
    pub schema_url: Option<UriRef>,
    pub data_content_type: Option<String>,
    pub data_content_encoding: Option<String>,
    pub extensions: Extensions,
}

impl Default for EventContextV03 {
    fn default() -> Self {
        Self {
            spec_version: SpecVersion::V03.as_str().to_owned(),
            event_type: String::new(),
            source: UriRef::default(),
            subject: None,
            id: String::new(),
            time: None,
            schema_url: None,
            data_content_type: None,
            data_content_encoding: None,
            extensions: Extensions::new(),
        }
    }
}

impl EventContextV03 {
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
        if self.schema_url.as_ref().is_some_and(UriRef::is_blank) {
            violations.push(Violation::new(
                "schemaurl",
                "if present, MUST adhere to the format specified in RFC 3986",
            ));
        }
        if self.data_content_type.as_deref().is_some_and(blank) {
            violations.push(Violation::new(
                "datacontenttype",
                "if present, MUST adhere to the format specified in RFC 2046",
            ));
        }
        if self
            .data_content_encoding
            .as_deref()
            .is_some_and(|encoding| !encoding.trim().eq_ignore_ascii_case(BASE64))
        {
            violations.push(Violation::new(
                "datacontentencoding",
                "if present, MUST adhere to RFC 2045 Section 6.1",
            ));
        }
        violations
    }

    pub(crate) fn to_v02(self) -> EventContextV02 {
        let mut extensions = self.extensions;
        carry_into_extensions(&mut extensions, self.subject, self.data_content_encoding);
        EventContextV02 {
            spec_version: SpecVersion::V02.as_str().to_owned(),
            event_type: self.event_type,
            source: self.source,
            id: self.id,
            time: self.time,
            schema_url: self.schema_url,
            content_type: self.data_content_type,
            extensions,
        }
    }

    /// 升级到 v0.4：`schemaurl` 更名为 `dataschema`，其余字段一一对应。
    pub(crate) fn to_v04(self) -> EventContextV04 {
        EventContextV04 {
            spec_version: SpecVersion::V04.as_str().to_owned(),
            event_type: self.event_type,
            source: self.source,
            subject: self.subject,
            id: self.id,
            time: self.time,
            data_schema: self.schema_url,
            data_content_type: self.data_content_type,
            data_content_encoding: self.data_content_encoding,
            extensions: self.extensions,
        }
    }
}

impl fmt::Display for EventContextV03 {
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
        if let Some(schema) = &self.schema_url {
            writeln!(f, "  schemaurl: {schema}")?;
        }
        if let Some(content_type) = &self.data_content_type {
            writeln!(f, "  datacontenttype: {content_type}")?;
        }
        if let Some(encoding) = &self.data_content_encoding {
            writeln!(f, "  datacontentencoding: {encoding}")?;
        }
        write_extensions(f, &self.extensions)
    }
}
