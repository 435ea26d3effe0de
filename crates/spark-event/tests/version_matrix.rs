//! 版本矩阵契约测试
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：验证五个规范版本之间的逐级转换是“总函数且无损可逆”的，以及各版本的结构校验
//!   总是报告全部违规项；
//! - **设计手法 (How)**：校验规则使用表驱动的确定性用例；转换往返使用 Proptest 随机构造上下文，
//!   对任意版本对 `(v, w)` 断言 `convert(convert(ctx, w), v) == ctx`；
//! - **边界 (What)**：随机扩展名取自固定集合，避开降级时借用的保留扩展名（`subject`、`eventtypeversion`、
//!   `datacontentencoding`），否则往返时会与原生字段发生合并。

use chrono::DateTime;
use proptest::prelude::*;
use spark_event::context::{
    EventContextV01, EventContextV03, EventContextV04, EventContextV1, Extensions,
};
use spark_event::{Event, EventContext, ExtensionValue, Format, JSON, SpecVersion, UriRef};

fn valid_context(version: SpecVersion) -> EventContext {
    let mut ctx = EventContext::new(version);
    ctx.set_event_type("com.example.simple");
    ctx.set_source("https://example.com/source");
    ctx.set_id("ABC-123");
    ctx
}

#[test]
fn v01_reports_every_violation_at_once() {
    let ctx = EventContext::from(EventContextV01 {
        cloud_events_version: String::new(),
        event_id: String::new(),
        schema_url: Some(UriRef::default()),
        content_type: Some(String::new()),
        extensions: Some(Extensions::new()),
        ..EventContextV01::default()
    });
    let err = ctx.validate().expect_err("全部规则均被违反");
    let text = err.to_string();
    for rule in [
        "eventType:",
        "eventID:",
        "extensions:",
        "cloudEventsVersion:",
        "source:",
        "contentType:",
        "schemaURL:",
    ] {
        assert!(text.contains(rule), "缺少 `{rule}`：{text}");
    }
    assert!(err.violations().len() >= 7);
}

#[test]
fn each_required_rule_is_reported_on_its_own() {
    for version in SpecVersion::ALL {
        assert!(valid_context(version).validate().is_ok(), "{version} 基线应合法");

        let (type_name, id_name) = if version == SpecVersion::V01 {
            ("eventType", "eventID")
        } else {
            ("type", "id")
        };

        let mut missing_type = valid_context(version);
        missing_type.set_event_type("");
        let err = missing_type.validate().expect_err("缺少 type");
        assert_eq!(err.violations().len(), 1, "{version}: {err}");
        assert!(err.mentions(type_name));

        let mut missing_id = valid_context(version);
        missing_id.set_id("  ");
        let err = missing_id.validate().expect_err("缺少 id");
        assert_eq!(err.violations().len(), 1, "{version}: {err}");
        assert!(err.mentions(id_name));

        let mut missing_source = valid_context(version);
        missing_source.set_source("");
        let err = missing_source.validate().expect_err("缺少 source");
        assert_eq!(err.violations().len(), 1, "{version}: {err}");
        assert!(err.mentions("source"));
    }
}

#[test]
fn version_specific_optional_rules() {
    let v03 = EventContext::from(EventContextV03 {
        data_content_encoding: Some("gzip".into()),
        subject: Some(String::new()),
        ..valid_context(SpecVersion::V03).as_v03()
    });
    let err = v03.validate().expect_err("非法编码与空主题");
    assert!(err.mentions("datacontentencoding"));
    assert!(err.mentions("subject"));

    let v04 = EventContext::from(EventContextV04 {
        data_content_encoding: Some("BASE64".into()),
        ..valid_context(SpecVersion::V04).as_v04()
    });
    assert!(v04.validate().is_ok(), "base64 判定不区分大小写");

    let mut extensions = Extensions::new();
    extensions.insert("Bad_Name".into(), ExtensionValue::from("x"));
    let v1 = EventContext::from(EventContextV1 {
        data_schema: Some(UriRef::new("relative/schema")),
        extensions,
        ..valid_context(SpecVersion::V10).as_v1()
    });
    let err = v1.validate().expect_err("相对 dataschema 与非法扩展名");
    assert!(err.mentions("dataschema"));
    assert!(err.mentions("extensions"));
}

#[test]
fn v01_to_v02_renames_and_carries_event_type_version() {
    let ctx = EventContext::from(EventContextV01 {
        event_type_version: Some("v1alpha1".into()),
        ..valid_context(SpecVersion::V01).as_v01()
    });
    let v02 = ctx.convert(SpecVersion::V02);
    assert_eq!(v02.spec_version(), SpecVersion::V02);
    assert_eq!(v02.spec_version_str(), "0.2");
    assert_eq!(v02.event_type(), "com.example.simple");
    assert_eq!(v02.id(), "ABC-123");
    assert_eq!(
        v02.extension("eventtypeversion").and_then(ExtensionValue::as_str),
        Some("v1alpha1")
    );
    assert_eq!(v02.convert(SpecVersion::V01), ctx);
}

#[test]
fn v04_to_v1_keeps_content_encoding_as_extension() {
    let ctx = EventContext::from(EventContextV04 {
        data_content_encoding: Some("base64".into()),
        ..valid_context(SpecVersion::V04).as_v04()
    });
    let v1 = ctx.convert(SpecVersion::V10);
    assert_eq!(v1.data_content_encoding(), None);
    assert_eq!(
        v1.extension("datacontentencoding").and_then(ExtensionValue::as_str),
        Some("base64")
    );
    assert!(v1.validate().is_ok());
    assert_eq!(v1.convert(SpecVersion::V04), ctx);
}

#[test]
fn pretty_print_lists_attributes_then_sorted_extensions() {
    let mut ctx = valid_context(SpecVersion::V10);
    ctx.set_extension("zeta", Some("last".into()));
    ctx.set_extension("alpha", Some(ExtensionValue::Integer(1)));
    let text = ctx.to_string();
    assert!(text.starts_with("Context Attributes,\n  specversion: 1.0\n"));
    let alpha = text.find("  alpha: 1").expect("alpha");
    let zeta = text.find("  zeta: last").expect("zeta");
    assert!(text.find("Extensions,").expect("扩展区块") < alpha);
    assert!(alpha < zeta, "扩展按名称排序");
}

fn extension_value() -> impl Strategy<Value = ExtensionValue> {
    prop_oneof![
        any::<bool>().prop_map(ExtensionValue::Bool),
        any::<i64>().prop_map(ExtensionValue::Integer),
        "[a-z]{0,8}".prop_map(ExtensionValue::String),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(ExtensionValue::Binary),
        "https://[a-z]{1,8}\\.example/[a-z]{0,6}".prop_map(ExtensionValue::Uri),
        "/[a-z]{0,6}#[a-z]{0,4}".prop_map(ExtensionValue::UriRef),
        (0i64..4_000_000_000i64)
            .prop_filter_map("合法时间戳", |secs| DateTime::from_timestamp(secs, 0))
            .prop_map(ExtensionValue::Timestamp),
        any::<bool>().prop_map(|flag| ExtensionValue::Json(serde_json::json!({ "flag": flag }))),
    ]
}

prop_compose! {
    fn arbitrary_context()(
        version in prop::sample::select(SpecVersion::ALL.to_vec()),
        event_type in "[a-z][a-z.]{0,15}",
        source in "[a-z][a-z0-9/:.]{0,19}",
        id in "[A-Z0-9-]{1,12}",
        seconds in prop::option::of(0i64..4_000_000_000i64),
        schema in prop::option::of("https://schema\\.example/[a-z]{1,8}"),
        content_type in prop::option::of(prop::sample::select(vec!["application/json", "text/plain"])),
        subject in prop::option::of("[a-z]{1,12}"),
        event_type_version in prop::option::of("[a-z0-9]{1,6}"),
        base64 in any::<bool>(),
        extensions in prop::collection::btree_map(
            prop::sample::select(vec!["trace", "tenant", "region", "priority"]),
            extension_value(),
            0..4,
        ),
    ) -> EventContext {
        let mut ctx = EventContext::new(version);
        ctx.set_event_type(event_type);
        ctx.set_source(source);
        ctx.set_id(id);
        ctx.set_time(seconds.and_then(|secs| DateTime::from_timestamp(secs, 0)));
        ctx.set_data_schema(schema.map(UriRef::new));
        ctx.set_data_content_type(content_type.map(str::to_owned));
        ctx.set_subject(subject);
        for (name, value) in extensions {
            ctx.set_extension(name, Some(value));
        }
        match &mut ctx {
            EventContext::V01(inner) => inner.event_type_version = event_type_version,
            EventContext::V03(inner) if base64 => inner.data_content_encoding = Some("base64".into()),
            EventContext::V04(inner) if base64 => inner.data_content_encoding = Some("base64".into()),
            _ => {}
        }
        ctx
    }
}

proptest! {
    #[test]
    fn conversion_round_trips_through_every_version(ctx in arbitrary_context()) {
        let origin = ctx.spec_version();
        for target in SpecVersion::ALL {
            let converted = ctx.convert(target);
            prop_assert_eq!(converted.spec_version(), target);
            prop_assert_eq!(converted.id(), ctx.id());
            prop_assert_eq!(converted.event_type(), ctx.event_type());
            prop_assert_eq!(converted.time(), ctx.time());
            prop_assert_eq!(converted.subject(), ctx.subject());
            prop_assert_eq!(&converted.convert(origin), &ctx);
        }
    }

    #[test]
    fn structured_format_round_trips_every_context(ctx in arbitrary_context()) {
        let event = Event::from_context(ctx);
        let body = JSON.marshal(&event).expect("结构化编码");
        prop_assert_eq!(JSON.unmarshal(&body).expect("结构化解码"), event);
    }

    #[test]
    fn conversion_preserves_validity(ctx in arbitrary_context()) {
        prop_assume!(ctx.validate().is_ok());
        for target in SpecVersion::ALL {
            let converted = ctx.convert(target);
            prop_assert!(converted.validate().is_ok(), "{:?} -> {}: {}", ctx, target, converted);
        }
    }
}
