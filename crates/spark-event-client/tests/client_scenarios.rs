//! 客户端编排场景测试
//!
//! - 出站：非法事件在到达传输层之前被拒绝；补全钩子与编码选择写入调用上下文；
//! - 请求：响应消息恰好 finish 一次，无法解析的响应只作为附加信息；
//! - 接收：回调声明的失败在第一条消息后终止循环；并发注册立即失败；取消与截止时间使循环及时退出；
//!   无法解码或校验失败的消息被拒绝后跳过。

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use spark_event::binding::buffered::BufferedMessage;
use spark_event::protocol::Outcome;
use spark_event::{
    CallContext, Cancellation, Deadline, EncodingPreference, Event, EventError, SpecVersion,
    WireEncoding,
};
use spark_event_client::{
    ClientBuilder, ClientConfig, ClientError, Converter, Data, ParamKind, ResponseSlot,
    SignatureError,
};
use support::{Capabilities, MockTransport, Reply, Settlement, binary, valid_event};

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct Boom;

const PATIENCE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn send_rejects_invalid_event_before_any_transport_call() {
    let (transport, _inbound) = MockTransport::new(Capabilities::all());
    let client = ClientBuilder::from_shared(transport.clone()).build();

    let mut event = Event::new(SpecVersion::V10);
    event.set_id("no-type");
    event.set_source("/tests");

    let err = client
        .send(&CallContext::default(), event)
        .await
        .expect_err("缺少 type");
    match err {
        ClientError::Validation(validation) => assert!(validation.mentions("type")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn send_applies_defaulters_and_selects_encoding() {
    let (transport, _inbound) = MockTransport::new(Capabilities::all());
    let client = ClientBuilder::from_shared(transport.clone())
        .with_uuids()
        .with_time_now()
        .build();

    let mut event = Event::new(SpecVersion::V10);
    event.set_type("com.example.defaulted");
    event.set_source("/tests");

    let outcome = client
        .send(&CallContext::default(), event.clone())
        .await
        .expect("发送成功");
    assert_eq!(outcome, Outcome::Ack);

    let structured = CallContext::default().with_encoding_preference(EncodingPreference::Structured);
    client.send(&structured, event.clone()).await.expect("结构化发送");

    let pinned = CallContext::default().with_pinned_encoding(WireEncoding::Structured(SpecVersion::V03));
    client.send(&pinned, event).await.expect("钉住编码");

    let sent = transport.sent();
    assert_eq!(transport.calls(), vec!["send", "send", "send"]);
    assert_eq!(sent[0].0, Some(WireEncoding::Binary(SpecVersion::V10)));
    assert_eq!(sent[1].0, Some(WireEncoding::Structured(SpecVersion::V10)));
    assert_eq!(sent[2].0, Some(WireEncoding::Structured(SpecVersion::V03)));
    for (_, _, delivered) in &sent {
        assert!(!delivered.id().is_empty());
        assert!(delivered.time().is_some());
    }
}

#[tokio::test]
async fn configuration_drives_preference_and_versions() {
    let (transport, _inbound) = MockTransport::new(Capabilities::all());
    let config = ClientConfig::from_toml_str(
        r#"
        encoding = "structured"
        binary_versions = ["1.0"]

        [defaults]
        id = true
        "#,
    )
    .expect("配置");
    let client = ClientBuilder::from_shared(transport.clone())
        .with_config(&config)
        .expect("应用配置")
        .with_context_decorator(|ctx| ctx.with_deadline(Deadline::with_timeout(PATIENCE)))
        .build();

    let mut v03 = Event::new(SpecVersion::V03);
    v03.set_type("com.example.config");
    v03.set_source("/tests");
    client.send(&CallContext::default(), v03).await.expect("发送");

    let sent = transport.sent();
    assert_eq!(sent[0].0, Some(WireEncoding::Default));
    assert_eq!(sent[0].1, EncodingPreference::Structured);
    assert!(!sent[0].2.id().is_empty());
}

#[tokio::test]
async fn missing_capabilities_are_reported() {
    let (transport, _inbound) = MockTransport::new(Capabilities::receiver_only());
    let client = ClientBuilder::from_shared(transport.clone()).build();

    let err = client
        .send(&CallContext::default(), valid_event("1"))
        .await
        .expect_err("无 Sender");
    assert!(matches!(
        err,
        ClientError::MissingCapability {
            capability: "sender"
        }
    ));
    assert_eq!(err.code(), "client.capability.missing");

    let err = client
        .request(&CallContext::default(), valid_event("1"))
        .await
        .expect_err("无 Requester");
    assert!(matches!(
        err,
        ClientError::MissingCapability {
            capability: "requester"
        }
    ));
}

#[tokio::test]
async fn request_finishes_response_exactly_once() {
    let (transport, _inbound) = MockTransport::new(Capabilities::all());
    let client = ClientBuilder::from_shared(transport.clone()).build();

    transport.set_request_reply(binary(&valid_event("reply")));
    let reply = client
        .request(&CallContext::default(), valid_event("1"))
        .await
        .expect("请求成功");
    assert_eq!(reply.event.as_ref().map(Event::id), Some("reply"));
    assert!(reply.response_error.is_none());

    transport.set_request_reply(BufferedMessage::new().with_body("plain ack"));
    let reply = client
        .request(&CallContext::default(), valid_event("2"))
        .await
        .expect("非事件响应仍视为成功");
    assert!(reply.event.is_none());
    assert!(matches!(reply.response_error, Some(EventError::CannotConvert)));

    assert_eq!(
        transport.settlements(),
        vec![Settlement::Acked, Settlement::Acked]
    );
}

#[tokio::test]
async fn failing_callback_terminates_after_first_message() {
    let (transport, inbound) = MockTransport::new(Capabilities::receiver_only());
    let client = ClientBuilder::from_shared(transport.clone()).build();
    for id in ["first", "second"] {
        inbound.send(binary(&valid_event(id))).expect("投递");
    }

    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    let result = tokio::time::timeout(
        PATIENCE,
        client.start_receiver(&CallContext::default(), move |_: Event| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), Boom>(Boom) }
        }),
    )
    .await
    .expect("循环应立即终止");

    match result {
        Err(ClientError::Invocation(cause)) => {
            assert_eq!(cause.to_string(), "boom");
            assert!(cause.downcast_ref::<Boom>().is_some());
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(transport.settlements(), vec![Settlement::Nacked("boom".into())]);
    assert_eq!(transport.calls(), vec!["receive"]);
    assert!(!client.is_receiving());
}

#[tokio::test]
async fn second_concurrent_registration_fails_immediately() {
    let (transport, _inbound) = MockTransport::new(Capabilities::receiver_only());
    let client = Arc::new(ClientBuilder::from_shared(transport).build());
    let cancellation = Cancellation::new();
    let ctx = CallContext::builder()
        .with_cancellation(cancellation.clone())
        .build();

    let first = tokio::spawn({
        let client = Arc::clone(&client);
        let ctx = ctx.clone();
        async move { client.start_receiver(&ctx, |_: Event| async {}).await }
    });
    tokio::time::timeout(PATIENCE, async {
        while !client.is_receiving() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("第一个接收者已注册");

    let second = tokio::time::timeout(
        Duration::from_millis(500),
        client.start_receiver(&CallContext::default(), || async {}),
    )
    .await
    .expect("第二次注册不应阻塞");
    assert!(matches!(second, Err(ClientError::AlreadyReceiving)));
    assert!(client.is_receiving());

    cancellation.cancel();
    let first = tokio::time::timeout(PATIENCE, first)
        .await
        .expect("取消后及时退出")
        .expect("任务未 panic");
    assert!(first.is_ok());
    assert!(!client.is_receiving());
}

#[tokio::test]
async fn cancellation_and_deadline_end_the_loop() {
    let (transport, _inbound) = MockTransport::new(Capabilities::receiver_only());
    let client = ClientBuilder::from_shared(transport).build();

    let cancellation = Cancellation::new();
    let ctx = CallContext::builder()
        .with_cancellation(cancellation.clone())
        .build();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancellation.cancel();
    });
    let cancelled = tokio::time::timeout(PATIENCE, client.start_receiver(&ctx, || async {}))
        .await
        .expect("取消后及时退出");
    assert!(cancelled.is_ok());
    canceller.await.expect("取消任务");

    let ctx = CallContext::default().with_deadline(Deadline::with_timeout(Duration::from_millis(20)));
    let expired = tokio::time::timeout(PATIENCE, client.start_receiver(&ctx, || async {}))
        .await
        .expect("截止后及时退出");
    assert!(matches!(expired, Err(ClientError::DeadlineExceeded)));
    assert!(!client.is_receiving());
}

#[tokio::test]
async fn bad_messages_are_nacked_and_skipped() {
    let (transport, inbound) = MockTransport::new(Capabilities::receiver_only());
    let client = ClientBuilder::from_shared(transport.clone()).build();

    inbound
        .send(BufferedMessage::new().with_body("opaque"))
        .expect("投递");
    inbound
        .send(
            BufferedMessage::new()
                .with_header("ce-specversion", "1.0")
                .with_header("ce-id", "missing-type")
                .with_header("ce-source", "/tests"),
        )
        .expect("投递");
    let mut with_data = valid_event("typed");
    with_data.set_data_bytes(Some("application/json"), "not json");
    inbound.send(binary(&with_data)).expect("投递");
    let mut good = valid_event("good");
    good.set_data_bytes(Some("application/json"), "7");
    inbound.send(binary(&good)).expect("投递");
    drop(inbound);

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let result = tokio::time::timeout(
        PATIENCE,
        client.start_receiver(
            &CallContext::default(),
            move |event: Event, count: Data<u32>| {
                sink.lock().push((event.id().to_owned(), *count));
                async { Ok::<(), Boom>(()) }
            },
        ),
    )
    .await
    .expect("流结束后退出");
    assert!(result.is_ok(), "{result:?}");

    let settlements = transport.settlements();
    assert_eq!(settlements.len(), 4);
    assert!(matches!(&settlements[0], Settlement::Nacked(reason) if reason.contains("cannot convert")));
    assert!(matches!(&settlements[1], Settlement::Nacked(reason) if reason.contains("type")));
    assert!(matches!(&settlements[2], Settlement::Nacked(_)));
    assert_eq!(settlements[3], Settlement::Acked);
    assert_eq!(*seen.lock(), vec![("good".to_owned(), 7)]);
}

struct PlainText;

impl Converter for PlainText {
    fn accepts(&self, _ctx: &CallContext, message: &spark_event::Message) -> bool {
        message.encoding() == spark_event::Encoding::Unknown
    }

    fn convert(
        &self,
        _ctx: &CallContext,
        _message: &spark_event::Message,
        _cause: &EventError,
    ) -> Result<Event, EventError> {
        Ok(valid_event("converted"))
    }
}

#[tokio::test]
async fn converter_rescues_undecodable_messages() {
    let (transport, inbound) = MockTransport::new(Capabilities::receiver_only());
    let client = ClientBuilder::from_shared(transport.clone())
        .with_converter(PlainText)
        .build();
    inbound
        .send(BufferedMessage::new().with_body("legacy"))
        .expect("投递");
    drop(inbound);

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client
        .start_receiver(&CallContext::default(), move |event: Event| {
            sink.lock().push(event.id().to_owned());
            async {}
        })
        .await
        .expect("流结束");
    assert_eq!(*seen.lock(), vec!["converted".to_owned()]);
    assert_eq!(transport.settlements(), vec![Settlement::Acked]);
}

#[tokio::test]
async fn responder_callbacks_reply_through_the_writer() {
    let (transport, inbound) = MockTransport::new(Capabilities {
        responder: true,
        ..Capabilities::default()
    });
    let client = ClientBuilder::from_shared(transport.clone()).build();
    inbound.send(binary(&valid_event("ask"))).expect("投递");
    drop(inbound);

    client
        .start_receiver(
            &CallContext::default(),
            |event: Event, slot: ResponseSlot| async move {
                let mut reply = event;
                reply.set_type("com.example.reply");
                slot.set(reply);
            },
        )
        .await
        .expect("流结束");

    assert_eq!(
        transport.replies(),
        vec![Reply {
            response_type: Some("com.example.reply".into()),
            error: None,
        }]
    );
    assert_eq!(transport.settlements(), vec![Settlement::Acked]);
    assert_eq!(transport.calls(), vec!["respond", "respond"]);
}

#[tokio::test]
async fn registration_errors_are_reported_before_polling() {
    let (transport, _inbound) = MockTransport::new(Capabilities::receiver_only());
    let client = ClientBuilder::from_shared(transport.clone()).build();

    let err = client
        .start_receiver(&CallContext::default(), |_: ResponseSlot| async {})
        .await
        .expect_err("缺少 Responder");
    assert!(matches!(
        err,
        ClientError::CapabilityMismatch {
            required: "responder"
        }
    ));

    let err = client
        .start_receiver(&CallContext::default(), |_: Event, _: CallContext| async {})
        .await
        .expect_err("乱序参数");
    assert!(matches!(
        err,
        ClientError::Signature(SignatureError::OutOfOrder {
            position: 1,
            kind: ParamKind::Context
        })
    ));
    assert!(transport.calls().is_empty());
    assert!(!client.is_receiving());
}

#[tokio::test]
async fn opener_runs_alongside_the_poll_loop() {
    let (transport, _inbound) = MockTransport::new(Capabilities {
        receiver: true,
        opener: true,
        ..Capabilities::default()
    });
    let client = ClientBuilder::from_shared(transport.clone()).build();
    let cancellation = Cancellation::new();
    let ctx = CallContext::builder()
        .with_cancellation(cancellation.clone())
        .build();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancellation.cancel();
    });

    tokio::time::timeout(PATIENCE, client.start_receiver(&ctx, || async {}))
        .await
        .expect("取消后及时退出")
        .expect("正常退出");
    let calls = transport.calls();
    assert!(calls.contains(&"open"), "{calls:?}");
    assert!(calls.contains(&"receive"), "{calls:?}");
}
