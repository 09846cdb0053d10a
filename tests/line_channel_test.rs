//! Integration tests for the LINE push transport using wiremock

use coursebell::notifications::{
    ChannelError, Dispatcher, LineConfig, LineTransport, LocationAttachment, MessagingTransport,
    OutboundMessage, QuickAction,
};
use coursebell::roster::RecipientSet;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> LineTransport {
    LineTransport::new(LineConfig::new("test-token").with_api_base(server.uri())).unwrap()
}

#[tokio::test]
async fn test_push_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(serde_json::json!({
            "to": "U-tim",
            "messages": [{ "type": "text", "text": "hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let status = transport(&server)
        .push("U-tim", &OutboundMessage::text("hello"))
        .await
        .unwrap();

    assert!(status.success);
    assert_eq!(status.recipient, "U-tim");
    assert_eq!(status.to_string(), "[SUCCESS] line -> U-tim");
}

#[tokio::test]
async fn test_push_sends_quick_replies_and_location() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                { "quickReply": { "items": [ { "action": { "label": "❌沒上課" } } ] } },
                { "type": "flex", "altText": "上課地點" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let message = OutboundMessage::text("reminder")
        .with_quick_actions(vec![QuickAction::new(
            "❌沒上課",
            "TIM:ABC 班:ABC:2025/01/01:0930-1030:nan:-1:NO",
        )])
        .with_location(LocationAttachment::new("台北市大安區"));

    let result = transport(&server).push("U-tim", &message).await;
    assert!(result.is_ok(), "push failed: {:?}", result.err());
}

#[tokio::test]
async fn test_push_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"message":"Failed to send messages"}"#))
        .mount(&server)
        .await;

    let err = transport(&server)
        .push("U-bad", &OutboundMessage::text("hello"))
        .await
        .unwrap_err();

    match err {
        ChannelError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Failed to send messages"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_push_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("too many"))
        .mount(&server)
        .await;

    let err = transport(&server)
        .push("U-tim", &OutboundMessage::text("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChannelError::RateLimited(_)));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/bot/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"userId":"Ubot"}"#))
        .mount(&server)
        .await;

    assert!(transport(&server).health_check().await.unwrap());

    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&down)
        .await;
    assert!(!transport(&down).health_check().await.unwrap());
}

/// One rejected recipient does not stop the others
#[tokio::test]
async fn test_dispatch_isolates_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .and(body_partial_json(serde_json::json!({ "to": "U-bad" })))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(Arc::new(transport(&server)));
    let mut recipients = RecipientSet::new();
    recipients.insert("U-tim", "TIM");
    recipients.insert("U-bad", "GHOST");
    recipients.insert("U-bob", "BOB");

    let report = dispatcher
        .dispatch(&recipients, &OutboundMessage::text("hello"))
        .await;

    assert_eq!(report.delivered, vec!["U-tim", "U-bob"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "U-bad");
    assert!(!report.all_delivered());
}
