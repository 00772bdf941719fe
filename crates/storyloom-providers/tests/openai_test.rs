//! Chat-completions adapter against a local stub server.

mod common;

use common::StubServer;
use storyloom_core::{classify, FailureKind, HttpSettings, ProviderError, Turn, BEGIN_TRIGGER};
use storyloom_providers::{OpenAICompatAdapter, ProviderAdapter};

fn ok_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}

#[tokio::test]
async fn test_send_posts_whole_log_with_bearer_auth() {
    let first = ok_body("The rain falls.///OPTIONS///1. Wait");
    let second = ok_body("You wait.");
    let server = StubServer::start(vec![(200, first.as_str()), (200, second.as_str())]).await;

    let mut adapter = OpenAICompatAdapter::new("sk-test", format!("{}/v1/", server.base_url), "deepseek-chat")
        .with_settings(HttpSettings::default());
    adapter.initialize("SYS", &[]).await.unwrap();

    let reply = adapter.send_turn(BEGIN_TRIGGER).await.unwrap();
    assert_eq!(reply, "The rain falls.///OPTIONS///1. Wait");
    adapter.send_turn("Wait").await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 2);

    let req = &requests[1];
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/v1/chat/completions");
    assert_eq!(req.header("authorization"), Some("Bearer sk-test"));
    assert_eq!(req.body["model"], "deepseek-chat");
    assert_eq!(req.body["max_tokens"], 4096);

    let roles: Vec<&str> = req.body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(req.body["messages"][3]["content"], "Wait");
}

#[tokio::test]
async fn test_seeded_log_is_sent() {
    let body = ok_body("Next scene.");
    let server = StubServer::start(vec![(200, body.as_str())]).await;

    let mut adapter = OpenAICompatAdapter::new("k", &server.base_url, "m");
    let seed = vec![
        Turn::narrator("Opening.", vec![], 0),
        Turn::user("Look", 1),
        Turn::narrator("You look.", vec![], 2),
    ];
    adapter.initialize("SYS", &seed).await.unwrap();
    adapter.send_turn("Leave").await.unwrap();

    let messages = server.requests()[0].body["messages"].clone();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 6);
    assert_eq!(messages[1]["content"], BEGIN_TRIGGER);
    assert_eq!(messages[2]["content"], "Opening.");
    assert_eq!(messages[5]["content"], "Leave");
}

#[tokio::test]
async fn test_error_body_message_and_rollback() {
    let ok = ok_body("Recovered.");
    let server = StubServer::start(vec![
        (500, r#"{"error":{"message":"boom"}}"#),
        (200, ok.as_str()),
    ])
    .await;

    let mut adapter = OpenAICompatAdapter::new("k", &server.base_url, "m");
    adapter.initialize("SYS", &[]).await.unwrap();

    let err = adapter.send_turn("first").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.message(), "boom");
    assert_eq!(classify(&err).kind, FailureKind::Transient);
    assert_eq!(adapter.messages().len(), 1);

    adapter.send_turn("second").await.unwrap();
    let messages = server.requests()[1].body["messages"].clone();
    let contents: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["SYS", "second"]);
}

#[tokio::test]
async fn test_rate_limit_is_quota() {
    let server = StubServer::start(vec![(429, "slow down")]).await;

    let mut adapter = OpenAICompatAdapter::new("k", &server.base_url, "m");
    adapter.initialize("SYS", &[]).await.unwrap();

    let err = adapter.send_turn("go").await.unwrap_err();
    assert_eq!(err.message(), "slow down");
    assert_eq!(classify(&err).kind, FailureKind::QuotaExceeded);
}

#[tokio::test]
async fn test_empty_reply_not_logged() {
    let empty = ok_body("");
    let next = ok_body("A door creaks.");
    let server = StubServer::start(vec![(200, empty.as_str()), (200, next.as_str())]).await;

    let mut adapter = OpenAICompatAdapter::new("k", &server.base_url, "m");
    adapter.initialize("SYS", &[]).await.unwrap();

    assert_eq!(adapter.send_turn("hello").await.unwrap(), "");
    assert_eq!(adapter.messages().len(), 1);

    adapter.send_turn("knock").await.unwrap();
    let requests = server.requests();
    let roles: Vec<&str> = requests[1].body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user"]);
    assert_eq!(requests[1].body["messages"][1]["content"], "knock");
}

#[tokio::test]
async fn test_undecodable_body() {
    let server = StubServer::start(vec![(200, "not json")]).await;

    let mut adapter = OpenAICompatAdapter::new("k", &server.base_url, "m");
    adapter.initialize("SYS", &[]).await.unwrap();

    let err = adapter.send_turn("hello").await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut adapter = OpenAICompatAdapter::new("k", format!("http://{addr}"), "m");
    adapter.initialize("SYS", &[]).await.unwrap();

    let err = adapter.send_turn("hello").await.unwrap_err();
    assert!(matches!(err, ProviderError::Network { .. }));
    assert_eq!(adapter.messages().len(), 1);
}
