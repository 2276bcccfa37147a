//! End-to-end gateway tests against a live listener and a mock upstream.

use std::time::{Duration, Instant};

use manifold_auth::CredentialStore;
use manifold_server::config::{GatewayConfig, ProviderConfig};
use manifold_server::GatewayServer;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    _dir: TempDir,
    base: String,
    admin_password: String,
    client: reqwest::Client,
    server: GatewayServer,
}

async fn start_gateway(upstream: &MockServer) -> Harness {
    let dir = TempDir::new().unwrap();
    let credentials_path = dir.path().join("credentials.json");

    // Initialize credentials up front so the test knows the password.
    let admin_password =
        CredentialStore::new(&credentials_path).initialize().unwrap().unwrap();

    let mut config = GatewayConfig::default();
    config.port = 0;
    config.credentials_path = credentials_path.to_string_lossy().into_owned();
    config.gateway_keys_path =
        dir.path().join("gateway-keys.json").to_string_lossy().into_owned();
    config.providers = vec![ProviderConfig {
        provider: "custom".into(),
        api_key: Some("upstream-key".into()),
        base_url: Some(format!("{}/v1", upstream.uri())),
        default_model: None,
        deployment_id: None,
        api_version: None,
        chat_path: None,
    }];

    let server = GatewayServer::new(config).unwrap();
    let (addr, _handle) = server.listen().await.unwrap();

    Harness {
        _dir: dir,
        base: format!("http://{addr}"),
        admin_password,
        client: reqwest::Client::new(),
        server,
    }
}

async fn admin_login(harness: &Harness) -> String {
    let response = harness
        .client
        .post(format!("{}/internal/auth/login", harness.base))
        .json(&serde_json::json!({
            "username": "admin",
            "password": harness.admin_password,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    body["token"].as_str().unwrap().to_string()
}

async fn create_key(harness: &Harness, token: &str) -> (String, String) {
    let response = harness
        .client
        .post(format!("{}/internal/gateway-keys", harness.base))
        .bearer_auth(token)
        .json(&serde_json::json!({"name": "test", "scopes": ["chat", "models"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let key = body["key"].as_str().unwrap().to_string();
    let id = body["id"].as_str().unwrap().to_string();
    assert!(key.starts_with("gw-"));
    assert!(body["prefix"].as_str().unwrap().starts_with("gw-"));
    (id, key)
}

fn completion_template() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "id": "chatcmpl-upstream",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "llama-3.3-70b",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello E2E Test"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
    }))
}

fn chat_body() -> serde_json::Value {
    serde_json::json!({
        "model": "llama-3.3-70b",
        "messages": [{"role": "user", "content": "Say 'Hello E2E Test' exactly."}],
        "max_tokens": 50
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_use_gateway_key() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion_template())
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream).await;
    let token = admin_login(&harness).await;
    let (_id, key) = create_key(&harness, &token).await;

    let response = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .bearer_auth(&key)
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let content = body["choices"][0]["message"]["content"].as_str().unwrap();
    assert!(!content.is_empty());
    assert_eq!(content, "Hello E2E Test");
}

#[tokio::test]
async fn disabled_key_rejected() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion_template())
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream).await;
    let token = admin_login(&harness).await;
    let (id, key) = create_key(&harness, &token).await;

    // Key works before disabling.
    let ok = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .bearer_auth(&key)
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);

    let disabled = harness
        .client
        .post(format!("{}/internal/gateway-keys/{id}/disable", harness.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(disabled.status(), 200);

    // Immediately reusing the plaintext is rejected.
    let rejected = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .bearer_auth(&key)
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 401);
}

#[tokio::test]
async fn wrong_password_is_401() {
    let upstream = MockServer::start().await;
    let harness = start_gateway(&upstream).await;

    let response = harness
        .client
        .post(format!("{}/internal/auth/login", harness.base))
        .json(&serde_json::json!({"username": "admin", "password": "wrongpassword"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "authentication_error");
}

#[tokio::test]
async fn cache_hit_serves_identical_choices() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion_template().set_delay(Duration::from_millis(150)))
        .expect(1) // the second request must be a cache hit
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream).await;

    let first_started = Instant::now();
    let first = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    let first_latency = first_started.elapsed();
    assert_eq!(first.status(), 200);
    let first_body: serde_json::Value = first.json().await.unwrap();

    let second_started = Instant::now();
    let second = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    let second_latency = second_started.elapsed();
    assert_eq!(second.status(), 200);
    let second_body: serde_json::Value = second.json().await.unwrap();

    assert_eq!(first_body["choices"], second_body["choices"]);
    assert_eq!(first_body["model"], second_body["model"]);
    assert!(second_latency < first_latency, "cache hit should be faster");

    let stats = harness.server.state().gateway.cache().stats();
    assert!(stats.hits >= 1);
}

#[tokio::test]
async fn concurrent_requests_all_complete() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion_template().set_delay(Duration::from_millis(100)))
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let client = harness.client.clone();
        let url = format!("{}/v1/chat/completions", harness.base);
        handles.push(tokio::spawn(async move {
            let mut body = chat_body();
            // Distinct payloads so the cache cannot collapse them.
            body["messages"][0]["content"] = serde_json::json!(format!("request {i}"));
            client.post(&url).json(&body).send().await.unwrap().status()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    let queues = harness.server.state().gateway.queue_stats();
    assert_eq!(queues["custom"].admitted, 10);
    assert_eq!(queues["custom"].active, 0);
}

#[tokio::test]
async fn streaming_emits_sse_frames() {
    let sse = concat!(
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"llama-3.3-70b\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"llama-3.3-70b\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"1 \"},\"finish_reason\":null}]}\n\n",
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"llama-3.3-70b\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"2 \"},\"finish_reason\":null}]}\n\n",
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"llama-3.3-70b\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"3\"},\"finish_reason\":null}]}\n\n",
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"llama-3.3-70b\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream).await;

    let mut body = chat_body();
    body["stream"] = serde_json::json!(true);
    body["messages"][0]["content"] = serde_json::json!("Count from 1 to 3.");

    let response = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let raw = response.text().await.unwrap();
    let frames: Vec<&str> = raw
        .split("\n\n")
        .filter(|f| f.starts_with("data: "))
        .collect();
    assert!(frames.len() >= 4, "expected data frames, got: {raw}");
    assert_eq!(*frames.last().unwrap(), "data: [DONE]");

    let mut content = String::new();
    for frame in &frames[..frames.len() - 1] {
        let json: serde_json::Value =
            serde_json::from_str(frame.trim_start_matches("data: ")).unwrap();
        if let Some(delta) = json["choices"][0]["delta"]["content"].as_str() {
            content.push_str(delta);
        }
    }
    assert_eq!(content, "1 2 3");

    // Streaming bypasses the cache.
    assert_eq!(harness.server.state().gateway.cache().stats().size, 0);
}

#[tokio::test]
async fn models_aggregates_adapters() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [
                {"id": "llama-3.3-70b", "object": "model", "created": 0, "owned_by": "custom"}
            ]
        })))
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream).await;
    let response =
        harness.client.get(format!("{}/v1/models", harness.base)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"][0]["id"], "llama-3.3-70b");
}

#[tokio::test]
async fn regenerated_key_swaps_plaintext() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion_template())
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream).await;
    let token = admin_login(&harness).await;
    let (id, old_key) = create_key(&harness, &token).await;

    let response = harness
        .client
        .post(format!("{}/internal/gateway-keys/{id}/regenerate", harness.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let new_key = body["key"].as_str().unwrap();
    assert_ne!(new_key, old_key);

    // Old plaintext dead; new plaintext works.
    let old_status = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .bearer_auth(&old_key)
        .json(&chat_body())
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(old_status, 401);

    let new_status = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .bearer_auth(new_key)
        .json(&chat_body())
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(new_status, 200);
}

#[tokio::test]
async fn session_surface_me_and_logout() {
    let upstream = MockServer::start().await;
    let harness = start_gateway(&upstream).await;
    let token = admin_login(&harness).await;

    let me = harness
        .client
        .get(format!("{}/internal/auth/me", harness.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 200);
    let body: serde_json::Value = me.json().await.unwrap();
    assert_eq!(body["role"], "admin");
    assert_eq!(body["authenticated"], true);

    let logout = harness
        .client
        .post(format!("{}/internal/auth/logout", harness.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), 200);

    // Token no longer authenticates.
    let after = harness
        .client
        .get(format!("{}/internal/auth/me", harness.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), 401);
}

#[tokio::test]
async fn stats_surface_admin_only() {
    let upstream = MockServer::start().await;
    let harness = start_gateway(&upstream).await;

    let anonymous = harness
        .client
        .get(format!("{}/internal/stats", harness.base))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), 401);

    let token = admin_login(&harness).await;
    let admin = harness
        .client
        .get(format!("{}/internal/stats", harness.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(admin.status(), 200);
    let body: serde_json::Value = admin.json().await.unwrap();
    assert!(body["queues"].is_object());
    assert!(body["cache"]["hits"].is_number());
}

#[tokio::test]
async fn gateway_key_role_cannot_reach_admin_surface() {
    let upstream = MockServer::start().await;
    let harness = start_gateway(&upstream).await;
    let token = admin_login(&harness).await;
    let (_id, key) = create_key(&harness, &token).await;

    let response = harness
        .client
        .get(format!("{}/internal/gateway-keys", harness.base))
        .bearer_auth(&key)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "permission_denied");
}

#[tokio::test]
async fn upstream_auth_failure_maps_to_401() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Invalid API key", "type": "invalid_api_key"}
        })))
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream).await;
    let response = harness
        .client
        .post(format!("{}/v1/chat/completions", harness.base))
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "authentication_error");
}
