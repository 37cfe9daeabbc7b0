// crates/tool-gate-server/tests/http_roundtrip.rs
// ============================================================================
// Module: HTTP Round-Trip Tests
// Description: Serves the gateway on a loopback socket against a tool backend.
// Purpose: Exercise routing, connect info, and the HTTP tool executor end to end.
// ============================================================================

//! ## Overview
//! Starts a small axum tool backend and a [`GatewayServer`] on ephemeral
//! loopback ports, then drives both through `reqwest`.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tool_gate_config::GatewayConfig;
use tool_gate_server::GatewayServer;

const TOKEN: &str = "roundtrip-token-1";

async fn spawn_backend() -> SocketAddr {
    let app = Router::new()
        .route(
            "/run",
            post(|headers: HeaderMap, Json(input): Json<Value>| async move {
                let tool = headers.get("x-tool-name").and_then(|value| value.to_str().ok()).unwrap_or("").to_string();
                Json(json!({"tool": tool, "input": input}))
            }),
        )
        .route("/fail", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

async fn spawn_gateway(backend: SocketAddr) -> SocketAddr {
    let config = GatewayConfig::from_toml(&format!(
        r#"
[[auth.credentials]]
client_id = "orchestrator"
token = "{TOKEN}"
permissions = ["*"]

[audit]
enabled = false

[[tools]]
name = "remote"
description = "Forwards to the backend."
executor = {{ kind = "http", url = "http://{backend}/run" }}
input = [{{ name = "query", type = "string", required = true }}]

[[tools]]
name = "broken"
description = "Backend always fails."
executor = {{ kind = "http", url = "http://{backend}/fail" }}

[[tools]]
name = "slow"
description = "Backend never answers in time."
timeout_ms = 200
executor = {{ kind = "http", url = "http://{backend}/slow" }}
"#
    ))
    .unwrap();
    let server = GatewayServer::from_config(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve_on(listener));
    addr
}

async fn invoke(client: &reqwest::Client, gateway: SocketAddr, body: Value) -> (u16, Value) {
    let response = client
        .post(format!("http://{gateway}/v1/invoke"))
        .bearer_auth(TOKEN)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_tools_run_through_the_http_executor() {
    let backend = spawn_backend().await;
    let gateway = spawn_gateway(backend).await;
    let client = reqwest::Client::new();

    let health: Value = client.get(format!("http://{gateway}/healthz")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health, json!({"status": "ok"}));

    let (status, body) = invoke(&client, gateway, json!({"tool": "remote", "input": {"query": "refunds"}})).await;
    assert_eq!(status, 200);
    assert_eq!(body["output"], json!({"tool": "remote", "input": {"query": "refunds"}}));

    let (status, body) = invoke(&client, gateway, json!({"tool": "broken"})).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["kind"], json!("executor_failure"));

    let (status, body) = invoke(&client, gateway, json!({"tool": "slow"})).await;
    assert_eq!(status, 504);
    assert_eq!(body["error"]["kind"], json!("timeout"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn discovery_over_http_lists_configured_tools() {
    let backend = spawn_backend().await;
    let gateway = spawn_gateway(backend).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("http://{gateway}/v1/tools")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = client
        .get(format!("http://{gateway}/v1/tools"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = body["tools"].as_array().unwrap().iter().map(|tool| tool["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["remote", "broken", "slow"]);
    assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["query"]));
}
