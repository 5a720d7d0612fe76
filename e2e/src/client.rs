//! HTTP client that talks to the relay the way an OpenAI-style chat UI does

use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, Method};

use crate::types::{RelayResponse, SseEvent, StreamingResponse};

/// Key listed under `auth.api_keys` in test_configs/relay.yaml
pub const CLIENT_API_KEY: &str = "e2e-client-key";

/// Build an HTTP client (no connection pooling for test isolation)
pub fn build_client() -> Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(0)
        .build()
        .expect("Failed to build reqwest client")
}

/// POST a JSON body to `path`, authenticating with `api_key` when given
pub async fn send_post(
    client: &Client,
    relay_addr: &str,
    path: &str,
    request_body: serde_json::Value,
    api_key: Option<&str>,
) -> anyhow::Result<RelayResponse> {
    let url = format!("http://{relay_addr}{path}");

    let mut req = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&request_body);
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send request to relay: {}", e))?;

    let status = resp.status().as_u16();
    let body_text = resp
        .text()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read relay response: {}", e))?;

    let body: serde_json::Value = serde_json::from_str(&body_text).map_err(|e| {
        anyhow::anyhow!(
            "Relay response is not valid JSON: {}: {}",
            e,
            &body_text[..body_text.len().min(500)]
        )
    })?;

    Ok(RelayResponse { status, body })
}

/// Send a non-streaming chat completion request to the relay
pub async fn send_non_streaming(
    client: &Client,
    relay_addr: &str,
    request_body: serde_json::Value,
) -> anyhow::Result<RelayResponse> {
    send_post(client, relay_addr, "/v1/chat/completions", request_body, Some(CLIENT_API_KEY)).await
}

/// Send a streaming chat completion request to the relay, collect all SSE events
pub async fn send_streaming(
    client: &Client,
    relay_addr: &str,
    mut request_body: serde_json::Value,
) -> anyhow::Result<StreamingResponse> {
    request_body["stream"] = serde_json::Value::Bool(true);

    let url = format!("http://{relay_addr}/v1/chat/completions");

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .bearer_auth(CLIENT_API_KEY)
        .json(&request_body)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send streaming request to relay: {}", e))?;

    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    // Collect all bytes from the stream
    let mut stream = resp.bytes_stream();
    let mut all_bytes: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk.map_err(|e| anyhow::anyhow!("Stream read error: {}", e))?;
        all_bytes.extend_from_slice(&chunk);
    }

    let body_text = String::from_utf8_lossy(&all_bytes);
    let events = parse_sse(&body_text);

    Ok(StreamingResponse {
        status,
        content_type,
        events,
    })
}

/// Parse SSE body text into events
///
/// Events are separated by a blank line; only `data: ` lines are kept.
fn parse_sse(text: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();

    for raw_event in text.split("\n\n") {
        let raw_event = raw_event.trim();
        if raw_event.is_empty() {
            continue;
        }

        let data = match raw_event.lines().filter_map(|l| l.strip_prefix("data: ")).last() {
            Some(d) => d,
            None => continue,
        };

        events.push(SseEvent {
            data: data.to_string(),
            is_done: data == "[DONE]",
        });
    }

    events
}

/// Send an authenticated GET request to the relay
pub async fn send_get(client: &Client, relay_addr: &str, path: &str) -> anyhow::Result<RelayResponse> {
    let url = format!("http://{relay_addr}{path}");

    let resp = client
        .get(&url)
        .bearer_auth(CLIENT_API_KEY)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to GET {}: {}", url, e))?;

    let status = resp.status().as_u16();
    let body_text = resp.text().await.unwrap_or_default();

    let body: serde_json::Value = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::String(body_text));

    Ok(RelayResponse { status, body })
}

/// Send an unauthenticated OPTIONS request, returning status and headers
pub async fn send_options(
    client: &Client,
    relay_addr: &str,
    path: &str,
) -> anyhow::Result<(u16, reqwest::header::HeaderMap)> {
    let url = format!("http://{relay_addr}{path}");

    let resp = client
        .request(Method::OPTIONS, &url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to OPTIONS {}: {}", url, e))?;

    Ok((resp.status().as_u16(), resp.headers().clone()))
}
