//! Common test helpers and JSON builders

use serde_json::{json, Value};

// ─── Request builders ────────────────────────────────────────────────────────

/// Build a basic non-streaming chat request
pub fn basic_request(prompt: &str) -> Value {
    json!({
        "model": "whatever-the-ui-picked",
        "messages": [{"role": "user", "content": prompt}],
        "stream": false
    })
}

/// Build a request that carries its own system message
pub fn request_with_system(system: &str, prompt: &str) -> Value {
    json!({
        "model": "whatever-the-ui-picked",
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": prompt}
        ],
        "stream": false
    })
}

// ─── Response builders ────────────────────────────────────────────────────────

/// Build a normal chat completion response from the "backend"
pub fn backend_text_response(model: &str, content: &str) -> String {
    json!({
        "id": "chatcmpl-test001",
        "object": "chat.completion",
        "created": 1700000000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": content
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 5,
            "total_tokens": 15
        }
    })
    .to_string()
}

/// One streamed chat chunk payload (without the `data: ` framing)
pub fn chunk_payload(model: &str, content: &str) -> String {
    json!({
        "id": "chatcmpl-stream001",
        "object": "chat.completion.chunk",
        "created": 1700000000,
        "model": model,
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    })
    .to_string()
}

// ─── Assertion helpers ────────────────────────────────────────────────────────

/// Assert two strings are equal, with context on failure
pub fn assert_eq_str(actual: &str, expected: &str, label: &str) -> anyhow::Result<()> {
    if actual != expected {
        Err(anyhow::anyhow!("{label}: expected {:?} but got {:?}", expected, actual))
    } else {
        Ok(())
    }
}

/// Assert condition is true, with message
pub fn assert_true(cond: bool, msg: &str) -> anyhow::Result<()> {
    if !cond {
        Err(anyhow::anyhow!("{}", msg))
    } else {
        Ok(())
    }
}

/// Assert the relay answered with `expected`
pub fn assert_status(actual: u16, expected: u16) -> anyhow::Result<()> {
    assert_true(actual == expected, &format!("Expected {}, got {}", expected, actual))
}
