//! Streaming relay tests - model name rewriting and termination

use crate::backend::{drain_requests, queue_response, set_model_id};
use crate::client::send_streaming;
use crate::runner::TestContext;
use crate::types::{MockResponse, DEFAULT_MODEL_ID};

use super::helpers::*;

/// Every chunk reports the bare model name and content survives
pub async fn test_stream_model_rewritten(ctx: TestContext) -> anyhow::Result<()> {
    queue_response(
        &ctx.backend_state,
        MockResponse::sse(&[
            chunk_payload(DEFAULT_MODEL_ID, "Count:"),
            chunk_payload(DEFAULT_MODEL_ID, " 1 2 3"),
            "[DONE]".to_string(),
        ]),
    );

    let resp = send_streaming(&ctx.http_client, &ctx.relay_addr, basic_request("count")).await?;

    assert_status(resp.status, 200)?;
    assert_true(
        resp.content_type.starts_with("text/plain"),
        &format!("Expected text/plain, got {}", resp.content_type),
    )?;
    assert_true(resp.has_done_marker(), "Stream must end with [DONE]")?;
    assert_eq_str(&resp.accumulated_content(), "Count: 1 2 3", "accumulated content")?;

    let models = resp.models();
    assert_true(models.len() == 2, &format!("Expected 2 chunks, got {}", models.len()))?;
    for model in models {
        assert_eq_str(&model, "llama-3-8b-instruct.Q4_K_M", "chunk model")?;
    }

    let reqs = drain_requests(&ctx.backend_state);
    assert_true(
        reqs[0].body.get("stream").and_then(|v| v.as_bool()) == Some(true),
        "Backend must receive stream:true",
    )?;

    Ok(())
}

/// Nothing after [DONE] reaches the client
pub async fn test_stream_stops_at_done(ctx: TestContext) -> anyhow::Result<()> {
    set_model_id(&ctx.backend_state, "qwen2.5-7b-instruct");
    queue_response(
        &ctx.backend_state,
        MockResponse::sse(&[
            chunk_payload("qwen2.5-7b-instruct", "done"),
            "[DONE]".to_string(),
            chunk_payload("qwen2.5-7b-instruct", "leaked"),
        ]),
    );

    let resp = send_streaming(&ctx.http_client, &ctx.relay_addr, basic_request("x")).await?;

    assert_true(resp.has_done_marker(), "Stream must end with [DONE]")?;
    assert_eq_str(&resp.accumulated_content(), "done", "content before [DONE]")?;

    Ok(())
}

/// A failing backend yields its status and one error frame
pub async fn test_stream_backend_error(ctx: TestContext) -> anyhow::Result<()> {
    queue_response(
        &ctx.backend_state,
        MockResponse::error(500, r#"{"error":"no model loaded"}"#),
    );

    let resp = send_streaming(&ctx.http_client, &ctx.relay_addr, basic_request("x")).await?;

    assert_status(resp.status, 500)?;
    let events = resp.data_events();
    assert_true(events.len() == 1, &format!("Expected one error frame, got {}", events.len()))?;
    let frame = events[0].parse_json()?;
    assert_true(frame.get("error").is_some(), &format!("Frame has no error: {}", frame))?;

    Ok(())
}
