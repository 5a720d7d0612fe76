//! Inbound API-key checks

use serde_json::json;

use crate::backend::drain_requests;
use crate::client::send_post;
use crate::runner::TestContext;

use super::helpers::*;

/// No Authorization header is a 401 and the backend is never called
pub async fn test_missing_key_rejected(ctx: TestContext) -> anyhow::Result<()> {
    let resp = send_post(
        &ctx.http_client,
        &ctx.relay_addr,
        "/v1/chat/completions",
        basic_request("hi"),
        None,
    )
    .await?;

    assert_status(resp.status, 401)?;
    assert_eq_str(resp.get_str("error.code").unwrap_or(""), "unauthorized", "error code")?;
    assert_true(drain_requests(&ctx.backend_state).is_empty(), "Backend must not be called")?;

    Ok(())
}

/// A key that is not configured is a 401 and is never echoed back
pub async fn test_invalid_key_rejected(ctx: TestContext) -> anyhow::Result<()> {
    let resp = send_post(
        &ctx.http_client,
        &ctx.relay_addr,
        "/v1/completions",
        json!({"prompt": "hi"}),
        Some("not-a-real-key"),
    )
    .await?;

    assert_status(resp.status, 401)?;
    assert_true(
        !resp.body.to_string().contains("not-a-real-key"),
        "Rejected key must not appear in the response",
    )?;

    Ok(())
}
