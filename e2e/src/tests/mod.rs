//! Test registry - all test cases are registered here

pub mod auth;
pub mod helpers;
pub mod streaming;

use crate::runner::TestCase;

/// Build and return all test cases
///
/// Tests are grouped by category. Each test:
/// 1. Sets the loaded model and queues a mock backend response
/// 2. Sends a request to the REAL relay
/// 3. Validates the response and what the backend received
pub fn all_tests() -> Vec<TestCase> {
    macro_rules! test {
        ($name:expr, $desc:expr, $func:path) => {
            TestCase {
                name: $name,
                description: $desc,
                run: Box::new(|ctx| Box::pin($func(ctx))),
            }
        };
    }

    vec![
        // ── Chat relay ───────────────────────────────────────────────────────
        test!(
            "chat/llama3_templating",
            "Fixed system message inserted, llama3 template and stops applied",
            chat::test_llama3_templating
        ),
        test!(
            "chat/model_swap",
            "Backend model change selects the chatml profile on the next request",
            chat::test_model_swap_picked_up
        ),
        test!(
            "chat/unknown_model_default",
            "Unmatched backend model uses the default profile",
            chat::test_unknown_model_uses_default
        ),
        test!(
            "chat/client_system_kept",
            "Client system message kept when override is off",
            chat::test_client_system_message_kept
        ),
        test!(
            "chat/empty_content_and_temperature",
            "Blank content becomes \".\" and temperature defaults to 0.7",
            chat::test_empty_content_and_temperature
        ),
        test!(
            "chat/backend_key",
            "Backend receives the configured key, not the client's",
            chat::test_backend_key_forwarded
        ),
        test!(
            "chat/backend_error_passthrough",
            "Backend error status and error field reach the client",
            chat::test_backend_error_passthrough
        ),
        test!(
            "chat/malformed_request",
            "Invalid request body is a 400",
            chat::test_malformed_request_rejected
        ),

        // ── Streaming ────────────────────────────────────────────────────────
        test!(
            "streaming/model_rewritten",
            "Chunks report the bare model name",
            streaming::test_stream_model_rewritten
        ),
        test!(
            "streaming/stops_at_done",
            "Nothing after [DONE] is relayed",
            streaming::test_stream_stops_at_done
        ),
        test!(
            "streaming/backend_error",
            "Backend error becomes a single error frame with its status",
            streaming::test_stream_backend_error
        ),

        // ── Legacy completions ───────────────────────────────────────────────
        test!(
            "legacy/reshaped",
            "/v1/completions runs the chat pipeline and returns text_completion",
            legacy::test_completion_reshaped
        ),
        test!(
            "legacy/unbounded",
            "Missing max_tokens is sent as -1",
            legacy::test_completion_unbounded
        ),

        // ── Pass-through endpoints ───────────────────────────────────────────
        test!("passthrough/health", "/health returns OK", passthrough::test_health),
        test!("passthrough/root", "/ returns the greeting", passthrough::test_root),
        test!(
            "passthrough/models",
            "/v1/models rewrites the first id to a bare name",
            passthrough::test_models_rewritten
        ),
        test!(
            "passthrough/options",
            "OPTIONS on relayed paths is answered by the backend",
            passthrough::test_options_relayed
        ),

        // ── Auth ─────────────────────────────────────────────────────────────
        test!(
            "auth/missing_key",
            "Request without a bearer token is a 401",
            auth::test_missing_key_rejected
        ),
        test!(
            "auth/invalid_key",
            "Request with an unknown key is a 401",
            auth::test_invalid_key_rejected
        ),
    ]
}
