//! Streaming response handling (SSE)
//!
//! Backend frames are re-emitted one by one with the `model` field reduced to
//! its bare name. The stream ends at `data: [DONE]`; anything the backend
//! sends after the sentinel is never read.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::pin::Pin;

use crate::api::bare_model_name;
use crate::error::RelayError;

/// Terminal frame of an OpenAI-style stream
pub const DONE_FRAME: &str = "data: [DONE]";

const STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Largest frame buffered while waiting for its blank line
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    Terminated,
}

/// Splits upstream bytes into SSE frames and rewrites each one
#[derive(Debug)]
pub struct ChunkRewriter {
    buffer: Vec<u8>,
    /// Buffer prefix already known to hold no frame boundary
    scanned: usize,
    max_frame: usize,
    state: StreamState,
    frames: usize,
}

impl Default for ChunkRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkRewriter {
    pub fn new() -> Self {
        Self::with_frame_limit(MAX_FRAME_BYTES)
    }

    pub fn with_frame_limit(max_frame: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_frame,
            state: StreamState::Streaming,
            frames: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == StreamState::Terminated
    }

    /// Feed a network chunk, returning every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, RelayError> {
        if self.is_terminated() {
            return Ok(Vec::new());
        }

        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut output = Vec::new();
        while let Some(end) = find_frame_end(&self.buffer, self.scanned) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            self.scanned = 0;
            if let Some(frame) = self.rewrite_frame(&raw[..end])? {
                output.push(frame);
            }
            if self.is_terminated() {
                self.buffer.clear();
                return Ok(output);
            }
        }

        // a trailing '\n' may pair with the next chunk
        self.scanned = self.buffer.len().saturating_sub(1);
        if self.buffer.len() > self.max_frame {
            self.state = StreamState::Terminated;
            self.buffer.clear();
            return Err(RelayError::MalformedUpstreamChunk(format!(
                "frame exceeds {} bytes without a terminating blank line",
                self.max_frame
            )));
        }

        Ok(output)
    }

    /// Upstream closed: flush a trailing frame that lacked its blank line
    pub fn finish(&mut self) -> Result<Vec<String>, RelayError> {
        if self.is_terminated() {
            return Ok(Vec::new());
        }

        let rest = std::mem::take(&mut self.buffer);
        let output = self.rewrite_frame(&rest)?.into_iter().collect();
        self.state = StreamState::Terminated;
        Ok(output)
    }

    fn rewrite_frame(&mut self, raw: &[u8]) -> Result<Option<String>, RelayError> {
        let frame = std::str::from_utf8(raw)
            .map_err(|e| RelayError::MalformedUpstreamChunk(format!("invalid UTF-8: {}", e)))?;
        let frame = frame.trim();

        if frame.is_empty() {
            return Ok(None);
        }

        // data lines of one event form a single payload, joined by '\n'
        let mut lines = Vec::new();
        let mut data: Option<(usize, Vec<&str>)> = None;
        for line in frame.lines() {
            match line.strip_prefix("data:") {
                Some(payload) => {
                    let payload = payload.strip_prefix(' ').unwrap_or(payload);
                    if let Some((_, parts)) = data.as_mut() {
                        parts.push(payload);
                    } else {
                        data = Some((lines.len(), vec![payload]));
                        lines.push(String::new());
                    }
                }
                // comments, event:, id:, retry:
                None => lines.push(line.to_string()),
            }
        }

        if let Some((slot, parts)) = data {
            let payload = parts.join("\n");
            if payload.trim() == "[DONE]" {
                tracing::debug!(frames = self.frames, "Stream finished");
                self.state = StreamState::Terminated;
                return Ok(Some(format!("{}\n\n", DONE_FRAME)));
            }
            lines[slot] = if payload.trim().is_empty() {
                "data:".to_string()
            } else {
                format!("data: {}", rewrite_payload(&payload)?)
            };
        }

        self.frames += 1;
        Ok(Some(format!("{}\n\n", lines.join("\n"))))
    }
}

fn find_frame_end(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| pos + from)
}

/// Parse a JSON payload and replace its `model` with the bare model name
pub fn rewrite_payload(payload: &str) -> Result<String, RelayError> {
    let mut chunk: Value = serde_json::from_str(payload).map_err(|e| {
        RelayError::MalformedUpstreamChunk(format!("{}: {}", e, preview(payload)))
    })?;

    if let Some(Value::String(model)) = chunk.get_mut("model") {
        let bare = bare_model_name(model).to_string();
        *model = bare;
    }

    serde_json::to_string(&chunk).map_err(|e| RelayError::MalformedUpstreamChunk(e.to_string()))
}

fn preview(payload: &str) -> String {
    payload.chars().take(120).collect()
}

/// Logs when the caller goes away before the stream ended
struct DisconnectGuard {
    finished: bool,
}

impl DisconnectGuard {
    fn disarm(&mut self) {
        self.finished = true;
    }
}
impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!("Client disconnected, closing upstream stream");
        }
    }
}

struct StreamRelay<E> {
    upstream: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
    rewriter: ChunkRewriter,
    pending: VecDeque<String>,
    done: bool,
    guard: DisconnectGuard,
}

impl<E> StreamRelay<E> {
    fn fail(&mut self, error: std::io::Error) -> Result<Bytes, std::io::Error> {
        self.done = true;
        self.pending.clear();
        self.guard.disarm();
        Err(error)
    }
}

/// Rewrite an upstream SSE byte stream.
///
/// The upstream is owned by the returned stream, so dropping it (client
/// disconnect) or reaching the sentinel releases the backend connection.
/// A malformed frame yields one error item, which aborts the response body.
pub fn rewrite_stream<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let relay = StreamRelay {
        upstream: Box::pin(upstream),
        rewriter: ChunkRewriter::new(),
        pending: VecDeque::new(),
        done: false,
        guard: DisconnectGuard { finished: false },
    };

    futures::stream::unfold(relay, |mut relay| async move {
        loop {
            if let Some(frame) = relay.pending.pop_front() {
                return Some((Ok(Bytes::from(frame)), relay));
            }
            if relay.done || relay.rewriter.is_terminated() {
                relay.guard.disarm();
                return None;
            }

            match relay.upstream.next().await {
                Some(Ok(chunk)) => {
                    tracing::trace!("Raw SSE chunk ({} bytes)", chunk.len());
                    match relay.rewriter.push(&chunk) {
                        Ok(frames) => relay.pending.extend(frames),
                        Err(e) => {
                            tracing::error!(error = %e, "Aborting stream");
                            let item = relay.fail(std::io::Error::new(std::io::ErrorKind::InvalidData, e));
                            return Some((item, relay));
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Error reading stream chunk");
                    let item = relay.fail(std::io::Error::other(e.to_string()));
                    return Some((item, relay));
                }
                None => match relay.rewriter.finish() {
                    Ok(frames) => {
                        if !frames.is_empty() {
                            tracing::debug!("Upstream closed mid-frame, flushing remainder");
                        }
                        relay.pending.extend(frames);
                        relay.done = true;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Aborting stream");
                        let item = relay.fail(std::io::Error::new(std::io::ErrorKind::InvalidData, e));
                        return Some((item, relay));
                    }
                },
            }
        }
    })
}

/// Single frame reporting a backend error status
pub fn error_frame(status: StatusCode, body: &str) -> String {
    let error = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut map)) if map.contains_key("error") => map.remove("error").unwrap_or(Value::Null),
        Ok(other) => json!({"message": other, "code": status.as_u16()}),
        Err(_) => json!({"message": body, "code": status.as_u16()}),
    };
    format!("data: {}\n\n", json!({ "error": error }))
}

/// Turn a backend streaming response into the client response
pub async fn handle_streaming_response(backend_response: reqwest::Response) -> Response {
    let status = backend_response.status();

    if !status.is_success() {
        let body = match backend_response.text().await {
            Ok(body) => body,
            Err(e) => e.to_string(),
        };
        tracing::error!(status = %status, error_body = %body, "Backend returned error response");
        return (
            status,
            [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
            error_frame(status, &body),
        )
            .into_response();
    }

    let stream = rewrite_stream(backend_response.bytes_stream());

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
        Body::from_stream(stream),
    )
        .into_response()
}
