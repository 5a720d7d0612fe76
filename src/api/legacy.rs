//! Legacy `/v1/completions` types, served by mapping onto chat completions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::models::bare_model_name;
use super::openai::{ChatCompletionRequest, ChatCompletionResponse, Message, Role};

/// Single-prompt completion request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: i64,
}

impl CompletionRequest {
    /// One user message, non-streaming. A non-positive `max_tokens` means unlimited (-1).
    pub fn into_chat_request(self) -> ChatCompletionRequest {
        let max_tokens = if self.max_tokens > 0 { self.max_tokens } else { -1 };

        let mut params = Map::new();
        params.insert("max_tokens".to_string(), Value::from(max_tokens));

        ChatCompletionRequest {
            messages: vec![Message::new(Role::User, self.prompt)],
            stream: false,
            params,
            ..ChatCompletionRequest::default()
        }
    }
}

/// `text_completion` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<TextChoice>,
    pub usage: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextChoice {
    pub text: String,
    pub index: u32,
    pub logprobs: Option<Value>,
    pub finish_reason: Option<String>,
}

impl TextCompletionResponse {
    /// Reshape a chat completion. Returns None when the backend sent no choices.
    pub fn from_chat(chat: ChatCompletionResponse) -> Option<Self> {
        let choice = chat.choices.into_iter().next()?;
        let text = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();

        Some(Self {
            id: chat.id.replace("chatcmpl", "cmpl"),
            object: "text_completion".to_string(),
            created: chat.created,
            model: bare_model_name(&chat.model).to_string(),
            choices: vec![TextChoice {
                text,
                index: choice.index,
                logprobs: None,
                finish_reason: choice.finish_reason,
            }],
            usage: chat.usage,
        })
    }
}
