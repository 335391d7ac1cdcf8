//! Provider for a local Ollama server

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{MentorError, Result};
use crate::llm::{LLMProvider, LLMRequest, LLMResponse, Message, ModelInfo, TokenUsage, classify_status};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen3:14b";

/// Inline reasoning some local models emit ahead of the answer
static THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block regex"));

/// Talks to `POST {base_url}/api/chat` without streaming
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>, base_url: Option<impl Into<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url
                .map(Into::into)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Model from the argument, then `OLLAMA_MODEL`; server from
    /// `OLLAMA_BASE_URL`
    pub fn from_env(model: Option<impl Into<String>>) -> Self {
        let model = model
            .map(Into::into)
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self::new(model, std::env::var("OLLAMA_BASE_URL").ok())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body<'a>(&'a self, request: &'a LLMRequest) -> ChatBody<'a> {
        ChatBody {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            options: Options {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
    done_reason: Option<String>,
    prompt_eval_count: Option<usize>,
    eval_count: Option<usize>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
    /// Separate reasoning channel of thinking models
    thinking: Option<String>,
}

impl ChatReply {
    /// Answer text with inline `<think>` blocks removed. Falls back to the
    /// thinking channel when the model answered only there.
    fn into_response(self, model: &str) -> LLMResponse {
        if self.done_reason.as_deref() == Some("length") {
            tracing::warn!(model, "Reply stopped at num_predict; trailing sections may be missing");
        }

        let mut content = THINK_RE.replace_all(&self.message.content, "").trim().to_string();
        if content.is_empty() {
            content = self.message.thinking.unwrap_or_default().trim().to_string();
        }

        let usage = self
            .prompt_eval_count
            .zip(self.eval_count)
            .map(|(prompt_tokens, completion_tokens)| TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            });

        LLMResponse { content, usage }
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| {
                MentorError::Transient(format!("Ollama unreachable at {}: {}", self.base_url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("Ollama", status, &text));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| MentorError::Transient(format!("undecodable Ollama reply: {}", e)))?;
        Ok(reply.into_response(&self.model))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}
