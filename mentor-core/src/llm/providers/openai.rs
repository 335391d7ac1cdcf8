//! Chat-completions provider for OpenAI and compatible endpoints

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MentorError, Result};
use crate::llm::{LLMProvider, LLMRequest, LLMResponse, Message, ModelInfo, TokenUsage, classify_status};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Talks to `POST {base_url}/chat/completions`
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Point at a self-hosted or proxy endpoint speaking the same protocol
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Key from `OPENAI_API_KEY`; model from the argument, then
    /// `OPENAI_MODEL`; endpoint from `OPENAI_BASE_URL`
    pub fn from_env(model: Option<impl Into<String>>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            MentorError::Configuration(
                "no api_key in [llm] and OPENAI_API_KEY is not set".to_string(),
            )
        })?;
        let model = model
            .map(Into::into)
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::with_base_url(api_key, model, base_url))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn body<'a>(&'a self, request: &'a LLMRequest) -> ChatBody<'a> {
        ChatBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    /// Set instead of `content` when the model declines
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl Completion {
    /// First choice's text. A refusal is a provider error: asking again at the
    /// same prompt will not produce a challenge or review.
    fn into_response(self, model: &str) -> Result<LLMResponse> {
        let choice = self.choices.into_iter().next();
        if choice.as_ref().and_then(|c| c.finish_reason.as_deref()) == Some("length") {
            tracing::warn!(model, "Reply stopped at max_tokens; trailing sections may be missing");
        }

        let message = choice.and_then(|c| c.message);
        if let Some(refusal) = message.as_ref().and_then(|m| m.refusal.as_deref()) {
            return Err(MentorError::Provider(format!("model refused: {}", refusal)));
        }

        Ok(LLMResponse {
            content: message.and_then(|m| m.content).unwrap_or_default(),
            usage: self.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| MentorError::Transient(format!("OpenAI unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(classify_status("OpenAI", status, &detail));
        }

        let completion: Completion = response
            .json()
            .await
            .map_err(|e| MentorError::Transient(format!("undecodable OpenAI reply: {}", e)))?;
        completion.into_response(&self.model)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "openai".to_string(),
            model_name: self.model.clone(),
        }
    }
}
