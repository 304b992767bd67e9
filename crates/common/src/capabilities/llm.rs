//! OpenAI-compatible chat completion client
//!
//! Works against any endpoint exposing `POST {api_base}/chat/completions`
//! (DeepSeek, OpenAI, vLLM, Ollama's compatibility layer).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::Transport;
use super::{Capability, CapabilityError, CompletionConstraints, LanguageModel};
use crate::config::LlmConfig;

pub struct OpenAiCompatibleClient {
    transport: Transport,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self, CapabilityError> {
        Ok(Self {
            transport: Transport::new(
                Capability::Llm,
                config.timeout_secs,
                config.requests_per_second,
                config.max_retries,
            )?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    #[tracing::instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn complete(
        &self,
        prompt: &str,
        constraints: &CompletionConstraints,
    ) -> Result<String, CapabilityError> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: constraints.max_tokens,
            temperature: constraints.temperature,
        };

        let response: ChatResponse = self
            .transport
            .send_json(&self.model, |client| {
                let builder = client.post(&url).json(&request);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::malformed(self.transport.capability(), "no completion in response"))
    }
}
