use crate::embeddings::OPENAI_BASE_URL;
use crate::traits::{CompletionModel, PromptMessage};
use crate::{ChatOptions, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(api_key: impl Into<String>, options: &ChatOptions) -> Self {
        Self {
            client: Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: options.model.clone(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl CompletionModel for OpenAiChat {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<Option<String>, SearchError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::backend("openai-chat", format!("{status}: {body}")));
        }

        let payload: ChatCompletionResponse = response.json().await?;
        Ok(first_choice(payload))
    }
}

fn first_choice(payload: ChatCompletionResponse) -> Option<String> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}

/// Completion used when no API key is configured: echoes the last user turn.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoCompletion;

#[async_trait]
impl CompletionModel for EchoCompletion {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<Option<String>, SearchError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map(|message| message.content.as_str())
            .unwrap_or_default();

        Ok(Some(format!(
            "테스트 응답입니다. 귀하의 메시지: \"{last_user}\"\n현재 OpenAI API가 연결되지 않은 테스트 모드입니다."
        )))
    }
}
