use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::learning::llm::{LlmClient, LlmError};
use crate::{EngineError, EngineResult};

pub const LLM_URL_ENV_VAR: &str = "LEDGERLOOP_LLM_URL";
pub const LLM_API_KEY_ENV_VAR: &str = "LEDGERLOOP_LLM_API_KEY";
pub const LLM_MODEL_ENV_VAR: &str = "LEDGERLOOP_LLM_MODEL";

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct HttpLlmClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl HttpLlmClient {
    pub fn new(url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: Client::new(),
            url,
            api_key,
            model,
        }
    }

    /// Reads the endpoint from `LEDGERLOOP_LLM_URL`, `LEDGERLOOP_LLM_MODEL`
    /// and the optional `LEDGERLOOP_LLM_API_KEY`.
    pub fn from_env() -> EngineResult<Self> {
        let url = required_env(LLM_URL_ENV_VAR)?;
        let model = required_env(LLM_MODEL_ENV_VAR)?;
        let api_key = std::env::var(LLM_API_KEY_ENV_VAR)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Ok(Self::new(url, api_key, model))
    }
}

impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str, response_schema_hint: &str) -> Result<String, LlmError> {
        let system = format!(
            "You review bookkeeping classification rules. Reply with a single JSON object matching this schema: {response_schema_hint}"
        );
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: 0.0,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Transport(format!("status {status}: {body}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Malformed(error.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

fn required_env(name: &str) -> EngineResult<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EngineError::llm_not_configured(name))
}
