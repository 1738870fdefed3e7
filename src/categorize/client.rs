//! Completion clients for model-assisted categorization
//!
//! Only one short answer is ever needed per example, so requests ask for a
//! handful of tokens at temperature zero by default.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Mutex;

/// Response from a completion backend
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated content
    pub content: String,
    /// Number of tokens used, when the backend reports it
    pub tokens_used: Option<usize>,
}

/// Connection settings for a completion backend
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Maximum tokens for the answer
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "qwen2.5-coder".to_string(),
            api_key: None,
            max_tokens: 32,
            temperature: 0.0,
        }
    }
}

/// Anything that can turn a prompt into a completion
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse>;
}

/// Wire protocol spoken by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Ollama,
    OpenAi,
}

impl Backend {
    /// Ollama listens on 11434; anything else is treated as OpenAI-compatible
    fn for_endpoint(endpoint: &str) -> Self {
        if endpoint.contains("11434") {
            Backend::Ollama
        } else {
            Backend::OpenAi
        }
    }

    fn name(self) -> &'static str {
        match self {
            Backend::Ollama => "Ollama",
            Backend::OpenAi => "OpenAI-compatible API",
        }
    }

    fn health_path(self) -> &'static str {
        match self {
            Backend::Ollama => "/api/tags",
            Backend::OpenAi => "/v1/models",
        }
    }
}

/// HTTP client for Ollama and OpenAI-compatible endpoints
pub struct LlmClient {
    config: LlmConfig,
    backend: Backend,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        Self {
            backend: Backend::for_endpoint(&endpoint),
            config: LlmConfig { endpoint, ..config },
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint, path)
    }

    /// Whether the endpoint answers at all
    pub async fn is_available(&self) -> bool {
        let url = self.url(self.backend.health_path());
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("{} unreachable at {}: {}", self.backend.name(), url, e);
                false
            }
        }
    }

    /// POST a JSON body and decode the JSON answer
    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let name = self.backend.name();
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} request failed: {} - {}", name, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", name))
    }
}

#[async_trait::async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse> {
        match self.backend {
            Backend::Ollama => {
                let request = GenerateRequest {
                    model: &self.config.model,
                    prompt,
                    stream: false,
                    options: GenerateOptions {
                        temperature: self.config.temperature,
                        num_predict: self.config.max_tokens,
                    },
                };
                let answer: GenerateAnswer = self.post("/api/generate", &request).await?;
                Ok(LlmResponse {
                    content: answer.response,
                    tokens_used: answer.eval_count,
                })
            }
            Backend::OpenAi => {
                let request = ChatRequest {
                    model: &self.config.model,
                    messages: [ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                    max_tokens: self.config.max_tokens,
                    temperature: self.config.temperature,
                };
                let answer: ChatAnswer = self.post("/v1/chat/completions", &request).await?;
                let content = answer
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content)
                    .unwrap_or_default();
                Ok(LlmResponse {
                    content,
                    tokens_used: answer.usage.map(|u| u.total_tokens),
                })
            }
        }
    }
}

// Ollama /api/generate

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct GenerateAnswer {
    response: String,
    eval_count: Option<usize>,
}

// OpenAI /v1/chat/completions

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatAnswer {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatAnswerMessage,
}

#[derive(Deserialize)]
struct ChatAnswerMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: usize,
}

/// Canned completion client for tests; answers by prompt substring
pub struct MockLlmClient {
    answers: Vec<(String, String)>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(fallback: &str) -> Self {
        Self {
            answers: Vec::new(),
            fallback: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer `answer` to prompts containing `needle`; earlier entries win
    pub fn answer_when(mut self, needle: &str, answer: &str) -> Self {
        self.answers.push((needle.to_string(), answer.to_string()));
        self
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CompletionClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let content = self
            .answers
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map_or_else(|| self.fallback.clone(), |(_, answer)| answer.clone());

        Ok(LlmResponse {
            content,
            tokens_used: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client() {
        let client = MockLlmClient::new("Usage example").answer_when("docker", "Non-MongoDB command");

        let response = client.complete("run docker compose up").await.unwrap();
        assert_eq!(response.content, "Non-MongoDB command");

        let response = client.complete("db.coll.find()").await.unwrap();
        assert_eq!(response.content, "Usage example");
        assert_eq!(client.prompts().len(), 2);
    }

    #[test]
    fn test_backend_detection() {
        let client = LlmClient::new(LlmConfig::default());
        assert_eq!(client.backend, Backend::Ollama);

        let client = LlmClient::new(LlmConfig {
            endpoint: "https://api.example.com/".to_string(),
            ..LlmConfig::default()
        });
        assert_eq!(client.backend, Backend::OpenAi);
        assert_eq!(client.url("/v1/models"), "https://api.example.com/v1/models");
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "m",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: 32,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 32);
    }
}
