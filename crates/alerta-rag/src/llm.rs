//! LLM Client implementations
//!
//! Chat-completion clients for OpenAI-compatible APIs and Ollama. Both send
//! the grounded prompt as system, history and user messages.

use alerta_core::{AlertaError, LlmClient, LlmConfig, LlmProvider, Prompt, PromptMessage, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AlertaError::Config(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// OpenAI API client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<PromptMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| AlertaError::Config("OpenAI API key required".to_string()))?;

        let mut client = Self::new(
            api_key.clone(),
            config.model.clone(),
            config.max_tokens,
            config.temperature,
        );
        client.client = http_client(config.timeout_secs)?;
        if let Some(url) = &config.openai_base_url {
            client.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(client)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: prompt.to_messages(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AlertaError::Gateway(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AlertaError::Gateway(format!("OpenAI error ({status}): {error_text}")));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| AlertaError::Gateway(format!("Failed to parse OpenAI response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AlertaError::Gateway("No response generated".to_string()))
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<PromptMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: LlmConfig::default().temperature,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut client = Self::new(config.ollama_url.clone(), config.model.clone());
        client.client = http_client(config.timeout_secs)?;
        client.temperature = config.temperature;
        Ok(client)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let request = OllamaRequest {
            model: &self.model,
            messages: prompt.to_messages(),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AlertaError::Gateway(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AlertaError::Gateway(format!("Ollama error ({status}): {error_text}")));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AlertaError::Gateway(format!("Failed to parse Ollama response: {e}")))?;

        Ok(result.message.content)
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAI => Ok(Box::new(OpenAiClient::from_config(config)?)),
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alerta_core::ChatTurn;

    #[test]
    fn test_openai_client_creation() {
        let client = OpenAiClient::new("test-key", "gpt-4o-mini", 1024, 0.2);
        assert_eq!(client.model, "gpt-4o-mini");
        assert_eq!(client.base_url, OPENAI_BASE_URL);
    }

    #[test]
    fn test_openai_from_config() {
        let config = LlmConfig {
            openai_api_key: Some("key".to_string()),
            openai_base_url: Some("http://localhost:8000/v1/".to_string()),
            ..Default::default()
        };
        let client = OpenAiClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000/v1");
        assert_eq!(client.temperature, 0.2);

        let err = OpenAiClient::from_config(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, AlertaError::Config(_)));
    }

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3");
        assert_eq!(client.model, "llama3");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_request_carries_history() {
        let prompt = Prompt {
            system: "sys".to_string(),
            history: vec![ChatTurn::user("q1"), ChatTurn::assistant("a1")],
            user: "q2".to_string(),
        };
        let request = OllamaRequest {
            model: "llama3",
            messages: prompt.to_messages(),
            stream: false,
            options: OllamaOptions { temperature: 0.2 },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"].as_array().unwrap().len(), 4);
        assert_eq!(value["messages"][2]["role"], "assistant");
    }

    #[test]
    fn test_response_decoding() {
        let openai: OpenAiResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"En Tabasco [1]."},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(
            openai.choices[0].message.content.as_deref(),
            Some("En Tabasco [1].")
        );

        let ollama: OllamaResponse = serde_json::from_str(
            r#"{"model":"llama3","message":{"role":"assistant","content":"No encontrado"},"done":true}"#,
        )
        .unwrap();
        assert_eq!(ollama.message.content, "No encontrado");
    }

    #[test]
    fn test_factory_requires_key_for_openai() {
        assert!(create_llm_client(&LlmConfig::default()).is_err());

        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            ..Default::default()
        };
        assert!(create_llm_client(&config).is_ok());
    }
}
