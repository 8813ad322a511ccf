use crate::llm::client::{LLMClient, ModelSettings, TextStream};
use crate::types::{AppError, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
    models::ModelOptions,
};

const DEFAULT_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
    settings: ModelSettings,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, settings: ModelSettings) -> Result<Self> {
        let parsed = url::Url::parse(&base_url).map_err(|e| {
            AppError::Configuration(format!("Invalid Ollama base url '{}': {}", base_url, e))
        })?;
        let host = parsed.host_str().ok_or_else(|| {
            AppError::Configuration(format!("Ollama base url '{}' has no host", base_url))
        })?;
        let port = parsed.port().unwrap_or(DEFAULT_PORT);

        let client = Ollama::new(format!("{}://{}", parsed.scheme(), host), port);

        Ok(Self {
            client,
            model,
            settings,
        })
    }

    fn options(&self) -> ModelOptions {
        ModelOptions::default()
            .temperature(self.settings.temperature)
            .num_predict(i32::try_from(self.settings.max_tokens).unwrap_or(i32::MAX))
    }

    fn request(&self, system: Option<&str>, prompt: &str) -> ChatMessageRequest {
        ChatMessageRequest::new(self.model.clone(), Self::messages(system, prompt))
            .options(self.options())
    }

    fn messages(system: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system.to_string()));
        }
        messages.push(ChatMessage::user(prompt.to_string()));
        messages
    }

    async fn chat(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let request = self.request(system, prompt);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(None, prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(Some(system), prompt).await
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream> {
        let request = self.request(Some(system), prompt);

        let mut stream_response = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama stream error: {}", e)))?;

        let output_stream = stream! {
            while let Some(chunk_result) = stream_response.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        let content = chunk.message.content;
                        if !content.is_empty() {
                            yield Ok(content);
                        }
                    }
                    Err(_) => {
                        yield Err(AppError::LLM("Stream chunk error".to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(output_stream)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
