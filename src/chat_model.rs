//! Chat model client
//!
//! Stateless wrapper over the LLM endpoint: one system + user message pair
//! in, one text reply out. No retries here; every caller has its own
//! fallback policy. Uses a long-lived reqwest::Client for connection
//! pooling.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{Result, TravelPlannerError};

/// Interface the recommenders and the chat service program against.
/// Tests substitute canned implementations.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Reusable chat model client (connection-pooled)
pub struct ChatModelClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ChatModelClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl ChatModel for ChatModelClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(TravelPlannerError::LlmUnavailable(
                "LLM_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: user.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system.to_string(),
                }],
            },
        };

        info!("Calling chat model endpoint");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat model request failed: {}", e);
                TravelPlannerError::LlmUnavailable(format!("Chat model request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Chat model error response: {}", error_text);
            return Err(TravelPlannerError::LlmUnavailable(format!(
                "Chat model returned error: {}",
                error_text
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat model response: {}", e);
            TravelPlannerError::LlmUnavailable(format!("Chat model parse error: {}", e))
        })?;

        let text = parsed
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.clone())
            .ok_or(TravelPlannerError::LlmEmptyResponse)?;

        if text.trim().is_empty() {
            return Err(TravelPlannerError::LlmEmptyResponse);
        }

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
pub mod testing {
    //! Canned chat models for service tests.

    use super::*;
    use std::sync::Mutex;

    /// Always returns the same reply.
    pub struct StaticModel {
        reply: String,
    }

    impl StaticModel {
        pub fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatModel for StaticModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    /// Always fails as if the upstream were down.
    pub struct FailingModel;

    #[async_trait::async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Err(TravelPlannerError::LlmUnavailable(
                "simulated outage".to_string(),
            ))
        }
    }

    /// Returns queued replies in order, recording received prompts.
    pub struct ScriptedModel {
        replies: Mutex<Vec<String>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().map(String::from).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or(TravelPlannerError::LlmEmptyResponse)
        }
    }
}
