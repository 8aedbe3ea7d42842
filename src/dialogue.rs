// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NPC dialogue generation.
//!
//! The generator is asked for a one-line `dialogue|behavior` reply; this
//! module owns the prompt and the reply parsing, the completion backend is
//! behind [`DialogueGenerator`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Completion length cap, in tokens.
pub const MAX_TOKENS: u32 = 50;
pub const TEMPERATURE: f32 = 0.7;

/// Behavior used when the reply carries no `|` separator.
pub const DEFAULT_BEHAVIOR: &str = "NEUTRAL";

#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    #[error("Dialogue service request failed: {0}")]
    Request(String),

    #[error("Dialogue service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Dialogue service response was invalid: {0}")]
    InvalidResponse(String),
}

/// Text completion backend.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, DialogueError>;
}

/// Prompt for an NPC reacting to `action` given its memory.
pub fn npc_prompt(memory: &str, action: &str) -> String {
    let past = if memory.trim().is_empty() { "none" } else { memory };
    format!(
        "NPC past: {past}. Action: {action}. Reply with dialogue|behavior (HOSTILE, FRIENDLY, etc.)."
    )
}

/// A parsed NPC reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpcReply {
    pub dialogue: String,
    pub behavior: String,
}

/// Split on the first `|`; both halves trimmed.
pub fn split_reply(text: &str) -> NpcReply {
    match text.split_once('|') {
        Some((dialogue, behavior)) => NpcReply {
            dialogue: dialogue.trim().to_string(),
            behavior: behavior.trim().to_string(),
        },
        None => NpcReply {
            dialogue: text.trim().to_string(),
            behavior: DEFAULT_BEHAVIOR.to_string(),
        },
    }
}

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiDialogue {
    base_url: String,
    api_key: String,
    model: String,
    http: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiDialogue {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DialogueError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DialogueError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl DialogueGenerator for OpenAiDialogue {
    async fn complete(&self, prompt: &str) -> Result<String, DialogueError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DialogueError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DialogueError::Status { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DialogueError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DialogueError::InvalidResponse("no completion in response".to_string()))
    }
}
