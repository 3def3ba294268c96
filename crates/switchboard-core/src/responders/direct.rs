//! Direct handling — the orchestrator's own conversational voice

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{history_messages, ContentResponder};
use crate::api::{ApiClient, ApiMessage};
use crate::types::{ConversationThread, Responder};

const SYSTEM_PROMPT: &str = "\
You are a friendly, helpful assistant handling requests that no specialized \
responder covers: casual greetings, general conversation, jokes, simple math \
and facts, creative requests, and general advice.

When responding:
- Be warm, conversational, and engaging
- Provide helpful and thoughtful answers
- Be honest about your capabilities and limitations";

/// Maximum prior turns to include as context
const HISTORY_LIMIT: usize = 10;

/// Fallback voice for requests no specialist covers — also the recovery
/// path when specialists fail.
pub struct DirectHandler {
    api: ApiClient,
}

impl DirectHandler {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ContentResponder for DirectHandler {
    fn responder(&self) -> Responder {
        Responder::DirectHandler
    }

    async fn respond(&self, input: &str, thread: &ConversationThread) -> Result<String> {
        debug!("Handling request directly");

        let mut messages = history_messages(thread, HISTORY_LIMIT);
        messages.push(ApiMessage::user(input));

        self.api
            .generate(&messages, SYSTEM_PROMPT)
            .await
            .context("Direct handling failed")
    }
}
