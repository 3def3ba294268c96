//! AI-ethics domain analysis responder

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{history_messages, ContentResponder};
use crate::api::{ApiClient, ApiMessage};
use crate::types::{ConversationThread, Responder};

const SYSTEM_PROMPT: &str = "\
You are an AI ethics scholar with deep expertise in artificial intelligence \
ethics, particularly human-AI dependency and its societal implications.

Your expertise areas:
- Human-AI dependency: psychological, social, and practical aspects of \
reliance on AI systems
- AI ethics frameworks and how they apply to development and deployment
- Societal impact across employment, education, healthcare, and social life
- Risk assessment of increasing AI integration
- Policy, governance, and regulatory approaches
- Philosophical implications of agency and autonomy

Communication style: academic yet accessible, evidence-based, balanced. \
Present multiple viewpoints, acknowledge nuance, and encourage critical \
thinking rather than delivering definitive moral judgments. If a question is \
outside your ethics expertise, say so.";

const HISTORY_LIMIT: usize = 10;

/// Domain-expert responder for AI ethics and human-AI dependency topics
pub struct DomainExpert {
    api: ApiClient,
}

impl DomainExpert {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ContentResponder for DomainExpert {
    fn responder(&self) -> Responder {
        Responder::DomainExpert
    }

    async fn respond(&self, input: &str, thread: &ConversationThread) -> Result<String> {
        debug!("Delegating to domain expert");

        let mut messages = history_messages(thread, HISTORY_LIMIT);
        messages.push(ApiMessage::user(input));

        self.api
            .generate(&messages, SYSTEM_PROMPT)
            .await
            .context("Domain expert call failed")
    }
}
