//! Responder adapters — one uniform wrapper per external capability
//!
//! Each adapter is constructed with its collaborator handles passed in and
//! injected into the executor at startup; there is no ambient global state.

pub mod direct;
pub mod domain_expert;
pub mod email;
pub mod knowledge_qa;
pub mod weather;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::api::ApiMessage;
use crate::planner::Planner;
use crate::types::{ConversationThread, CustomerInfo, Responder};

pub use direct::DirectHandler;
pub use domain_expert::DomainExpert;
pub use email::{EmailFormatter, SIGNATURE};
pub use knowledge_qa::KnowledgeQa;
pub use weather::WeatherLookup;

/// A responder that produces content for a request
#[async_trait]
pub trait ContentResponder: Send + Sync {
    /// Which responder identity this adapter serves
    fn responder(&self) -> Responder;

    /// Produce a response for the input, given prior conversation context
    async fn respond(&self, input: &str, thread: &ConversationThread) -> Result<String>;
}

/// The email-formatting stage. Implementations are expected to recover
/// internally (a fixed-template email at worst); an Err is a last resort
/// that callers treat as "use the unformatted content".
#[async_trait]
pub trait EmailFormat: Send + Sync {
    async fn format(&self, content: &str, info: &CustomerInfo) -> Result<String>;
}

/// All adapters the executor can dispatch to, injected at startup
#[derive(Clone)]
pub struct ResponderSet {
    pub knowledge_qa: Arc<dyn ContentResponder>,
    pub domain_expert: Arc<dyn ContentResponder>,
    pub weather: Arc<dyn ContentResponder>,
    pub direct: Arc<dyn ContentResponder>,
    pub email: Arc<dyn EmailFormat>,
    pub planner: Arc<dyn Planner>,
}

impl ResponderSet {
    /// The content adapter for a responder, or None for the two
    /// non-content stages (email formatting and planning).
    pub fn content_adapter(&self, responder: Responder) -> Option<&Arc<dyn ContentResponder>> {
        match responder {
            Responder::KnowledgeQa => Some(&self.knowledge_qa),
            Responder::DomainExpert => Some(&self.domain_expert),
            Responder::WeatherLookup => Some(&self.weather),
            Responder::DirectHandler => Some(&self.direct),
            Responder::EmailFormatter => None,
            Responder::PlanningMode => None,
        }
    }
}

/// Build API history messages from prior turns, capped at `limit` most
/// recent. The in-flight user turn is excluded — each adapter appends its
/// own final message built from the raw input.
pub(crate) fn history_messages(thread: &ConversationThread, limit: usize) -> Vec<ApiMessage> {
    let history = thread.history();
    let skip = history.len().saturating_sub(limit);
    history[skip..]
        .iter()
        .map(|turn| ApiMessage {
            role: turn.role.to_string(),
            content: turn.text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_messages_caps_and_excludes_pending_turn() {
        let mut thread = ConversationThread::new();
        for i in 0..5 {
            thread.push_user(format!("question {i}"));
            thread.push_assistant(format!("answer {i}"));
        }
        thread.push_user("current question");

        let messages = history_messages(&thread, 4);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].content, "question 3");
        assert_eq!(messages[3].content, "answer 4");
    }

    #[test]
    fn test_history_messages_empty_thread() {
        let thread = ConversationThread::new();
        assert!(history_messages(&thread, 10).is_empty());
    }
}
