//! Knowledge-base Q&A responder with document retrieval

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{history_messages, ContentResponder};
use crate::api::{ApiClient, ApiMessage};
use crate::types::{ConversationThread, Responder};
use switchboard_knowledge::{SupportDocument, SupportStore};

const SYSTEM_PROMPT: &str = "\
You are a helpful customer support assistant. Answer questions using the \
provided knowledge base context.

Guidelines:
- Always check the provided context first before answering
- Cite relevant information from the knowledge base when possible
- Provide clear, step-by-step instructions when needed
- If the knowledge base has no relevant information, say so and suggest \
contacting support directly
- If multiple solutions exist, list them easiest first
- Maintain a friendly, professional tone";

const HISTORY_LIMIT: usize = 6;

/// Q&A responder backed by the support-document store
pub struct KnowledgeQa {
    api: ApiClient,
    store: Arc<SupportStore>,
    top_k: usize,
}

impl KnowledgeQa {
    pub fn new(api: ApiClient, store: Arc<SupportStore>) -> Self {
        Self {
            api,
            store,
            top_k: 3,
        }
    }

    /// Override how many documents to retrieve per question
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

#[async_trait]
impl ContentResponder for KnowledgeQa {
    fn responder(&self) -> Responder {
        Responder::KnowledgeQa
    }

    async fn respond(&self, input: &str, thread: &ConversationThread) -> Result<String> {
        debug!("Searching knowledge base for: {:.50}", input);

        // Empty retrieval is "no context", not a failure
        let documents = self
            .store
            .search(input, self.top_k)
            .await
            .unwrap_or_else(|e| {
                info!("Knowledge base search failed: {}", e);
                Vec::new()
            });

        if !documents.is_empty() {
            info!("Found {} relevant documents", documents.len());
        }

        let context = format_context(&documents);
        let enhanced = format!("{context}\n\nCustomer Question: {input}");

        let mut messages = history_messages(thread, HISTORY_LIMIT);
        messages.push(ApiMessage::user(enhanced));

        self.api
            .generate(&messages, SYSTEM_PROMPT)
            .await
            .context("Knowledge Q&A call failed")
    }
}

/// Format retrieved documents as a context block for the model
fn format_context(documents: &[(SupportDocument, f32)]) -> String {
    if documents.is_empty() {
        return "No relevant information found in the knowledge base.".to_string();
    }

    let mut parts = vec!["=== CUSTOMER SUPPORT KNOWLEDGE BASE ===".to_string()];

    for (i, (doc, score)) in documents.iter().enumerate() {
        parts.push(format!(
            "\nDocument {}: {}\nCategory: {}\nPriority: {}\nTags: {}\nRelevance Score: {:.3}\n\nContent:\n{}\n\n{}",
            i + 1,
            doc.title,
            doc.category,
            doc.priority,
            doc.tags.join(", "),
            score,
            doc.content,
            "-".repeat(50),
        ));
    }

    parts.push(
        "\n=== END KNOWLEDGE BASE ===\n\nUse the above information to answer the \
         customer's question. If it is not relevant, say so and suggest contacting \
         support directly."
            .to_string(),
    );

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str, title: &str) -> SupportDocument {
        SupportDocument {
            id: id.to_string(),
            title: title.to_string(),
            content: "Some content.".to_string(),
            category: "account".to_string(),
            tags: vec!["security".to_string(), "login".to_string()],
            priority: "high".to_string(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_format_context_empty() {
        let context = format_context(&[]);
        assert!(context.contains("No relevant information"));
    }

    #[test]
    fn test_format_context_includes_document_fields() {
        let docs = vec![(doc("account-001", "Password Reset"), 0.873f32)];
        let context = format_context(&docs);
        assert!(context.contains("Document 1: Password Reset"));
        assert!(context.contains("Category: account"));
        assert!(context.contains("Tags: security, login"));
        assert!(context.contains("Relevance Score: 0.873"));
        assert!(context.contains("END KNOWLEDGE BASE"));
    }

    #[test]
    fn test_format_context_numbers_documents() {
        let docs = vec![
            (doc("a", "First"), 0.9),
            (doc("b", "Second"), 0.5),
        ];
        let context = format_context(&docs);
        assert!(context.contains("Document 1: First"));
        assert!(context.contains("Document 2: Second"));
    }
}
