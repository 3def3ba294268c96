//! The public orchestration entry point
//!
//! `handle_request` is the sole operation exposed to callers: append the
//! user turn, classify, route, execute, append the assistant turn. Partial
//! internal failures are absorbed along the way; an error here means every
//! path, including the DirectHandler fallback, failed.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info};

use crate::classifier::classify;
use crate::executor::WorkflowExecutor;
use crate::routing::RoutingPolicy;
use crate::types::ConversationThread;

/// Coordinates classification, routing, and workflow execution
pub struct Orchestrator {
    policy: RoutingPolicy,
    executor: WorkflowExecutor,
}

impl Orchestrator {
    pub fn new(policy: RoutingPolicy, executor: WorkflowExecutor) -> Self {
        Self { policy, executor }
    }

    /// Handle one user request against a conversation thread.
    ///
    /// The thread is mutated in place: the user turn is appended before
    /// dispatch and the assistant turn after completion. Callers must
    /// serialize requests per thread.
    pub async fn handle_request(
        &self,
        input: &str,
        thread: &mut ConversationThread,
    ) -> Result<String> {
        info!("Handling request: {:.100}", input);
        let start = Instant::now();

        thread.push_user(input);

        let classification = classify(input);
        debug!("Classification: {:?}", classification);

        let decision = self.policy.decide(input, &classification).await;
        info!(
            "Routing to {:?} (multi={}): {}",
            decision.responders, decision.is_multi_agent, decision.reasoning
        );

        let response = self.executor.execute(input, &decision, thread).await?;
        thread.push_assistant(response.clone());

        info!("Request completed in {:.2}s", start.elapsed().as_secs_f64());
        Ok(response)
    }
}

/// Static description of one responder capability
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
}

/// The capabilities this orchestrator can dispatch to
pub fn available_responders() -> Vec<Capability> {
    vec![
        Capability {
            name: "Knowledge Q&A",
            description: "Customer support questions, product information, and technical help",
            keywords: &["support", "help", "question", "problem", "issue"],
        },
        Capability {
            name: "Domain Expert",
            description: "AI ethics, bias, human-AI dependency, and AI governance analysis",
            keywords: &["ai ethics", "bias", "fairness", "algorithmic"],
        },
        Capability {
            name: "Weather Lookup",
            description: "Current weather conditions and climate data for any location",
            keywords: &["weather", "temperature", "forecast", "climate"],
        },
        Capability {
            name: "Email Formatter",
            description: "Professional email replies for support requests",
            keywords: &["email", "subject", "dear", "regards"],
        },
        Capability {
            name: "Direct Handler",
            description: "Casual conversation, general knowledge, and creative requests",
            keywords: &["chat", "conversation", "general"],
        },
        Capability {
            name: "Planning Mode",
            description: "Multi-step research and analysis for complex tasks",
            keywords: &["research", "compare", "analyze", "comprehensive"],
        },
    ]
}
