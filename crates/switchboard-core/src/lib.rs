//! switchboard-core - the routing and orchestration decision engine
//!
//! This crate provides:
//! - Pure request classification (topic scores, email-format detection)
//! - Routing policy: keyword-priority ladder and classifier+planner
//!   strategies with deterministic fallback
//! - Workflow execution: single responder, parallel fan-out with
//!   synthesis, and the ordered content-then-email workflow
//! - Responder adapters for knowledge Q&A, domain analysis, weather
//!   lookup, email formatting, and direct handling
//! - A bundled multi-step task planner

pub mod api;
pub mod classifier;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod responders;
pub mod routing;
pub mod synthesis;
pub mod types;

// Re-export main types for convenience
pub use api::{ApiClient, ApiMessage};
pub use classifier::{classify, Classification};
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use orchestrator::{available_responders, Capability, Orchestrator};
pub use planner::{Planner, PlannerConfig, TaskPlanner};
pub use responders::{
    ContentResponder, DirectHandler, DomainExpert, EmailFormat, EmailFormatter, KnowledgeQa,
    ResponderSet, WeatherLookup, SIGNATURE,
};
pub use routing::{
    DecodeError, RouterConfig, RoutingDecision, RoutingPolicy, RoutingStrategy,
};
pub use synthesis::{fallback_merge, LlmSynthesizer, Synthesizer};
pub use types::{AgentResponse, ConversationThread, CustomerInfo, Responder, Role, Turn};
