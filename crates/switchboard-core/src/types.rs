//! Shared types for switchboard-core

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One of the fixed set of specialized responders the router can
/// dispatch to. Closed set — unknown names are rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Responder {
    /// Knowledge-base Q&A with document retrieval
    KnowledgeQa,
    /// AI-ethics domain analysis
    DomainExpert,
    /// Current-conditions weather lookup
    WeatherLookup,
    /// Professional email formatting (needs content from another responder)
    EmailFormatter,
    /// The orchestrator's own conversational voice — the universal fallback
    DirectHandler,
    /// Multi-step autonomous planning for complex, non-email tasks
    PlanningMode,
}

impl Responder {
    /// Stable snake_case name used in the classification JSON protocol
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::KnowledgeQa => "knowledge_qa",
            Self::DomainExpert => "domain_expert",
            Self::WeatherLookup => "weather_lookup",
            Self::EmailFormatter => "email_formatter",
            Self::DirectHandler => "direct_handler",
            Self::PlanningMode => "planning_mode",
        }
    }

    /// Parse a wire name back into a responder
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "knowledge_qa" => Some(Self::KnowledgeQa),
            "domain_expert" => Some(Self::DomainExpert),
            "weather_lookup" => Some(Self::WeatherLookup),
            "email_formatter" => Some(Self::EmailFormatter),
            "direct_handler" => Some(Self::DirectHandler),
            "planning_mode" => Some(Self::PlanningMode),
            _ => None,
        }
    }

    /// Human-readable heading (underscores to spaces, title case)
    pub fn display_name(&self) -> String {
        self.wire_name()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Ordered conversation history, owned by the caller.
///
/// Mutated append-only: one user turn at dispatch, one assistant turn at
/// completion. Not internally synchronized — callers serialize requests
/// per thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationThread {
    turns: Vec<Turn>,
}

impl ConversationThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::Assistant,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Prior turns only — excludes the in-flight user turn at the tail,
    /// since responders build their own final message from the raw input.
    pub fn history(&self) -> &[Turn] {
        match self.turns.last() {
            Some(turn) if turn.role == Role::User => &self.turns[..self.turns.len() - 1],
            _ => &self.turns,
        }
    }
}

/// Customer details used to parametrize email formatting, extracted from
/// the raw request by line-oriented heuristics. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerInfo {
    pub customer_name: String,
    pub subject: String,
    pub sender_email: Option<String>,
}

impl Default for CustomerInfo {
    fn default() -> Self {
        Self {
            customer_name: "Valued Customer".to_string(),
            subject: "Support Request".to_string(),
            sender_email: None,
        }
    }
}

impl CustomerInfo {
    /// Extract customer details from request text.
    ///
    /// Subject comes from a `Subject:` line, the sender address from the
    /// first email-shaped token, and the name from the last word of a
    /// greeting line ("Dear Anna," -> "Anna").
    pub fn extract(text: &str) -> Self {
        let mut info = Self::default();

        for line in text.lines() {
            let line_lower = line.to_lowercase();
            let trimmed_lower = line_lower.trim();

            if let Some(rest) = trimmed_lower.strip_prefix("subject") {
                if rest.trim_start().starts_with(':') {
                    if let Some((_, subject)) = line.split_once(':') {
                        let subject = subject.trim();
                        if !subject.is_empty() {
                            info.subject = subject.to_string();
                        }
                    }
                }
            }

            if info.sender_email.is_none() {
                info.sender_email = find_email_address(line);
            }

            let is_greeting_line = ["dear", "hello", "hi"]
                .iter()
                .any(|g| trimmed_lower.starts_with(g));
            if is_greeting_line {
                if let Some(last_word) = line.split_whitespace().last() {
                    let name = last_word.trim_matches([',', '.', '!', ':']).trim();
                    if !name.is_empty() && line.split_whitespace().count() > 1 {
                        info.customer_name = name.to_string();
                    }
                }
            }
        }

        info
    }
}

/// First email-shaped token in a line, if any
fn find_email_address(line: &str) -> Option<String> {
    line.split_whitespace()
        .map(|token| token.trim_matches([',', ';', '<', '>', '(', ')', '.']))
        .find(|token| {
            let Some((local, domain)) = token.split_once('@') else {
                return false;
            };
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        })
        .map(|token| token.to_string())
}

/// Result of one responder invocation, as captured by the metrics wrapper.
///
/// Invariant: a failed response has empty text and a non-empty error,
/// and vice versa — the constructors enforce it.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub responder: Responder,
    pub text: String,
    pub elapsed: Duration,
    pub success: bool,
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn ok(responder: Responder, text: String, elapsed: Duration) -> Self {
        Self {
            responder,
            text,
            elapsed,
            success: true,
            error: None,
        }
    }

    pub fn failed(responder: Responder, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            responder,
            text: String::new(),
            elapsed,
            success: false,
            error: Some(error.into()),
        }
    }
}
