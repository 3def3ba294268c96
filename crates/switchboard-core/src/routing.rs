//! Routing policy — decides which responders handle a request
//!
//! Two strategies are supported. The keyword ladder is a fixed-order
//! if/else chain, first match wins. The classifier strategy asks the
//! model for a JSON routing decision and recovers to the ladder whenever
//! the call fails or its output does not decode; that recovery never
//! surfaces an error to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiMessage};
use crate::classifier::Classification;
use crate::types::Responder;

/// The orchestrator's choice of responders for one request
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Responders to invoke, in order. Never empty.
    pub responders: Vec<Responder>,
    /// True iff more than one responder, or planning mode was selected
    pub is_multi_agent: bool,
    /// Diagnostic only — never drives control flow
    pub reasoning: String,
    /// Dominant voice when only one content result exists
    pub primary: Option<Responder>,
}

impl RoutingDecision {
    fn single(responder: Responder, reasoning: impl Into<String>) -> Self {
        Self {
            responders: vec![responder],
            is_multi_agent: responder == Responder::PlanningMode,
            reasoning: reasoning.into(),
            primary: Some(responder),
        }
    }

    fn content_then_email(content: Responder, reasoning: impl Into<String>) -> Self {
        Self {
            responders: vec![content, Responder::EmailFormatter],
            is_multi_agent: true,
            reasoning: reasoning.into(),
            primary: Some(content),
        }
    }
}

/// Which routing strategy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Deterministic keyword-priority ladder only
    KeywordLadder,
    /// Complexity gate + model classification, ladder as fallback
    ClassifierPlanner,
}

/// Configuration for the routing policy
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub strategy: RoutingStrategy,
    /// Word count above which a complexity keyword escalates to planning mode
    pub complexity_word_threshold: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            // Start with the ladder — deterministic and free
            strategy: RoutingStrategy::KeywordLadder,
            complexity_word_threshold: 10,
        }
    }
}

/// Why a model classification response failed to decode
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no JSON object found in response")]
    NoJsonObject,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown responder name: {0}")]
    UnknownResponder(String),
    #[error("empty responder list")]
    EmptyResponderList,
}

/// Converts a classification into a routing decision
pub struct RoutingPolicy {
    api: ApiClient,
    config: RouterConfig,
}

impl RoutingPolicy {
    pub fn new(api: ApiClient, config: RouterConfig) -> Self {
        Self { api, config }
    }

    /// Decide which responders handle this request. Never fails and never
    /// returns an empty responder list.
    pub async fn decide(&self, text: &str, classification: &Classification) -> RoutingDecision {
        match self.config.strategy {
            RoutingStrategy::KeywordLadder => keyword_ladder(classification),
            RoutingStrategy::ClassifierPlanner => {
                self.decide_with_classifier(text, classification).await
            }
        }
    }

    async fn decide_with_classifier(
        &self,
        text: &str,
        classification: &Classification,
    ) -> RoutingDecision {
        // Complex tasks escalate to planning mode — but never for email
        // requests. Planning output could itself look like a new email,
        // which would re-trigger email classification indefinitely.
        if is_complex_task(classification, self.config.complexity_word_threshold) {
            info!("Complex task detected, escalating to planning mode");
            return RoutingDecision::single(
                Responder::PlanningMode,
                "Complex multi-step task suitable for planning mode",
            );
        }

        match self.classify_with_model(text).await {
            Ok(raw) => match parse_decision(&raw) {
                Ok(decision) => {
                    debug!("Model routing decision: {:?}", decision.responders);
                    normalize_decision(decision, classification)
                }
                Err(e) => {
                    warn!("Failed to decode routing response: {}, using keyword fallback", e);
                    ladder_with_email_append(classification)
                }
            },
            Err(e) => {
                warn!("Routing classification call failed: {}, using keyword fallback", e);
                ladder_with_email_append(classification)
            }
        }
    }

    async fn classify_with_model(&self, text: &str) -> anyhow::Result<String> {
        let prompt = format!(
            r#"Analyze this user request and determine which responders should handle it:

User request: "{text}"

Available responders:
- weather_lookup: Weather conditions, forecasts, temperature, climate
- domain_expert: AI ethics, bias, human-AI dependency, AI governance
- knowledge_qa: Customer support, technical help, product information
- email_formatter: Professional email formatting (use with a content responder)
- direct_handler: Casual conversation, greetings, general knowledge

Email formatting logic: if the request needs EMAIL FORMAT (markers like
"Subject:", "Dear", formal closings), pick ONE content responder plus
email_formatter last, and set is_multi_agent to true. Otherwise pick a
single responder.

Return a JSON object with exactly this format:
{{
    "agents_to_call": ["responder_name"],
    "reasoning": "Brief explanation of why these responders were chosen",
    "is_multi_agent": false,
    "primary_agent": "responder_name"
}}

Examples:
- "What's the weather in Paris?" -> {{"agents_to_call": ["weather_lookup"], "reasoning": "Weather query", "is_multi_agent": false, "primary_agent": "weather_lookup"}}
- "Subject: Weather Request\nDear Support,\nWhat's the weather in Paris?" -> {{"agents_to_call": ["weather_lookup", "email_formatter"], "reasoning": "Weather query requiring email format", "is_multi_agent": true, "primary_agent": "weather_lookup"}}

Always respond with valid JSON only."#
        );

        let messages = vec![ApiMessage::user(prompt)];
        self.api
            .generate(
                &messages,
                "You are a routing system for a multi-responder platform. Output only valid JSON.",
            )
            .await
    }
}

/// True iff the request is long enough, carries a complexity keyword, and
/// is not email-formatted (the anti-loop invariant).
pub fn is_complex_task(classification: &Classification, word_threshold: usize) -> bool {
    !classification.is_email_format
        && classification.complexity_score >= 1
        && classification.word_count > word_threshold
}

/// The keyword-priority ladder: fixed evaluation order, first match wins,
/// no backtracking. Higher-priority topics always win ties.
pub fn keyword_ladder(c: &Classification) -> RoutingDecision {
    if c.is_email_format {
        // EmailFormatter alone; the executor manufactures content first
        RoutingDecision::single(Responder::EmailFormatter, "Email-format markers detected")
    } else if c.weather_score >= 2 {
        RoutingDecision::single(Responder::WeatherLookup, "Strong weather keyword match")
    } else if c.ethics_score >= 2 {
        RoutingDecision::single(Responder::DomainExpert, "Strong AI-ethics keyword match")
    } else if c.support_score >= 2 || (c.support_score >= 1 && c.has_question_words) {
        RoutingDecision::single(Responder::KnowledgeQa, "Support keyword match")
    } else if c.weather_score >= 1 {
        RoutingDecision::single(Responder::WeatherLookup, "Weak weather keyword match")
    } else if c.ethics_score >= 1 {
        RoutingDecision::single(Responder::DomainExpert, "Weak AI-ethics keyword match")
    } else {
        RoutingDecision::single(
            Responder::DirectHandler,
            "No responder keywords found, handling directly",
        )
    }
}

/// Ladder variant used as the classifier strategy's fallback: email-format
/// requests get exactly one content responder (chosen by the same topic
/// ladder) with EmailFormatter appended as the final stage.
pub fn ladder_with_email_append(c: &Classification) -> RoutingDecision {
    let content = if c.weather_score >= 2 {
        Responder::WeatherLookup
    } else if c.ethics_score >= 2 {
        Responder::DomainExpert
    } else if c.support_score >= 2 || (c.support_score >= 1 && c.has_question_words) {
        Responder::KnowledgeQa
    } else if c.weather_score >= 1 {
        Responder::WeatherLookup
    } else if c.ethics_score >= 1 {
        Responder::DomainExpert
    } else {
        Responder::DirectHandler
    };

    if c.is_email_format {
        RoutingDecision::content_then_email(
            content,
            format!("{} content with email formatting", content.display_name()),
        )
    } else {
        RoutingDecision::single(content, "Keyword fallback routing")
    }
}

/// Decode a model classification response into a routing decision.
///
/// Tolerates surrounding prose by scanning for the outermost JSON object,
/// but is strict about the decoded shape: unknown responder names and
/// empty responder lists are decode errors, not silent defaults.
pub fn parse_decision(text: &str) -> Result<RoutingDecision, DecodeError> {
    let start = text.find('{').ok_or(DecodeError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(DecodeError::NoJsonObject)?;
    if end < start {
        return Err(DecodeError::NoJsonObject);
    }

    let value: serde_json::Value = serde_json::from_str(&text[start..=end])?;

    let names = value
        .get("agents_to_call")
        .and_then(|v| v.as_array())
        .ok_or(DecodeError::EmptyResponderList)?;

    let mut responders = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_str().unwrap_or_default();
        let responder = Responder::from_name(name)
            .ok_or_else(|| DecodeError::UnknownResponder(name.to_string()))?;
        responders.push(responder);
    }

    if responders.is_empty() {
        return Err(DecodeError::EmptyResponderList);
    }

    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or("Model-classified routing")
        .to_string();

    let is_multi_agent = value
        .get("is_multi_agent")
        .and_then(|v| v.as_bool())
        .unwrap_or(responders.len() > 1);

    let primary = value
        .get("primary_agent")
        .and_then(|v| v.as_str())
        .and_then(Responder::from_name)
        .or_else(|| responders.first().copied());

    Ok(RoutingDecision {
        responders,
        is_multi_agent,
        reasoning,
        primary,
    })
}

/// Enforce the email invariants on a decoded decision: email-format
/// requests never reach planning mode, and always end with exactly one
/// EmailFormatter stage after a content responder.
fn normalize_decision(mut decision: RoutingDecision, c: &Classification) -> RoutingDecision {
    if !c.is_email_format {
        return decision;
    }

    decision
        .responders
        .retain(|r| *r != Responder::PlanningMode && *r != Responder::EmailFormatter);

    if decision.responders.is_empty() {
        return ladder_with_email_append(c);
    }

    // Exactly one content stage before formatting
    decision.responders.truncate(1);
    decision.primary = decision.responders.first().copied();
    decision.responders.push(Responder::EmailFormatter);
    decision.is_multi_agent = true;
    decision
}
