//! Response synthesis — merging multiple responder outputs into one reply

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiMessage};
use crate::types::AgentResponse;

const SYSTEM_PROMPT: &str = "\
You merge responses from several specialist responders into one coherent, \
helpful answer. Address all aspects of the request, flow naturally without \
reading like separate responses, and keep each specialist's expertise and \
tone. Return only the final merged response.";

/// Merges successful responder outputs into one reply
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// `successes` is non-empty; failed responder content never appears in
    /// the merged text — failures are a diagnostic footer at most.
    async fn synthesize(
        &self,
        original: &str,
        successes: &[AgentResponse],
        failures: &[String],
    ) -> String;
}

/// Model-backed synthesis with a deterministic concatenation fallback
pub struct LlmSynthesizer {
    api: ApiClient,
}

impl LlmSynthesizer {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        original: &str,
        successes: &[AgentResponse],
        failures: &[String],
    ) -> String {
        debug!("Synthesizing {} responder outputs", successes.len());

        let mut sections: Vec<String> = successes
            .iter()
            .map(|r| format!("**{}**: {}", r.responder.wire_name(), r.text))
            .collect();

        if !failures.is_empty() {
            sections.push(format!("**Failed responders**: {}", failures.join("; ")));
        }

        let prompt = format!(
            "Synthesize these responder outputs into a coherent, helpful answer:\n\n\
             Original request: \"{original}\"\n\n\
             Responder outputs:\n{}",
            sections.join("\n\n"),
        );

        let messages = vec![ApiMessage::user(prompt)];
        match self.api.generate(&messages, SYSTEM_PROMPT).await {
            Ok(merged) => merged,
            Err(e) => {
                warn!("Synthesis call failed: {}, using simple concatenation", e);
                fallback_merge(original, successes)
            }
        }
    }
}

/// Deterministic merge used when model synthesis is unavailable: a single
/// success verbatim, otherwise labeled sections with separators. Failure
/// diagnostics are dropped entirely on this path.
pub fn fallback_merge(original: &str, successes: &[AgentResponse]) -> String {
    if successes.len() == 1 {
        return successes[0].text.clone();
    }

    let mut parts = vec![format!(
        "Based on your request about '{original}', here's what I found:\n"
    )];

    for (i, response) in successes.iter().enumerate() {
        parts.push(format!(
            "\n**{}:**\n{}",
            response.responder.display_name(),
            response.text
        ));
        if i + 1 < successes.len() {
            parts.push(format!("\n{}", "=".repeat(50)));
        }
    }

    parts.concat()
}
