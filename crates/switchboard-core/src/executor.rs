//! Workflow execution — runs a routing decision to completion
//!
//! Three shapes: single responder, parallel fan-out with synthesis, and
//! the strictly-ordered content-then-email workflow. Individual responder
//! failures never abort a batch; they are captured as failed responses and
//! segregated before synthesis. An error escapes only when every path,
//! including the DirectHandler fallback, has failed.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use crate::responders::ResponderSet;
use crate::routing::RoutingDecision;
use crate::synthesis::Synthesizer;
use crate::types::{AgentResponse, ConversationThread, CustomerInfo, Responder};

/// Configuration for workflow execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Per-responder call timeout; a timeout becomes a failed response
    pub responder_timeout_secs: u64,
    /// Planning mode gets a longer budget
    pub planner_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            responder_timeout_secs: 60,
            planner_timeout_secs: 300,
        }
    }
}

/// Executes routing decisions against the injected responder set
pub struct WorkflowExecutor {
    responders: ResponderSet,
    synthesizer: std::sync::Arc<dyn Synthesizer>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(
        responders: ResponderSet,
        synthesizer: std::sync::Arc<dyn Synthesizer>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            responders,
            synthesizer,
            config,
        }
    }

    /// Run the decision and return the final reply text
    pub async fn execute(
        &self,
        input: &str,
        decision: &RoutingDecision,
        thread: &ConversationThread,
    ) -> Result<String> {
        match decision.responders.as_slice() {
            [] => {
                // The policy never produces this; recover anyway
                warn!("Empty routing decision, handling directly");
                self.direct_fallback(input, thread).await
            }
            [only] => self.execute_single(input, *only, thread).await,
            many if many.contains(&Responder::EmailFormatter) => {
                self.execute_content_then_email(input, many, thread).await
            }
            many => self.execute_standard_multi(input, many, thread).await,
        }
    }

    async fn execute_single(
        &self,
        input: &str,
        responder: Responder,
        thread: &ConversationThread,
    ) -> Result<String> {
        info!("Executing single responder: {}", responder);

        match responder {
            Responder::EmailFormatter => {
                // The formatter cannot run without content; manufacture it
                warn!("Email formatter invoked without content, generating content first");
                let content = self
                    .direct_fallback(input, thread)
                    .await
                    .context("Content generation for email formatting failed")?;
                let combined = format!("Question: {input}\n\nAnswer: {content}");
                self.format_as_email(input, combined).await
            }
            Responder::PlanningMode => {
                let result = tokio::time::timeout(
                    Duration::from_secs(self.config.planner_timeout_secs),
                    self.responders.planner.run(input),
                )
                .await;
                match result {
                    // Planner output is final: never re-routed, never
                    // email-formatted.
                    Ok(Ok(text)) => Ok(text),
                    Ok(Err(e)) => {
                        warn!("Planning mode failed: {}, handling directly", e);
                        self.direct_fallback(input, thread).await
                    }
                    Err(_) => {
                        warn!("Planning mode timed out, handling directly");
                        self.direct_fallback(input, thread).await
                    }
                }
            }
            content => {
                let timeout_secs = self.timeout_for(content);
                let response =
                    call_with_metrics(&self.responders, content, input, thread, timeout_secs)
                        .await;
                if response.success {
                    return Ok(response.text);
                }
                let error = response.error.unwrap_or_else(|| "unknown error".to_string());
                if content == Responder::DirectHandler {
                    return Err(anyhow!("Direct handling failed: {error}"));
                }
                warn!("{} failed: {}, falling back to direct handling", content, error);
                self.direct_fallback(input, thread).await
            }
        }
    }

    /// Content responders run concurrently and must all complete before
    /// the single email-format call — that ordering is load-bearing.
    async fn execute_content_then_email(
        &self,
        input: &str,
        responders: &[Responder],
        thread: &ConversationThread,
    ) -> Result<String> {
        let content_responders: Vec<Responder> = responders
            .iter()
            .copied()
            .filter(|r| *r != Responder::EmailFormatter)
            .collect();

        info!(
            "Email workflow: {} content responders, then formatting",
            content_responders.len()
        );

        let responses = self.fan_out(&content_responders, input, thread).await;
        let successes: Vec<AgentResponse> =
            responses.into_iter().filter(|r| r.success).collect();

        let combined = if successes.is_empty() {
            warn!("No content responders succeeded, using direct content");
            let content = self
                .direct_fallback(input, thread)
                .await
                .context("Content generation for email formatting failed")?;
            format!("Question: {input}\n\nAnswer: {content}")
        } else if successes.len() == 1 {
            format!("Question: {input}\n\nAnswer: {}", successes[0].text)
        } else {
            let mut parts = vec![format!("Question: {input}\n\nComprehensive Answer:")];
            for response in &successes {
                parts.push(format!(
                    "\n**From {}:**\n{}",
                    response.responder.display_name(),
                    response.text
                ));
            }
            parts.join("\n")
        };

        self.format_as_email(input, combined).await
    }

    async fn execute_standard_multi(
        &self,
        input: &str,
        responders: &[Responder],
        thread: &ConversationThread,
    ) -> Result<String> {
        info!("Standard multi-responder workflow: {} responders", responders.len());

        let responses = self.fan_out(responders, input, thread).await;

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for response in responses {
            if response.success {
                debug!(
                    "{} completed in {:.2}s",
                    response.responder,
                    response.elapsed.as_secs_f64()
                );
                successes.push(response);
            } else {
                let error = response.error.as_deref().unwrap_or("unknown error");
                warn!("{} failed: {}", response.responder, error);
                failures.push(format!("{}: {}", response.responder, error));
            }
        }

        if successes.is_empty() {
            warn!("All responders failed, handling directly");
            return self.direct_fallback(input, thread).await;
        }

        Ok(self
            .synthesizer
            .synthesize(input, &successes, &failures)
            .await)
    }

    /// Concurrent fan-out with per-task isolation: a panic or failure in
    /// one call never aborts the others.
    async fn fan_out(
        &self,
        responders: &[Responder],
        input: &str,
        thread: &ConversationThread,
    ) -> Vec<AgentResponse> {
        let mut handles = Vec::new();
        for &responder in responders {
            let set = self.responders.clone();
            let input = input.to_string();
            let thread = thread.clone();
            let timeout_secs = self.timeout_for(responder);
            handles.push((
                responder,
                tokio::spawn(async move {
                    call_with_metrics(&set, responder, &input, &thread, timeout_secs).await
                }),
            ));
        }

        let mut responses = Vec::new();
        for (responder, handle) in handles {
            match handle.await {
                Ok(response) => responses.push(response),
                Err(e) => responses.push(AgentResponse::failed(
                    responder,
                    format!("Responder task panicked: {e}"),
                    Duration::ZERO,
                )),
            }
        }
        responses
    }

    async fn format_as_email(&self, input: &str, combined: String) -> Result<String> {
        let info = CustomerInfo::extract(input);
        match self.responders.email.format(&combined, &info).await {
            Ok(email) => Ok(email),
            Err(e) => {
                warn!("Email formatting failed: {}, returning unformatted content", e);
                Ok(combined)
            }
        }
    }

    async fn direct_fallback(
        &self,
        input: &str,
        thread: &ConversationThread,
    ) -> Result<String> {
        self.responders
            .direct
            .respond(input, thread)
            .await
            .context("Direct handler fallback failed")
    }

    fn timeout_for(&self, responder: Responder) -> u64 {
        match responder {
            Responder::PlanningMode => self.config.planner_timeout_secs,
            _ => self.config.responder_timeout_secs,
        }
    }
}

/// Wrap one responder call with duration and success capture
async fn call_with_metrics(
    set: &ResponderSet,
    responder: Responder,
    input: &str,
    thread: &ConversationThread,
    timeout_secs: u64,
) -> AgentResponse {
    let start = Instant::now();
    let result = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        invoke(set, responder, input, thread),
    )
    .await;

    match result {
        Ok(Ok(text)) => AgentResponse::ok(responder, text, start.elapsed()),
        Ok(Err(e)) => AgentResponse::failed(responder, e.to_string(), start.elapsed()),
        Err(_) => AgentResponse::failed(
            responder,
            format!("{responder} timed out after {timeout_secs}s"),
            start.elapsed(),
        ),
    }
}

/// Dispatch to the adapter for a responder. Exhaustive over the closed
/// set — there is no "unknown responder" at runtime.
async fn invoke(
    set: &ResponderSet,
    responder: Responder,
    input: &str,
    thread: &ConversationThread,
) -> Result<String> {
    match responder {
        Responder::KnowledgeQa => set.knowledge_qa.respond(input, thread).await,
        Responder::DomainExpert => set.domain_expert.respond(input, thread).await,
        Responder::WeatherLookup => set.weather.respond(input, thread).await,
        Responder::DirectHandler => set.direct.respond(input, thread).await,
        Responder::PlanningMode => set.planner.run(input).await,
        Responder::EmailFormatter => {
            Err(anyhow!("Email formatter is not a content responder"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Planner;
    use crate::responders::{ContentResponder, EmailFormat, SIGNATURE};
    use crate::synthesis::fallback_merge;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct StubResponder {
        identity: Responder,
        reply: Option<&'static str>,
        delay: Option<Duration>,
        log: CallLog,
    }

    #[async_trait]
    impl ContentResponder for StubResponder {
        fn responder(&self) -> Responder {
            self.identity
        }

        async fn respond(&self, _input: &str, _thread: &ConversationThread) -> Result<String> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.log.lock().unwrap().push(self.identity.wire_name());
            match self.reply {
                Some(text) => Ok(text.to_string()),
                None => Err(anyhow!("stub failure")),
            }
        }
    }

    struct StubEmail {
        fail: bool,
        log: CallLog,
        received: Arc<Mutex<Option<String>>>,
    }

    #[async_trait]
    impl EmailFormat for StubEmail {
        async fn format(&self, content: &str, info: &CustomerInfo) -> Result<String> {
            self.log.lock().unwrap().push("email_formatter");
            *self.received.lock().unwrap() = Some(content.to_string());
            if self.fail {
                return Err(anyhow!("formatter down"));
            }
            Ok(format!(
                "Dear {},\n\n{}\n\n{}",
                info.customer_name, content, SIGNATURE
            ))
        }
    }

    struct StubPlanner {
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl Planner for StubPlanner {
        async fn run(&self, _task: &str) -> Result<String> {
            match self.reply {
                Some(text) => Ok(text.to_string()),
                None => Err(anyhow!("planner failure")),
            }
        }
    }

    struct FallbackSynthesizer;

    #[async_trait]
    impl Synthesizer for FallbackSynthesizer {
        async fn synthesize(
            &self,
            original: &str,
            successes: &[AgentResponse],
            _failures: &[String],
        ) -> String {
            fallback_merge(original, successes)
        }
    }

    struct Harness {
        log: CallLog,
        email_received: Arc<Mutex<Option<String>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                log: Arc::new(Mutex::new(Vec::new())),
                email_received: Arc::new(Mutex::new(None)),
            }
        }

        fn stub(&self, identity: Responder, reply: Option<&'static str>) -> Arc<StubResponder> {
            Arc::new(StubResponder {
                identity,
                reply,
                delay: None,
                log: self.log.clone(),
            })
        }

        fn executor_with(
            &self,
            knowledge_qa: Arc<StubResponder>,
            domain_expert: Arc<StubResponder>,
            weather: Arc<StubResponder>,
            direct: Arc<StubResponder>,
            email_fail: bool,
            planner_reply: Option<&'static str>,
            config: ExecutorConfig,
        ) -> WorkflowExecutor {
            let set = ResponderSet {
                knowledge_qa,
                domain_expert,
                weather,
                direct,
                email: Arc::new(StubEmail {
                    fail: email_fail,
                    log: self.log.clone(),
                    received: self.email_received.clone(),
                }),
                planner: Arc::new(StubPlanner {
                    reply: planner_reply,
                }),
            };
            WorkflowExecutor::new(set, Arc::new(FallbackSynthesizer), config)
        }

        fn executor(&self) -> WorkflowExecutor {
            self.executor_with(
                self.stub(Responder::KnowledgeQa, Some("knowledge answer")),
                self.stub(Responder::DomainExpert, Some("ethics answer")),
                self.stub(Responder::WeatherLookup, Some("weather answer")),
                self.stub(Responder::DirectHandler, Some("direct answer")),
                false,
                Some("plan answer"),
                ExecutorConfig::default(),
            )
        }

        fn calls(&self) -> Vec<&'static str> {
            self.log.lock().unwrap().clone()
        }
    }

    fn decision(responders: Vec<Responder>) -> RoutingDecision {
        RoutingDecision {
            is_multi_agent: responders.len() > 1,
            primary: responders.first().copied(),
            responders,
            reasoning: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_single_responder_success() {
        let harness = Harness::new();
        let executor = harness.executor();
        let thread = ConversationThread::new();

        let result = executor
            .execute("weather?", &decision(vec![Responder::WeatherLookup]), &thread)
            .await
            .unwrap();
        assert_eq!(result, "weather answer");
    }

    #[tokio::test]
    async fn test_single_responder_failure_falls_back_to_direct() {
        let harness = Harness::new();
        let executor = harness.executor_with(
            harness.stub(Responder::KnowledgeQa, Some("knowledge answer")),
            harness.stub(Responder::DomainExpert, Some("ethics answer")),
            harness.stub(Responder::WeatherLookup, None),
            harness.stub(Responder::DirectHandler, Some("direct answer")),
            false,
            None,
            ExecutorConfig::default(),
        );
        let thread = ConversationThread::new();

        let result = executor
            .execute("weather?", &decision(vec![Responder::WeatherLookup]), &thread)
            .await
            .unwrap();
        assert_eq!(result, "direct answer");
    }

    #[tokio::test]
    async fn test_single_direct_failure_is_an_error() {
        let harness = Harness::new();
        let executor = harness.executor_with(
            harness.stub(Responder::KnowledgeQa, Some("knowledge answer")),
            harness.stub(Responder::DomainExpert, Some("ethics answer")),
            harness.stub(Responder::WeatherLookup, Some("weather answer")),
            harness.stub(Responder::DirectHandler, None),
            false,
            None,
            ExecutorConfig::default(),
        );
        let thread = ConversationThread::new();

        let result = executor
            .execute("hello", &decision(vec![Responder::DirectHandler]), &thread)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_partial_failure_is_tolerated() {
        let harness = Harness::new();
        let executor = harness.executor_with(
            harness.stub(Responder::KnowledgeQa, Some("knowledge answer")),
            harness.stub(Responder::DomainExpert, None),
            harness.stub(Responder::WeatherLookup, Some("weather answer")),
            harness.stub(Responder::DirectHandler, Some("direct answer")),
            false,
            None,
            ExecutorConfig::default(),
        );
        let thread = ConversationThread::new();

        let result = executor
            .execute(
                "everything please",
                &decision(vec![
                    Responder::KnowledgeQa,
                    Responder::DomainExpert,
                    Responder::WeatherLookup,
                ]),
                &thread,
            )
            .await
            .unwrap();

        assert!(!result.is_empty());
        assert!(result.contains("knowledge answer"));
        assert!(result.contains("weather answer"));
        assert!(!result.contains("ethics answer"));
    }

    #[tokio::test]
    async fn test_all_failures_fall_back_to_direct() {
        let harness = Harness::new();
        let executor = harness.executor_with(
            harness.stub(Responder::KnowledgeQa, None),
            harness.stub(Responder::DomainExpert, None),
            harness.stub(Responder::WeatherLookup, None),
            harness.stub(Responder::DirectHandler, Some("direct answer")),
            false,
            None,
            ExecutorConfig::default(),
        );
        let thread = ConversationThread::new();

        let result = executor
            .execute(
                "everything please",
                &decision(vec![
                    Responder::KnowledgeQa,
                    Responder::DomainExpert,
                    Responder::WeatherLookup,
                ]),
                &thread,
            )
            .await
            .unwrap();

        // Equivalent to what DirectHandler alone would have produced
        assert_eq!(result, "direct answer");
    }

    #[tokio::test]
    async fn test_content_then_email_ordering_and_signature() {
        let harness = Harness::new();
        let executor = harness.executor();
        let thread = ConversationThread::new();
        let input = "Subject: Password Help\nDear Support,\nHow do I reset my password?";

        let result = executor
            .execute(
                input,
                &decision(vec![Responder::KnowledgeQa, Responder::EmailFormatter]),
                &thread,
            )
            .await
            .unwrap();

        // Content call strictly precedes the formatting call
        assert_eq!(harness.calls(), vec!["knowledge_qa", "email_formatter"]);
        assert!(result.ends_with(SIGNATURE));

        let received = harness.email_received.lock().unwrap().clone().unwrap();
        assert!(received.contains("Question:"));
        assert!(received.contains("Answer: knowledge answer"));
    }

    #[tokio::test]
    async fn test_content_then_email_multiple_sources_are_labeled() {
        let harness = Harness::new();
        let executor = harness.executor();
        let thread = ConversationThread::new();
        let input = "Subject: Everything\nDear Support,\nweather and password please";

        executor
            .execute(
                input,
                &decision(vec![
                    Responder::WeatherLookup,
                    Responder::KnowledgeQa,
                    Responder::EmailFormatter,
                ]),
                &thread,
            )
            .await
            .unwrap();

        let received = harness.email_received.lock().unwrap().clone().unwrap();
        assert!(received.contains("Comprehensive Answer:"));
        assert!(received.contains("**From Weather Lookup:**"));
        assert!(received.contains("**From Knowledge Qa:**"));

        // Both content calls complete before the single email call
        let calls = harness.calls();
        assert_eq!(calls.last(), Some(&"email_formatter"));
        assert_eq!(calls.iter().filter(|c| **c == "email_formatter").count(), 1);
    }

    #[tokio::test]
    async fn test_content_then_email_all_content_failed_uses_direct() {
        let harness = Harness::new();
        let executor = harness.executor_with(
            harness.stub(Responder::KnowledgeQa, None),
            harness.stub(Responder::DomainExpert, Some("ethics answer")),
            harness.stub(Responder::WeatherLookup, Some("weather answer")),
            harness.stub(Responder::DirectHandler, Some("direct answer")),
            false,
            None,
            ExecutorConfig::default(),
        );
        let thread = ConversationThread::new();

        let result = executor
            .execute(
                "Subject: Help\nDear Bob,\nsomething broke",
                &decision(vec![Responder::KnowledgeQa, Responder::EmailFormatter]),
                &thread,
            )
            .await
            .unwrap();

        assert!(result.ends_with(SIGNATURE));
        let received = harness.email_received.lock().unwrap().clone().unwrap();
        assert!(received.contains("Answer: direct answer"));
    }

    #[tokio::test]
    async fn test_email_formatter_failure_returns_unformatted_content() {
        let harness = Harness::new();
        let executor = harness.executor_with(
            harness.stub(Responder::KnowledgeQa, Some("knowledge answer")),
            harness.stub(Responder::DomainExpert, Some("ethics answer")),
            harness.stub(Responder::WeatherLookup, Some("weather answer")),
            harness.stub(Responder::DirectHandler, Some("direct answer")),
            true,
            None,
            ExecutorConfig::default(),
        );
        let thread = ConversationThread::new();

        let result = executor
            .execute(
                "Subject: Help\nDear Bob,\npassword question",
                &decision(vec![Responder::KnowledgeQa, Responder::EmailFormatter]),
                &thread,
            )
            .await
            .unwrap();

        assert!(result.contains("Answer: knowledge answer"));
        assert!(!result.contains(SIGNATURE));
    }

    #[tokio::test]
    async fn test_email_formatter_alone_manufactures_content() {
        let harness = Harness::new();
        let executor = harness.executor();
        let thread = ConversationThread::new();

        let result = executor
            .execute(
                "Subject: Hi\nDear Bob,\nwhat are your hours?",
                &decision(vec![Responder::EmailFormatter]),
                &thread,
            )
            .await
            .unwrap();

        assert_eq!(harness.calls(), vec!["direct_handler", "email_formatter"]);
        assert!(result.starts_with("Dear Bob,"));
        assert!(result.ends_with(SIGNATURE));
    }

    #[tokio::test]
    async fn test_planning_mode_result_is_final() {
        let harness = Harness::new();
        let executor = harness.executor();
        let thread = ConversationThread::new();

        let result = executor
            .execute(
                "research everything",
                &decision(vec![Responder::PlanningMode]),
                &thread,
            )
            .await
            .unwrap();

        // Returned verbatim — not synthesized, not email-formatted
        assert_eq!(result, "plan answer");
        assert!(harness.calls().is_empty());
    }

    #[tokio::test]
    async fn test_planning_failure_falls_back_to_direct() {
        let harness = Harness::new();
        let executor = harness.executor_with(
            harness.stub(Responder::KnowledgeQa, Some("knowledge answer")),
            harness.stub(Responder::DomainExpert, Some("ethics answer")),
            harness.stub(Responder::WeatherLookup, Some("weather answer")),
            harness.stub(Responder::DirectHandler, Some("direct answer")),
            false,
            None,
            ExecutorConfig::default(),
        );
        let thread = ConversationThread::new();

        let result = executor
            .execute(
                "research everything",
                &decision(vec![Responder::PlanningMode]),
                &thread,
            )
            .await
            .unwrap();
        assert_eq!(result, "direct answer");
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_response() {
        let harness = Harness::new();
        let slow_weather = Arc::new(StubResponder {
            identity: Responder::WeatherLookup,
            reply: Some("weather answer"),
            delay: Some(Duration::from_secs(5)),
            log: harness.log.clone(),
        });
        let executor = harness.executor_with(
            harness.stub(Responder::KnowledgeQa, Some("knowledge answer")),
            harness.stub(Responder::DomainExpert, Some("ethics answer")),
            slow_weather,
            harness.stub(Responder::DirectHandler, Some("direct answer")),
            false,
            None,
            ExecutorConfig {
                responder_timeout_secs: 1,
                planner_timeout_secs: 1,
            },
        );
        let thread = ConversationThread::new();

        let result = executor
            .execute(
                "weather and knowledge",
                &decision(vec![Responder::WeatherLookup, Responder::KnowledgeQa]),
                &thread,
            )
            .await
            .unwrap();

        // The slow responder is dropped; survivors still answer
        assert!(result.contains("knowledge answer"));
        assert!(!result.contains("weather answer"));
    }

    #[tokio::test]
    async fn test_empty_decision_recovers_via_direct() {
        let harness = Harness::new();
        let executor = harness.executor();
        let thread = ConversationThread::new();

        let result = executor
            .execute("anything", &decision(vec![]), &thread)
            .await
            .unwrap();
        assert_eq!(result, "direct answer");
    }
}
