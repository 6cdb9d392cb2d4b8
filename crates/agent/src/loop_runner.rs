//! The agentic dispatch loop.
//!
//! One prompt goes in; the loop calls the provider, looks for a tool
//! directive in the answer, runs the tool, and feeds the result back until
//! the model answers in plain text. Every failure inside a tool becomes
//! result text the model gets to see.

use std::sync::Arc;
use chrono::Utc;
use memweave_config::DirectiveStrategy;
use memweave_core::error::ProviderError;
use memweave_core::event::{DomainEvent, EventBus};
use memweave_core::provider::{Provider, ProviderRequest};
use memweave_core::tool::{ToolCall, ToolRegistry, ToolResult};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::directive::{DirectiveExtractor, DirectiveKind};

/// How a dispatch loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model answered without a directive
    Answer(String),
    /// The iteration cap was hit; carries the last generated text
    GaveUp(String),
    /// The provider refused to generate
    Blocked { reason: String },
    /// The cancellation token fired before a provider call
    Cancelled,
}

impl LoopOutcome {
    /// The text to show the user, if the loop produced one.
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answer(text) | Self::GaveUp(text) => Some(text),
            Self::Blocked { .. } | Self::Cancelled => None,
        }
    }
}

/// One tool call made during a loop.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
    pub output: String,
    pub success: bool,
}

/// Everything a loop run produced.
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub outcome: LoopOutcome,
    pub tool_calls: Vec<ToolInvocation>,
    /// Number of provider calls made
    pub iterations: u32,
}

/// The dispatch loop that orchestrates provider calls and tool execution.
pub struct AgentLoop {
    /// The generation provider
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,

    /// Persona plus tool manifest
    system_instruction: Option<String>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Locates directives in generated text
    extractor: DirectiveExtractor,

    /// Maximum provider calls per loop
    max_iterations: u32,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new dispatch loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            system_instruction: None,
            tools,
            extractor: DirectiveExtractor::default(),
            max_iterations: 10,
            event_bus,
        }
    }

    /// Set the maximum number of provider calls per loop.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set the max tokens per response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the system instruction sent with every request.
    pub fn with_system_instruction(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(system.into());
        self
    }

    /// Choose how directives are located in generated text.
    pub fn with_directive_strategy(mut self, strategy: DirectiveStrategy) -> Self {
        self.extractor = DirectiveExtractor::new(strategy);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn request(&self, prompt: &str) -> ProviderRequest {
        let request = ProviderRequest::new(&self.model, prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        match &self.system_instruction {
            Some(system) => request.with_system(system),
            None => request,
        }
    }

    /// Run the loop for one prompt.
    ///
    /// Provider errors propagate; everything else ends in a `LoopOutcome`.
    pub async fn process(
        &self,
        turn_id: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<LoopReport, ProviderError> {
        let mut conversation = prompt.to_string();
        let mut tool_calls = Vec::new();
        let mut iteration = 0;

        let outcome = loop {
            if cancel.is_cancelled() {
                info!(turn_id, iteration, "Dispatch loop cancelled");
                break LoopOutcome::Cancelled;
            }

            iteration += 1;
            debug!(turn_id, iteration, "Dispatch loop iteration");

            let response = self.provider.complete(self.request(&conversation)).await?;

            if let Some(reason) = response.block_reason {
                warn!(turn_id, reason = %reason, "Generation blocked");
                self.event_bus.publish(DomainEvent::GenerationBlocked {
                    turn_id: turn_id.to_string(),
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });
                break LoopOutcome::Blocked { reason };
            }

            self.event_bus.publish(DomainEvent::ResponseGenerated {
                turn_id: turn_id.to_string(),
                model: response.model.clone(),
                iteration,
                timestamp: Utc::now(),
            });

            let Some(call) = self.parse_call(&response.text, iteration) else {
                break LoopOutcome::Answer(response.text);
            };

            if iteration >= self.max_iterations {
                warn!(
                    turn_id,
                    iterations = iteration,
                    tool = %call.name,
                    "Max dispatch iterations reached, returning last response"
                );
                break LoopOutcome::GaveUp(response.text);
            }

            let result = self.dispatch(&call).await;
            let feedback = feedback_prompt(&call.name, &result.output);
            tool_calls.push(ToolInvocation {
                name: call.name,
                arguments: call.arguments,
                output: result.output,
                success: result.success,
            });

            // Requests are single-shot; each round resends the exchange so far.
            conversation = format!(
                "{conversation}\n\nYour previous response:\n{}\n\n{feedback}",
                response.text
            );
        };

        Ok(LoopReport {
            outcome,
            tool_calls,
            iterations: iteration,
        })
    }

    /// Turn generated text into a tool call, if it carries a usable directive.
    fn parse_call(&self, text: &str, iteration: u32) -> Option<ToolCall> {
        let directive = self.extractor.extract(text, DirectiveKind::ObjectOrList)?;
        let directive = match directive {
            Value::Array(items) => items.into_iter().next()?,
            other => other,
        };
        let object = directive.as_object()?;

        let name = object
            .get("name")
            .or_else(|| object.get("tool_name"))
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())?;

        let arguments = match object.get("arguments") {
            Some(args @ Value::Object(_)) => args.clone(),
            _ => Value::Object(serde_json::Map::new()),
        };

        Some(ToolCall {
            id: format!("call_{iteration}"),
            name: name.trim().to_string(),
            arguments,
        })
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        debug!(tool = %call.name, arguments = %call.arguments, "Dispatching tool");

        let start = std::time::Instant::now();
        let result = self.tools.dispatch(call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }
}

/// The message that hands a tool result back to the model.
pub fn feedback_prompt(tool_name: &str, output: &str) -> String {
    format!(
        "You used the tool '{tool_name}' and it returned this result:\n\
         \"\"\"\n{output}\n\"\"\"\n\
         Do you need to use another tool, or is the task complete? \
         If it is complete, give your final answer to the user in plain text."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        RepeatingMockProvider, SequentialMockProvider, make_directive, make_text_response,
    };
    use memweave_core::provider::ProviderResponse;
    use memweave_tools::{Workspace, default_registry};
    use serde_json::json;

    fn agent(provider: Arc<dyn Provider>, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(
            provider,
            "mock-model",
            0.7,
            Arc::new(tools),
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn plain_text_is_the_answer() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Hello! How can I help?"]));
        let agent = agent(provider.clone(), ToolRegistry::new())
            .with_system_instruction("You are helpful.");

        let report = agent
            .process("turn-1", "Hello!", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, LoopOutcome::Answer("Hello! How can I help?".into()));
        assert_eq!(report.iterations, 1);
        assert!(report.tool_calls.is_empty());

        let requests = provider.requests();
        assert_eq!(requests[0].prompt, "Hello!");
        assert_eq!(requests[0].system.as_deref(), Some("You are helpful."));
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "buy milk").unwrap();
        let tools = default_registry(Arc::new(Workspace::new(dir.path())));

        let provider = Arc::new(SequentialMockProvider::texts(&[
            make_directive("read_file", json!({"filename": "notes.txt"})).as_str(),
            "Your notes say: buy milk",
        ]));
        let agent = agent(provider.clone(), tools);

        let report = agent
            .process("turn-1", "What's in my notes?", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome.answer(), Some("Your notes say: buy milk"));
        assert_eq!(report.tool_calls.len(), 1);
        assert_eq!(report.tool_calls[0].name, "read_file");
        assert_eq!(report.tool_calls[0].output, "buy milk");

        let second = &provider.requests()[1].prompt;
        assert!(second.starts_with("What's in my notes?"));
        assert!(second.contains("You used the tool 'read_file'"));
        assert!(second.contains("\"\"\"\nbuy milk\n\"\"\""));
    }

    #[tokio::test]
    async fn unknown_tool_continues_to_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let tools = default_registry(Arc::new(Workspace::new(dir.path())));

        let provider = Arc::new(SequentialMockProvider::texts(&[
            make_directive("delete_everything", json!({})).as_str(),
            "Sorry, I can't do that.",
        ]));
        let agent = agent(provider.clone(), tools);

        let report = agent
            .process("turn-1", "Wipe it all", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome.answer(), Some("Sorry, I can't do that."));
        assert!(!report.tool_calls[0].success);
        assert!(report.tool_calls[0].output.contains("delete_everything"));

        assert_eq!(provider.call_count(), 2);
        let feedback = &provider.requests()[1].prompt;
        assert!(feedback.contains("Error: Unknown tool 'delete_everything'"));
    }

    #[tokio::test]
    async fn tool_name_alias_and_list_directive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let tools = default_registry(Arc::new(Workspace::new(dir.path())));

        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"[{"tool_name": "list_files"}]"#,
            "There is one file.",
        ]));
        let agent = agent(provider, tools);

        let report = agent
            .process("turn-1", "List my files", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.tool_calls[0].name, "list_files");
        assert_eq!(report.tool_calls[0].arguments, json!({}));
        assert_eq!(report.tool_calls[0].output, "Files in workspace:\n- a.txt");
    }

    #[tokio::test]
    async fn nameless_directive_is_plain_text() {
        let text = r#"Here is the data you asked for: {"temperature": 21}"#;
        let provider = Arc::new(SequentialMockProvider::texts(&[text]));
        let agent = agent(provider, ToolRegistry::new());

        let report = agent
            .process("turn-1", "Give me JSON", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, LoopOutcome::Answer(text.into()));
    }

    #[tokio::test]
    async fn always_directive_stops_at_cap() {
        let dir = tempfile::tempdir().unwrap();
        let tools = default_registry(Arc::new(Workspace::new(dir.path())));
        let directive = make_directive("list_files", json!({}));
        let provider = Arc::new(RepeatingMockProvider::new(&directive));
        let agent = agent(provider.clone(), tools).with_max_iterations(4);

        let report = agent
            .process("turn-1", "loop forever", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, LoopOutcome::GaveUp(directive));
        assert_eq!(report.iterations, 4);
        assert_eq!(provider.call_count(), 4);
        assert_eq!(report.tool_calls.len(), 3);
    }

    #[tokio::test]
    async fn blocked_response_ends_loop() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Ok(
            ProviderResponse::blocked("SAFETY", "mock-model"),
        )]));
        let event_bus = Arc::new(EventBus::default());
        let mut rx = event_bus.subscribe();
        let agent = AgentLoop::new(
            provider,
            "mock-model",
            0.7,
            Arc::new(ToolRegistry::new()),
            event_bus,
        );

        let report = agent
            .process("turn-1", "something", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, LoopOutcome::Blocked { reason: "SAFETY".into() });
        assert_eq!(report.outcome.answer(), None);
        let event = rx.try_recv().unwrap();
        assert!(matches!(&*event, DomainEvent::GenerationBlocked { reason, .. } if reason == "SAFETY"));
    }

    #[tokio::test]
    async fn cancelled_before_first_call() {
        let provider = Arc::new(SequentialMockProvider::texts(&[]));
        let agent = agent(provider.clone(), ToolRegistry::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = agent.process("turn-1", "hi", &cancel).await.unwrap();

        assert_eq!(report.outcome, LoopOutcome::Cancelled);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(ProviderError::RateLimited)]));
        let agent = agent(provider, ToolRegistry::new());

        let err = agent
            .process("turn-1", "hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn tool_events_are_published() {
        let dir = tempfile::tempdir().unwrap();
        let tools = default_registry(Arc::new(Workspace::new(dir.path())));
        let provider = Arc::new(SequentialMockProvider::new(vec![
            Ok(make_text_response(&make_directive(
                "write_file",
                json!({"filename": "x.txt", "content": "hi"}),
            ))),
            Ok(make_text_response("Done.")),
        ]));
        let event_bus = Arc::new(EventBus::default());
        let mut rx = event_bus.subscribe();
        let agent = AgentLoop::new(provider, "mock-model", 0.7, Arc::new(tools), event_bus);

        agent
            .process("turn-1", "write x", &CancellationToken::new())
            .await
            .unwrap();

        let mut saw_tool = false;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::ToolExecuted { tool_name, success, .. } = &*event {
                assert_eq!(tool_name, "write_file");
                assert!(*success);
                saw_tool = true;
            }
        }
        assert!(saw_tool);
        assert_eq!(std::fs::read_to_string(dir.path().join("x.txt")).unwrap(), "hi");
    }
}
