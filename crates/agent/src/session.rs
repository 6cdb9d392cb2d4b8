//! A conversational session: the full turn pipeline.
//!
//! One turn is: weave memory into a prompt, run the dispatch loop, log the
//! exchange to the journal, then synthesize knowledge from it. Turns are
//! processed one at a time.

use std::sync::Arc;
use chrono::Utc;
use memweave_config::AppConfig;
use memweave_core::event::{DomainEvent, EventBus};
use memweave_core::interaction::InteractionRecord;
use memweave_core::provider::Provider;
use memweave_memory::{InteractionStore, KnowledgeStore};
use memweave_tools::{Workspace, default_registry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directive::DirectiveExtractor;
use crate::loop_runner::{AgentLoop, LoopOutcome, ToolInvocation};
use crate::synthesizer::{KnowledgeSynthesizer, SynthesisReport};
use crate::weaver;

/// What one turn produced.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub turn_id: String,
    /// Text to show the user (empty when cancelled)
    pub reply: String,
    pub outcome: LoopOutcome,
    pub tool_calls: Vec<ToolInvocation>,
    /// Whether the exchange was appended to the journal
    pub logged: bool,
    /// `None` when synthesis did not run for this turn
    pub synthesis: Option<SynthesisReport>,
}

/// The apology shown when the provider refuses to answer.
pub fn blocked_reply(reason: &str) -> String {
    format!("I'm sorry, I couldn't generate a response for that. (Blocked reason: {reason})")
}

pub struct Session {
    agent: AgentLoop,
    journal: Arc<InteractionStore>,
    knowledge: Arc<KnowledgeStore>,
    synthesizer: KnowledgeSynthesizer,
    event_bus: Arc<EventBus>,
    recent_count: usize,
    log_blocked_turns: bool,
}

impl Session {
    pub fn new(
        agent: AgentLoop,
        journal: Arc<InteractionStore>,
        knowledge: Arc<KnowledgeStore>,
        synthesizer: KnowledgeSynthesizer,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            agent,
            journal,
            knowledge,
            synthesizer,
            event_bus,
            recent_count: 5,
            log_blocked_turns: false,
        }
    }

    /// How many journal entries are woven into each prompt.
    pub fn with_recent_count(mut self, count: usize) -> Self {
        self.recent_count = count;
        self
    }

    /// Log the apology as the answer when generation is blocked.
    pub fn with_log_blocked_turns(mut self, enabled: bool) -> Self {
        self.log_blocked_turns = enabled;
        self
    }

    /// Wire a session from configuration.
    ///
    /// Creates the memory directory, empty stores and the tool workspace if
    /// they are missing. `extractor` is `None` when the synthesis provider
    /// could not be built; synthesis is then disabled.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        extractor: Option<Arc<dyn Provider>>,
        event_bus: Arc<EventBus>,
    ) -> memweave_core::Result<Self> {
        let journal_path = config.memory.journal_path();
        let knowledge_path = config.memory.knowledge_path();
        memweave_memory::ensure_initialized(&journal_path, &knowledge_path)?;

        let workspace = Workspace::new(&config.tools.workspace_dir);
        workspace.ensure_exists().map_err(|e| memweave_core::Error::Config {
            message: format!(
                "cannot create workspace {}: {e}",
                config.tools.workspace_dir.display()
            ),
        })?;

        let tools = Arc::new(default_registry(Arc::new(workspace)));
        let system = weaver::system_instruction(&config.system_instruction, &tools.definitions());

        let agent = AgentLoop::new(
            provider,
            &config.default_model,
            config.default_temperature,
            tools,
            event_bus.clone(),
        )
        .with_max_tokens(config.default_max_tokens)
        .with_max_iterations(config.agent.max_iterations)
        .with_system_instruction(system)
        .with_directive_strategy(config.agent.directive_strategy);

        let journal = Arc::new(InteractionStore::new(journal_path));
        let knowledge = Arc::new(KnowledgeStore::new(knowledge_path));
        let synthesizer = KnowledgeSynthesizer::new(
            extractor,
            config.synthesis_model(),
            knowledge.clone(),
            event_bus.clone(),
        )
        .with_extractor(DirectiveExtractor::new(config.agent.directive_strategy));

        Ok(Self::new(agent, journal, knowledge, synthesizer, event_bus)
            .with_recent_count(config.memory.recent_count)
            .with_log_blocked_turns(config.memory.log_blocked_turns))
    }

    pub fn journal(&self) -> &InteractionStore {
        &self.journal
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    /// Build the prompt for `user_text` from current memory.
    pub async fn weave(&self, user_text: &str) -> String {
        let kb = self.knowledge.load().await;
        let recent = self.journal.recent(self.recent_count).await;
        weaver::weave(&kb, &recent, user_text)
    }

    /// Process one user message end to end.
    ///
    /// Provider errors from the dispatch loop propagate; the stores are not
    /// touched in that case.
    pub async fn turn(
        &self,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> memweave_core::Result<TurnReport> {
        let turn_id = Uuid::new_v4().to_string();
        let prompt = self.weave(user_text).await;
        debug!(turn_id = %turn_id, prompt = %prompt, "Final prompt sent to provider");

        let report = self.agent.process(&turn_id, &prompt, cancel).await?;

        let (reply, loggable) = match &report.outcome {
            LoopOutcome::Answer(text) | LoopOutcome::GaveUp(text) => (text.clone(), true),
            LoopOutcome::Blocked { reason } => (blocked_reply(reason), self.log_blocked_turns),
            LoopOutcome::Cancelled => (String::new(), false),
        };

        let mut turn = TurnReport {
            turn_id,
            reply,
            outcome: report.outcome,
            tool_calls: report.tool_calls,
            logged: false,
            synthesis: None,
        };

        if !loggable {
            return Ok(turn);
        }

        let record = InteractionRecord::new(user_text, &turn.reply);
        match self.journal.append(record.clone()).await {
            Ok(journal_len) => {
                info!(turn_id = %turn.turn_id, journal_len, "Interaction logged to journal");
                self.event_bus.publish(DomainEvent::InteractionLogged {
                    journal_len,
                    timestamp: Utc::now(),
                });
                turn.logged = true;
            }
            Err(e) => {
                warn!(turn_id = %turn.turn_id, error = %e, "Failed to log interaction");
                return Ok(turn);
            }
        }

        if matches!(turn.outcome, LoopOutcome::Blocked { .. }) {
            return Ok(turn);
        }

        turn.synthesis = Some(self.synthesizer.synthesize(&record).await);
        Ok(turn)
    }
}
