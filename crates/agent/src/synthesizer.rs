//! Knowledge synthesis — turn the latest exchange into knowledge base edits.
//!
//! The model only proposes actions (`add_fact`, `add_to_list`); applying
//! them is done here, so repeated or malformed proposals cannot corrupt the
//! structure. A batch is loaded, applied in order and saved once.

use std::sync::Arc;
use chrono::Utc;
use memweave_core::event::{DomainEvent, EventBus};
use memweave_core::interaction::InteractionRecord;
use memweave_core::knowledge::{ApplyOutcome, SynthesisAction};
use memweave_core::provider::{Provider, ProviderRequest, ResponseFormat};
use memweave_memory::KnowledgeStore;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::directive::{DirectiveExtractor, DirectiveKind};

/// What a synthesis pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisReport {
    /// No extraction provider is available
    Disabled,
    /// The model proposed nothing usable
    NoActions,
    /// A batch was applied and saved
    Applied {
        changed: usize,
        unchanged: usize,
        skipped: usize,
    },
    /// The provider call or the save failed
    Failed(String),
}

/// Extracts facts from exchanges and applies them to the knowledge store.
pub struct KnowledgeSynthesizer {
    provider: Option<Arc<dyn Provider>>,
    model: String,
    store: Arc<KnowledgeStore>,
    extractor: DirectiveExtractor,
    event_bus: Arc<EventBus>,
}

impl KnowledgeSynthesizer {
    /// Create a synthesizer. With no provider, every pass is a no-op.
    pub fn new(
        provider: Option<Arc<dyn Provider>>,
        model: impl Into<String>,
        store: Arc<KnowledgeStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        if provider.is_none() {
            warn!("Knowledge extractor unavailable, synthesis disabled for this session");
        }
        Self {
            provider,
            model: model.into(),
            store,
            extractor: DirectiveExtractor::default(),
            event_bus,
        }
    }

    pub fn with_extractor(mut self, extractor: DirectiveExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Run one synthesis pass over `record`. Never fails; problems are
    /// logged and reported.
    pub async fn synthesize(&self, record: &InteractionRecord) -> SynthesisReport {
        let Some(provider) = &self.provider else {
            return SynthesisReport::Disabled;
        };

        info!("Starting knowledge synthesis");

        let request = ProviderRequest::new(&self.model, extraction_prompt(record))
            .with_temperature(0.0)
            .with_response_format(ResponseFormat::Json);

        let response = match provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Knowledge synthesis request failed");
                return SynthesisReport::Failed(e.to_string());
            }
        };

        if let Some(reason) = &response.block_reason {
            debug!(reason = %reason, "Knowledge synthesis blocked");
            return SynthesisReport::NoActions;
        }

        let Some(actions) = self.actions_from(&response.text) else {
            debug!(raw = %response.text, "No actions extracted from conversation");
            return SynthesisReport::NoActions;
        };

        let guard = self.store.lock().await;
        let mut kb = guard.load();
        let (mut changed, mut unchanged, mut skipped) = (0, 0, 0);

        for item in &actions {
            let action = match SynthesisAction::from_value(item) {
                Ok(action) => action,
                Err(reason) => {
                    debug!(%reason, "Skipping malformed action");
                    skipped += 1;
                    continue;
                }
            };

            match kb.apply(&action) {
                ApplyOutcome::Conflict { segment } => {
                    debug!(path = ?action.path(), %segment, "Skipping conflicting action");
                    skipped += 1;
                }
                outcome if outcome.changed() => changed += 1,
                _ => unchanged += 1,
            }
        }

        if let Err(e) = guard.save(&kb) {
            warn!(error = %e, "Failed to save knowledge base");
            return SynthesisReport::Failed(e.to_string());
        }

        info!(changed, unchanged, skipped, "Knowledge base updated");
        self.event_bus.publish(DomainEvent::KnowledgeUpdated {
            applied: changed,
            skipped,
            timestamp: Utc::now(),
        });

        SynthesisReport::Applied {
            changed,
            unchanged,
            skipped,
        }
    }

    /// The `actions` list from the model's answer, if it has one.
    fn actions_from(&self, text: &str) -> Option<Vec<Value>> {
        let mut directive = self.extractor.extract(text, DirectiveKind::Object)?;
        match directive.get_mut("actions")?.take() {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// The extraction prompt for one exchange.
pub fn extraction_prompt(record: &InteractionRecord) -> String {
    format!(
        r#"You are an information extraction system. Your job is to read a conversation
and identify any specific facts that should be recorded.

Analyze the conversation below. Extract a list of actions to update a knowledge base.
Possible actions are: 'add_fact' or 'add_to_list'.

Example:
Conversation: "The project deadline is tomorrow."
Output:
{{
  "actions": [
    {{"action": "add_fact", "key_path": ["ProjectA", "deadline"], "value": "tomorrow"}}
  ]
}}

Conversation: "Add two developers, Alice and Bob."
Output:
{{
  "actions": [
    {{"action": "add_to_list", "key_path": ["ProjectA", "developers"], "value": "Alice"}},
    {{"action": "add_to_list", "key_path": ["ProjectA", "developers"], "value": "Bob"}}
  ]
}}

Analyze this conversation:
User: "{user}"
AI: "{ai}"

Return ONLY a JSON object with a single key, "actions"."#,
        user = record.user,
        ai = record.ai,
    )
}
