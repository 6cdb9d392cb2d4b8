//! The conversational core of Memweave.
//!
//! Each turn follows a **Weave → Dispatch → Log → Synthesize** cycle:
//!
//! 1. **Weave** the knowledge base and recent journal into the prompt
//! 2. **Dispatch**: call the provider; if the answer carries a tool
//!    directive, run the tool, feed the result back and loop
//! 3. **Log** the final exchange to the journal
//! 4. **Synthesize** knowledge base edits from that exchange
//!
//! The loop ends when the model answers in plain text, the provider blocks,
//! the iteration cap is hit, or the turn is cancelled.

pub mod directive;
pub mod loop_runner;
pub mod session;
pub mod synthesizer;
pub mod weaver;

#[cfg(test)]
mod test_helpers;

pub use directive::{DirectiveExtractor, DirectiveKind};
pub use loop_runner::{AgentLoop, LoopOutcome, LoopReport, ToolInvocation};
pub use session::{Session, TurnReport, blocked_reply};
pub use synthesizer::{KnowledgeSynthesizer, SynthesisReport};
