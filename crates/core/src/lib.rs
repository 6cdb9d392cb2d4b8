//! # Memweave Core
//!
//! Domain types, traits, and error definitions for the Memweave agent.
//! This crate has **no I/O of its own**: it defines the domain model that
//! the provider, memory, tool and agent crates implement against.
//!
//! - [`provider`]: the text-generation backend trait
//! - [`tool`]: the tool trait and registry used by the dispatch loop
//! - [`interaction`]: journal records
//! - [`knowledge`]: the nested fact structure and its synthesis actions
//! - [`event`]: domain events published while a turn runs

pub mod error;
pub mod event;
pub mod interaction;
pub mod knowledge;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use interaction::InteractionRecord;
pub use knowledge::{ApplyOutcome, Fact, KnowledgeBase, RejectedAction, SynthesisAction};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
