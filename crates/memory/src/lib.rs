//! Persistent memory for Memweave.
//!
//! Two plain JSON files live under the memory directory:
//!
//! - the interaction journal (`InteractionStore`), a JSON array of exchanges
//! - the knowledge base (`KnowledgeStore`), one nested JSON object
//!
//! Both stores read a missing or unparsable file as empty and rewrite the
//! whole file on every save. Mutations within a process are serialized per
//! store; there is no cross-process locking.

mod fs;
pub mod interaction_store;
pub mod knowledge_store;

pub use fs::ensure_initialized;
pub use interaction_store::InteractionStore;
pub use knowledge_store::{KnowledgeGuard, KnowledgeStore};
