//! Text-generation provider implementations for Memweave.
//!
//! All providers implement the `memweave_core::Provider` trait.
//! `build_provider` picks the implementation for a configured provider name.

pub mod gemini;
mod http;
pub mod openai_compat;
pub mod router;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_provider;
