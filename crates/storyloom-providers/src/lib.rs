//! # storyloom-providers
//!
//! Backend adapters for the Storyloom narrator.
//!
//! This crate provides:
//! - The [`ProviderAdapter`] trait and shared transcript seeding
//! - A stateful native Gemini adapter
//! - A stateless OpenAI-compatible chat-completions adapter
//! - Adapter selection from configuration

pub mod factory;
pub mod gemini;
pub mod openai;
pub mod traits;

pub use factory::{AdapterFactory, ConfiguredAdapterFactory};
pub use gemini::{GeminiAdapter, GeminiChat};
pub use openai::{normalize_base_url, OpenAICompatAdapter};
pub use traits::{seed_messages, ProviderAdapter, SeedMessage, SeedRole};
