//! # storyloom-core
//!
//! Core types and abstractions for Storyloom - the branching text-adventure
//! narrator.
//!
//! This crate provides:
//! - Turn and transcript primitives
//! - Character profile type
//! - Configuration system
//! - Narrator response parsing
//! - Error types and provider failure classification

pub mod classify;
pub mod config;
pub mod error;
pub mod parser;
pub mod profile;
pub mod turn;

pub use classify::{classify, Failure, FailureKind, RECOVERY_OPTIONS};
pub use config::{ApiConfig, Config, HttpSettings, NativeSettings, SessionSettings};
pub use error::{ConfigError, Error, ProviderError, Result};
pub use parser::{parse_response, ParsedResponse, OPTIONS_SEPARATOR};
pub use profile::CharacterProfile;
pub use turn::{Turn, TurnRole, BEGIN_TRIGGER};
